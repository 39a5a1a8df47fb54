//! Upload a Markdown document and wait until the provider can use it.
//!
//! Gemini ingests uploaded files asynchronously: the upload call returns at
//! once with state `PROCESSING`, and generation requests referencing the
//! file fail until it turns `ACTIVE`. This module polls at a fixed interval
//! (no backoff, the wait is normally a second or two) with an explicit bound
//! and a cancellation token so a stuck file cannot pin a job forever.

use crate::config::PollConfig;
use crate::error::PaperBotError;
use crate::gemini::{FileState, GenerativeBackend, RemoteFile};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// MIME type the provider should treat uploaded documents as.
pub const MARKDOWN_MIME: &str = "text/markdown";

/// Upload `markdown` as `display_name` and poll until it is `ACTIVE`.
///
/// # Errors
/// - Any upload or status-check failure, unchanged.
/// - [`PaperBotError::RemoteFileFailed`] if the provider reports `FAILED`.
/// - [`PaperBotError::PollExhausted`] after `polling.max_attempts` checks.
/// - [`PaperBotError::Cancelled`] if `cancel` fires while waiting.
pub async fn upload_markdown(
    backend: &dyn GenerativeBackend,
    display_name: &str,
    markdown: &str,
    polling: &PollConfig,
    cancel: &CancellationToken,
) -> Result<RemoteFile, PaperBotError> {
    let file = backend
        .upload_file(display_name, MARKDOWN_MIME, markdown.as_bytes().to_vec())
        .await?;
    info!("Uploaded file: {}", file.name);

    wait_until_active(backend, file, polling, cancel).await
}

/// Poll `file` until it becomes usable.
///
/// The handle returned by the upload itself is checked first, so a file the
/// provider already reports as `ACTIVE` costs no extra request.
pub async fn wait_until_active(
    backend: &dyn GenerativeBackend,
    mut file: RemoteFile,
    polling: &PollConfig,
    cancel: &CancellationToken,
) -> Result<RemoteFile, PaperBotError> {
    let mut attempts = 0u32;
    loop {
        match file.state {
            FileState::Active => {
                debug!("{} is ACTIVE after {} polls", file.name, attempts);
                return Ok(file);
            }
            FileState::Failed => {
                return Err(PaperBotError::RemoteFileFailed { name: file.name });
            }
            FileState::Processing | FileState::StateUnspecified => {}
        }

        if attempts >= polling.max_attempts {
            return Err(PaperBotError::PollExhausted {
                name: file.name,
                attempts,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PaperBotError::Cancelled),
            _ = sleep(polling.interval) => {}
        }

        attempts += 1;
        file = backend.get_file(&file.name).await?;
    }
}
