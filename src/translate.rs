//! Paginated translation.
//!
//! A full paper translated into Japanese is far longer than one response
//! can be (8 192 output tokens), so the translation is pulled out of the
//! model turn by turn:
//!
//! ```text
//! Start ──▶ send [file, TRANSLATION_PROMPT]
//!   │
//!   ▼
//! Accumulate turn text ──▶ contains stop phrase? ──yes──▶ Completed
//!   │                              │ no
//!   │                      shorter than min_progress_chars? ──yes──▶ Truncated
//!   │                              │ no
//!   │                      max_turns reached? ──yes──▶ TurnLimit
//!   │                              │ no
//!   └──── sleep(continuation_delay), send [CONTINUE_PROMPT] ◀┘
//! ```
//!
//! The stop phrase stays in the returned text. The first failing turn aborts
//! the whole run; partial output only reaches the debug transcript.

use crate::config::{BotConfig, PaginationConfig};
use crate::error::PaperBotError;
use crate::gemini::{GenerativeBackend, Part, RemoteFile};
use crate::prompts::{CONTINUE_PROMPT, TRANSLATION_PROMPT};
use crate::session::ChatSession;
use crate::upload::upload_markdown;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a pagination run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationOutcome {
    /// A turn contained the stop phrase.
    Completed,
    /// A turn was shorter than the progress threshold (heuristic end).
    Truncated,
    /// `max_turns` turns were sent without either signal.
    TurnLimit,
}

/// The accumulated translation.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Every turn's text, concatenated in request order.
    pub markdown: String,
    pub turns: usize,
    pub outcome: PaginationOutcome,
}

/// What the latest turn tells the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnVerdict {
    Completed,
    Truncated,
    Continue,
}

/// Classify one turn's text.
///
/// Length is counted in characters, not bytes, so a Japanese turn is held
/// to the same threshold as an English one.
pub fn judge_turn(text: &str, pagination: &PaginationConfig) -> TurnVerdict {
    if text.contains(pagination.stop_phrase.as_str()) {
        TurnVerdict::Completed
    } else if text.chars().count() < pagination.min_progress_chars {
        TurnVerdict::Truncated
    } else {
        TurnVerdict::Continue
    }
}

/// Upload `markdown` and translate it.
///
/// `job_id` names the upload and the debug transcript
/// (`<workspace>/debug/<job_id>.txt`).
pub async fn translate_markdown(
    backend: &dyn GenerativeBackend,
    markdown: &str,
    job_id: &str,
    config: &BotConfig,
    cancel: &CancellationToken,
) -> Result<Translation, PaperBotError> {
    let file = upload_markdown(
        backend,
        &format!("{job_id}.md"),
        markdown,
        &config.polling,
        cancel,
    )
    .await?;

    let mut transcript = if config.debug_transcripts {
        Transcript::create(config.debug_dir().join(format!("{job_id}.txt"))).await
    } else {
        None
    };

    translate_document(backend, &file, config, transcript.as_mut(), cancel).await
}

/// Drive the pagination loop over an already-uploaded document.
pub async fn translate_document(
    backend: &dyn GenerativeBackend,
    file: &RemoteFile,
    config: &BotConfig,
    mut transcript: Option<&mut Transcript>,
    cancel: &CancellationToken,
) -> Result<Translation, PaperBotError> {
    let pagination = &config.pagination;
    let mut session = ChatSession::new(backend, &config.translation);
    let mut buffer = String::new();
    let mut parts = vec![Part::file(file), Part::text(TRANSLATION_PROMPT)];

    info!("Starting chat session");

    loop {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PaperBotError::Cancelled),
            r = session.send(parts) => r?,
        };
        let turn = session.turns();

        buffer.push_str(&response.text);
        if let Some(t) = transcript.as_deref_mut() {
            t.append(&response.text).await;
        }

        info!(
            "Response length: {}/{}",
            response.text.chars().count(),
            buffer.chars().count()
        );

        let outcome = match judge_turn(&response.text, pagination) {
            TurnVerdict::Completed => Some(PaginationOutcome::Completed),
            TurnVerdict::Truncated => {
                warn!(
                    "Turn {} shorter than {} chars without stop phrase; assuming end of content",
                    turn, pagination.min_progress_chars
                );
                Some(PaginationOutcome::Truncated)
            }
            TurnVerdict::Continue if turn >= pagination.max_turns => {
                warn!("Stopping after {} turns without stop phrase", turn);
                Some(PaginationOutcome::TurnLimit)
            }
            TurnVerdict::Continue => None,
        };

        if let Some(outcome) = outcome {
            info!("Translation finished: {:?} after {} turns", outcome, turn);
            return Ok(Translation {
                markdown: buffer,
                turns: turn,
                outcome,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PaperBotError::Cancelled),
            _ = sleep(pagination.continuation_delay) => {}
        }
        parts = vec![Part::text(CONTINUE_PROMPT)];
    }
}

/// Debug sink receiving every turn's raw text.
///
/// Write failures are logged and swallowed: the transcript is a diagnostic
/// aid, never a reason to lose a translation.
pub struct Transcript {
    path: PathBuf,
    file: tokio::fs::File,
}

impl Transcript {
    /// Create (or truncate) the transcript file. Returns `None` on failure.
    pub async fn create(path: PathBuf) -> Option<Self> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Cannot create transcript dir {}: {}", parent.display(), e);
                return None;
            }
        }
        match tokio::fs::File::create(&path).await {
            Ok(file) => Some(Self { path, file }),
            Err(e) => {
                warn!("Cannot create transcript {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn append(&mut self, text: &str) {
        let result = async {
            self.file.write_all(text.as_bytes()).await?;
            self.file.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!("Transcript write to {} failed: {}", self.path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
