//! Platform-neutral message routing.
//!
//! A message is routed by two things only: the extension of the chosen
//! attachment and the exact message text.
//!
//! | Extension | Command     | Route                | Reply file                   |
//! |-----------|-------------|----------------------|------------------------------|
//! | `.pdf`    | `translate` | convert + translate  | `english.md`, `japanese.md`  |
//! | `.md`     | `translate` | translate            | `japanese.md`                |
//! | `.md`     | `summary`   | `ja_summary`         | `result.md`                  |
//! | `.md`     | `slide`     | `en_slide`           | `result.md`                  |
//! | `.md`     | `html`      | render               | `result.html`                |
//!
//! Anything else is ignored (`Ok(None)`), as are bot authors and messages
//! outside direct messages.

use crate::config::BotConfig;
use crate::convert::{ConversionJob, DocumentConverter};
use crate::error::PaperBotError;
use crate::gemini::GenerativeBackend;
use crate::html::HtmlRenderer;
use crate::summarize::{summarize, SummaryTask};
use crate::translate::translate_markdown;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// ── Status messages ──────────────────────────────────────────────────────────

pub const MSG_PDF_ACCEPTED: &str = "PDFファイルを受け付けました。解析を開始します。";
pub const MSG_PDF_CONVERTED: &str =
    "PDFファイルの解析が完了しました。英文Markdownを送信します。続いてGeminiによる日本語翻訳を行います。";
pub const MSG_TRANSLATION_DONE: &str = "日本語翻訳が完了しました。日本語Markdownを送信します。";
pub const MSG_MD_ACCEPTED_TRANSLATE: &str = "Markdownファイルを受け付けました。翻訳を開始します。";
pub const MSG_MD_ACCEPTED_SUMMARY: &str = "Markdownファイルを受け付けました。要約を開始します。";
pub const MSG_SUMMARY_DONE: &str = "要約が完了しました。";
pub const MSG_MD_ACCEPTED_HTML: &str = "Markdownファイルを受け付けました。HTMLに変換します。";
pub const MSG_HTML_DONE: &str = "HTMLに変換が完了しました。";

// ── Reply file names ─────────────────────────────────────────────────────────

pub const ENGLISH_MD: &str = "english.md";
pub const JAPANESE_MD: &str = "japanese.md";
pub const RESULT_MD: &str = "result.md";
pub const RESULT_HTML: &str = "result.html";

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

/// The parts of an incoming chat message the dispatcher looks at.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    /// Platform message id; doubles as the job id.
    pub id: String,
    /// Sent in a one-to-one direct-message channel.
    pub is_direct: bool,
    pub from_bot: bool,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    /// Attachments of the message this one replies to, if any.
    pub referenced_attachments: Vec<AttachmentRef>,
}

impl IncomingMessage {
    /// The attachment to act on: the replied-to message's first attachment
    /// wins over this message's own.
    pub fn attachment(&self) -> Option<&AttachmentRef> {
        self.referenced_attachments
            .first()
            .or_else(|| self.attachments.first())
    }
}

/// What the dispatcher does with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    TranslatePdf,
    TranslateMarkdown,
    Summarize(SummaryTask),
    RenderHtml,
}

impl Route {
    /// Match an attachment file name and command text. Extensions compare
    /// case-insensitively; the command must match exactly.
    pub fn resolve(filename: &str, command: &str) -> Option<Route> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            return (command == "translate").then_some(Route::TranslatePdf);
        }
        if !lower.ends_with(".md") {
            return None;
        }
        match command {
            "translate" => Some(Route::TranslateMarkdown),
            "summary" => Some(Route::Summarize(SummaryTask::JaSummary)),
            "slide" => Some(Route::Summarize(SummaryTask::EnSlide)),
            "html" => Some(Route::RenderHtml),
            _ => None,
        }
    }
}

/// The channel a message arrived on, as seen by the dispatcher.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn download(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, PaperBotError>;

    async fn send_text(&self, text: &str) -> Result<(), PaperBotError>;

    async fn send_file(&self, text: &str, filename: &str, bytes: Vec<u8>) -> Result<(), PaperBotError>;
}

/// Routes messages to conversion, translation, summarisation or rendering.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn GenerativeBackend>,
    converter: Arc<dyn DocumentConverter>,
    config: Arc<BotConfig>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        converter: Arc<dyn DocumentConverter>,
        config: Arc<BotConfig>,
    ) -> Self {
        Self {
            backend,
            converter,
            config,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Handle one message. Returns the route taken, or `None` when the
    /// message was ignored.
    pub async fn handle(
        &self,
        message: &IncomingMessage,
        channel: &dyn ChatChannel,
        cancel: &CancellationToken,
    ) -> Result<Option<Route>, PaperBotError> {
        if message.from_bot || !message.is_direct {
            return Ok(None);
        }
        let Some(attachment) = message.attachment() else {
            return Ok(None);
        };
        let Some(route) = Route::resolve(&attachment.filename, &message.content) else {
            debug!(
                "Ignoring '{}' with command '{}'",
                attachment.filename, message.content
            );
            return Ok(None);
        };

        let job = ConversionJob::for_config(&self.config, &message.id);
        let bytes = channel.download(attachment).await?;
        info!(
            "Received {} ({} bytes) for {:?}, job {}",
            attachment.filename,
            bytes.len(),
            route,
            job.id
        );

        match route {
            Route::TranslatePdf => {
                channel.send_text(MSG_PDF_ACCEPTED).await?;
                let english = self.converter.convert(bytes, &job).await?;
                channel
                    .send_file(MSG_PDF_CONVERTED, ENGLISH_MD, english.clone().into_bytes())
                    .await?;
                self.translate(&english, &job, channel, cancel).await?;
            }
            Route::TranslateMarkdown => {
                let markdown = decode_markdown(attachment, bytes)?;
                channel.send_text(MSG_MD_ACCEPTED_TRANSLATE).await?;
                self.translate(&markdown, &job, channel, cancel).await?;
            }
            Route::Summarize(task) => {
                let markdown = decode_markdown(attachment, bytes)?;
                channel.send_text(MSG_MD_ACCEPTED_SUMMARY).await?;
                let output = summarize(
                    self.backend.as_ref(),
                    &markdown,
                    task,
                    &job.id,
                    &self.config,
                    cancel,
                )
                .await?;
                channel
                    .send_file(MSG_SUMMARY_DONE, RESULT_MD, output.into_bytes())
                    .await?;
            }
            Route::RenderHtml => {
                let markdown = decode_markdown(attachment, bytes)?;
                channel.send_text(MSG_MD_ACCEPTED_HTML).await?;
                let renderer = HtmlRenderer::new(self.config.workspace_dir.clone());
                let html = tokio::task::spawn_blocking(move || renderer.render(&markdown))
                    .await
                    .map_err(|e| PaperBotError::Internal(format!("Render task panicked: {}", e)))??;
                channel
                    .send_file(MSG_HTML_DONE, RESULT_HTML, html.into_bytes())
                    .await?;
            }
        }

        info!("Job {} done ({:?})", job.id, route);
        Ok(Some(route))
    }

    async fn translate(
        &self,
        markdown: &str,
        job: &ConversionJob,
        channel: &dyn ChatChannel,
        cancel: &CancellationToken,
    ) -> Result<(), PaperBotError> {
        let translation =
            translate_markdown(self.backend.as_ref(), markdown, &job.id, &self.config, cancel)
                .await?;
        info!(
            "Translation of job {} ended {:?} after {} turns",
            job.id, translation.outcome, translation.turns
        );
        channel
            .send_file(MSG_TRANSLATION_DONE, JAPANESE_MD, translation.markdown.into_bytes())
            .await
    }
}

fn decode_markdown(attachment: &AttachmentRef, bytes: Vec<u8>) -> Result<String, PaperBotError> {
    String::from_utf8(bytes).map_err(|e| PaperBotError::InvalidAttachment {
        filename: attachment.filename.clone(),
        detail: e.to_string(),
    })
}
