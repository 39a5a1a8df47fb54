//! # paperbot
//!
//! A personal Discord bot for reading papers: send it a PDF in a direct
//! message and it returns the paper as Markdown, then a Japanese translation
//! produced by Gemini. Markdown attachments can also be summarised, turned
//! into an English slide deck, or rendered to a self-contained HTML page.
//!
//! ## Flow
//!
//! ```text
//! Discord DM (.pdf / .md + command)
//!  │
//!  ├─ dispatch   pick one route from (extension, exact command)
//!  ├─ convert    PDF → Markdown: classify → analyze → parse → markdown
//!  │             (pdfium, spawn_blocking; images under images/<job>/)
//!  ├─ upload     Markdown → Gemini file store, poll until ACTIVE
//!  ├─ translate  paginated chat: "continue" until stop phrase or short turn
//!  │  summarize  single generation with a fixed prompt
//!  │  html       CommonMark + MathJax, local images inlined as data: URIs
//!  └─ reply      english.md / japanese.md / result.md / result.html
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperbot::{translate_markdown, BotConfig, GeminiClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::builder()
//!         .gemini_api_key(std::env::var("GOOGLE_API_KEY")?)
//!         .build()?;
//!     let client = GeminiClient::new(&config)?;
//!     let markdown = std::fs::read_to_string("paper.md")?;
//!     let out = translate_markdown(&client, &markdown, "paper", &config, &CancellationToken::new()).await?;
//!     println!("{}", out.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperbot` binary (clap + anyhow + dotenvy + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod discord;
pub mod dispatch;
pub mod error;
pub mod gemini;
pub mod html;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod summarize;
pub mod translate;
pub mod upload;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BotConfig, BotConfigBuilder, ConversionSettings, GenerationConfig, PaginationConfig,
    PollConfig, TaskProfile,
};
pub use convert::{convert_pdf, ConversionJob, DocumentConverter, PdfiumConverter};
pub use discord::run_bot;
pub use dispatch::{AttachmentRef, ChatChannel, Dispatcher, IncomingMessage, Route};
pub use error::PaperBotError;
pub use gemini::{GeminiClient, GenerativeBackend, RemoteFile};
pub use html::{render_html, HtmlRenderer, ImageInliner};
pub use summarize::{summarize, summarize_markdown, SummaryTask};
pub use translate::{translate_markdown, PaginationOutcome, Translation};
pub use upload::upload_markdown;
