//! Error type for the paperbot library.
//!
//! Every failure in this crate is fatal to the request that triggered it:
//! nothing is retried automatically, so there is a single error enum rather
//! than a fatal/non-fatal split. Variants are grouped by where they arise:
//!
//! * **Input** — the attachment is not a usable PDF or Markdown file.
//! * **Provider** — upload, polling, or generation against the Gemini API.
//! * **Chat** — the Discord API refused a send or fetch.
//! * **Config / argument** — caller mistakes detected before any I/O.
//!
//! The dispatcher never turns an unmatched message into an error; "nothing to
//! do" is `Ok(None)`, not a variant here.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the paperbot library.
#[derive(Debug, Error)]
pub enum PaperBotError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The bytes do not start with the `%PDF` magic.
    #[error("Attachment is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// pdfium could not parse the document.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// A layout stage failed for a specific page.
    #[error("Extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The attachment could not be decoded (e.g. Markdown that is not UTF-8).
    #[error("Invalid attachment '{filename}': {detail}")]
    InvalidAttachment { filename: String, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// Transport-level failure talking to an HTTP endpoint.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Gemini API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The resumable upload handshake did not complete.
    #[error("Upload of '{display_name}' failed: {reason}")]
    UploadFailed {
        display_name: String,
        reason: String,
    },

    /// The provider reported that processing of an uploaded file failed.
    #[error("Remote file '{name}' entered the FAILED state")]
    RemoteFileFailed { name: String },

    /// The uploaded file did not become ACTIVE within the poll bound.
    #[error("Remote file '{name}' was not ACTIVE after {attempts} polls")]
    PollExhausted { name: String, attempts: u32 },

    /// A generation response carried no candidate text.
    #[error("Gemini returned no text (finish reason: {finish_reason})")]
    EmptyResponse { finish_reason: String },

    // ── Chat errors ───────────────────────────────────────────────────────
    /// The chat platform rejected a request.
    #[error("Chat platform error: {0}")]
    Chat(String),

    // ── Argument / config errors ──────────────────────────────────────────
    /// Unknown summarisation task selector, or a similar caller error.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required secret was not supplied.
    #[error("Missing secret: {name}\nSet the {name} environment variable (or add it to .env).")]
    MissingSecret { name: &'static str },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a local file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The job was cancelled (shutdown in progress).
    #[error("Operation cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaperBotError {
    /// Wrap an `std::io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PaperBotError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serenity::Error> for PaperBotError {
    fn from(e: serenity::Error) -> Self {
        PaperBotError::Chat(e.to_string())
    }
}
