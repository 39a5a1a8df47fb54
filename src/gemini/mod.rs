//! Generative-language provider abstraction.
//!
//! The bot needs three things from its LLM provider: put a document in the
//! provider's file store, ask whether that file is ready, and run one
//! generation request over a conversation. [`GenerativeBackend`] is exactly
//! that surface; [`client::GeminiClient`] implements it against the Gemini
//! REST API, and tests substitute an in-memory fake.
//!
//! The request types here are provider-neutral value types. Wire DTOs
//! (camelCase JSON) stay private to [`client`].

pub mod client;

use crate::config::GenerationConfig;
use crate::error::PaperBotError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::GeminiClient;

/// Lifecycle of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Reported before the provider has decided; treated like `Processing`.
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

/// Handle to a document in the provider's file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`. Used for status polling.
    pub name: String,
    /// URI referenced from generation requests.
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    File { uri: String, mime_type: String },
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }

    /// Reference an uploaded document.
    pub fn file(file: &RemoteFile) -> Self {
        Part::File {
            uri: file.uri.clone(),
            mime_type: file.mime_type.clone(),
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// A complete generation request: the whole conversation is resent each time.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub generation: GenerationConfig,
}

/// Text and accounting for one generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    /// Provider finish reason (`STOP`, `MAX_TOKENS`, …), if reported.
    pub finish_reason: Option<String>,
    pub prompt_tokens: u32,
    pub output_tokens: u32,
}

/// The provider operations the bot depends on.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Upload `bytes` as a new file and return its (possibly still processing) handle.
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, PaperBotError>;

    /// Fetch the current state of a previously uploaded file.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, PaperBotError>;

    /// Run one generation request.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, PaperBotError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_state_wire_names() {
        let s: FileState = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(s, FileState::Active);
        let s: FileState = serde_json::from_str("\"STATE_UNSPECIFIED\"").unwrap();
        assert_eq!(s, FileState::StateUnspecified);
    }

    #[test]
    fn file_part_copies_handle() {
        let f = RemoteFile {
            name: "files/x".into(),
            uri: "https://example.invalid/files/x".into(),
            mime_type: "text/markdown".into(),
            state: FileState::Active,
        };
        assert_eq!(
            Part::file(&f),
            Part::File {
                uri: "https://example.invalid/files/x".into(),
                mime_type: "text/markdown".into()
            }
        );
    }
}
