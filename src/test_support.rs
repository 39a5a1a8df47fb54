//! In-memory provider fake shared by unit tests.

use crate::error::PaperBotError;
use crate::gemini::{
    FileState, GenerateRequest, GenerateResponse, GenerativeBackend, RemoteFile,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies to `generate` from a script; uploads are ACTIVE immediately.
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, PaperBotError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl ScriptedBackend {
    pub(crate) fn with_replies(replies: Vec<Result<String, PaperBotError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `(display_name, mime_type, bytes)` for every upload.
    pub(crate) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, PaperBotError> {
        let n = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push((display_name.to_string(), mime_type.to_string(), bytes));
            uploads.len()
        };
        Ok(RemoteFile {
            name: format!("files/{n}"),
            uri: format!("https://files.invalid/{n}"),
            mime_type: mime_type.to_string(),
            state: FileState::Active,
        })
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, PaperBotError> {
        Ok(RemoteFile {
            name: name.to_string(),
            uri: format!("https://files.invalid/{name}"),
            mime_type: "text/markdown".into(),
            state: FileState::Active,
        })
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, PaperBotError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PaperBotError::Internal("script exhausted".into())));
        reply.map(|text| GenerateResponse {
            text,
            finish_reason: Some("STOP".into()),
            ..Default::default()
        })
    }
}
