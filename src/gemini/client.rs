//! Gemini REST client.
//!
//! Three endpoints of the `v1beta` API are used:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | upload    | `POST /upload/v1beta/files` (resumable protocol: start, then upload+finalize) |
//! | status    | `GET  /v1beta/{name}` |
//! | generate  | `POST /v1beta/models/{model}:generateContent` |
//!
//! The API key travels in the `x-goog-api-key` header rather than the query
//! string so it never shows up in logged URLs.

use super::{
    Content, FileState, GenerateRequest, GenerateResponse, GenerativeBackend, Part, RemoteFile,
    Role,
};
use crate::config::{BotConfig, GenerationConfig};
use crate::error::PaperBotError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Generation calls over a long document routinely take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// [`GenerativeBackend`] backed by the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Build a client from the bot configuration.
    pub fn new(config: &BotConfig) -> Result<Self, PaperBotError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(
            http,
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone(),
        ))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, PaperBotError> {
        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PaperBotError::UploadFailed {
                display_name: display_name.to_string(),
                reason: "response carried no x-goog-upload-url header".into(),
            })?;
        debug!("Resumable upload session opened for {}", display_name);

        let finished = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let envelope: FileEnvelope = check_status(finished).await?.json().await?;

        Ok(envelope.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, PaperBotError> {
        let resp = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let file: FileDto = check_status(resp).await?.json().await?;
        Ok(file.into())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, PaperBotError> {
        let body = GenerateBody::from_request(request);
        let resp = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let dto: GenerateResponseDto = check_status(resp).await?.json().await?;
        dto.into_response()
    }
}

/// Turn a non-2xx response into [`PaperBotError::Api`], preferring the
/// provider's own error message over the raw body.
async fn check_status(resp: Response) -> Result<Response, PaperBotError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(PaperBotError::Api {
        status: status.as_u16(),
        message,
    })
}

// ── Wire DTOs ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDto,
}

#[derive(Deserialize)]
struct ApiErrorDto {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: FileDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDto {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: FileState,
}

impl From<FileDto> for RemoteFile {
    fn from(f: FileDto) -> Self {
        RemoteFile {
            name: f.name,
            uri: f.uri,
            mime_type: f.mime_type,
            state: f.state,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentDto>,
    contents: Vec<ContentDto>,
    generation_config: &'a GenerationConfig,
}

impl<'a> GenerateBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        Self {
            system_instruction: request.system_instruction.as_ref().map(|s| ContentDto {
                role: None,
                parts: vec![PartDto::text(s.clone())],
            }),
            contents: request.contents.iter().map(ContentDto::from).collect(),
            generation_config: &request.generation,
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct ContentDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<PartDto>,
}

impl From<&Content> for ContentDto {
    fn from(c: &Content) -> Self {
        let role = match c.role {
            Role::User => "user",
            Role::Model => "model",
        };
        ContentDto {
            role: Some(role.to_string()),
            parts: c.parts.iter().map(PartDto::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PartDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileDataDto>,
}

impl PartDto {
    fn text(s: String) -> Self {
        PartDto {
            text: Some(s),
            file_data: None,
        }
    }
}

impl From<&Part> for PartDto {
    fn from(p: &Part) -> Self {
        match p {
            Part::Text(t) => PartDto::text(t.clone()),
            Part::File { uri, mime_type } => PartDto {
                text: None,
                file_data: Some(FileDataDto {
                    mime_type: mime_type.clone(),
                    file_uri: uri.clone(),
                }),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDataDto {
    mime_type: String,
    file_uri: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponseDto {
    #[serde(default)]
    candidates: Vec<CandidateDto>,
    #[serde(default)]
    usage_metadata: Option<UsageDto>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedbackDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateDto {
    #[serde(default)]
    content: Option<ContentDto>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageDto {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedbackDto {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponseDto {
    /// Concatenate the text parts of the first candidate.
    ///
    /// A candidate without content (e.g. stopped by a stop sequence before
    /// emitting anything) yields empty text; only a response with no
    /// candidate at all is an error.
    fn into_response(self) -> Result<GenerateResponse, PaperBotError> {
        let usage = self.usage_metadata.unwrap_or_default();
        let candidate = match self.candidates.into_iter().next() {
            Some(c) => c,
            None => {
                let reason = self
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "NO_CANDIDATES".to_string());
                return Err(PaperBotError::EmptyResponse {
                    finish_reason: reason,
                });
            }
        };

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(GenerateResponse {
            text,
            finish_reason: candidate.finish_reason,
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        })
    }
}
