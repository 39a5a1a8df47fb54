//! Configuration types for the bot.
//!
//! Everything a job needs (provider credentials, per-task generation
//! parameters, pagination and polling bounds, filesystem layout) lives in
//! one [`BotConfig`], built via [`BotConfigBuilder`] and shared behind an
//! `Arc`. Components receive it explicitly; nothing reads process-wide state
//! after start-up, so two bots with different keys or workspaces can coexist
//! in one process (and tests can run in parallel).

use crate::error::PaperBotError;
use crate::prompts::{SUMMARY_SYSTEM_PROMPT, TRANSLATION_STOP_PHRASE, TRANSLATION_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Faster model used for the long, paginated translation.
pub const DEFAULT_TRANSLATION_MODEL: &str = "gemini-1.5-flash";

/// Higher-quality model used for single-shot summaries.
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-1.5-pro";

/// Sampling parameters for one generation task.
///
/// Serialises directly to Gemini's `generationConfig` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    /// Provider-side stop sequences. Translation only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl GenerationConfig {
    /// Translation profile: the stop phrase is registered with the provider.
    pub fn translation() -> Self {
        Self {
            stop_sequences: vec![TRANSLATION_STOP_PHRASE.to_string()],
            ..Self::summary()
        }
    }

    /// Summary profile: same sampling, no stop sequence.
    pub fn summary() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Model, system instruction and sampling for one task.
#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub model: String,
    pub system_instruction: String,
    pub generation: GenerationConfig,
}

impl TaskProfile {
    pub fn translation() -> Self {
        Self {
            model: DEFAULT_TRANSLATION_MODEL.to_string(),
            system_instruction: TRANSLATION_SYSTEM_PROMPT.to_string(),
            generation: GenerationConfig::translation(),
        }
    }

    pub fn summary() -> Self {
        Self {
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            system_instruction: SUMMARY_SYSTEM_PROMPT.to_string(),
            generation: GenerationConfig::summary(),
        }
    }
}

/// Knobs for the translation pagination loop.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// Literal marker that ends the loop when it appears in a turn.
    pub stop_phrase: String,

    /// Minimum characters a turn must contain for the loop to continue. Default: 500.
    ///
    /// This is a heuristic, not a contract: a turn shorter than this is taken
    /// to mean the model has nothing more to add. A genuinely short middle
    /// turn ends the loop early; a model that never shrinks its output keeps
    /// it going until `max_turns`.
    pub min_progress_chars: usize,

    /// Pause before each "continue" turn. Default: 30 s (provider rate limit).
    pub continuation_delay: Duration,

    /// Upper bound on turns per translation, first turn included. Default: 64.
    pub max_turns: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            stop_phrase: TRANSLATION_STOP_PHRASE.to_string(),
            min_progress_chars: 500,
            continuation_delay: Duration::from_secs(30),
            max_turns: 64,
        }
    }
}

/// Knobs for waiting on an uploaded file to become ACTIVE.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between status checks. Default: 1 s. No backoff.
    pub interval: Duration,
    /// Status checks before giving up. Default: 600.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 600,
        }
    }
}

/// Knobs for the PDF layout pipeline.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    /// Longest edge, in pixels, of a rasterised scanned page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Average text-layer characters per page below which a document is
    /// treated as scanned. Default: 32.
    pub scanned_chars_per_page: usize,

    /// Directory containing the pdfium shared library. `None` binds to the
    /// system library.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            scanned_chars_per_page: 32,
            pdfium_library_path: None,
        }
    }
}

/// Complete bot configuration.
///
/// Built via [`BotConfig::builder()`].
///
/// # Example
/// ```rust
/// use paperbot::BotConfig;
///
/// let config = BotConfig::builder()
///     .gemini_api_key("test-key")
///     .workspace_dir("/tmp/paperbot")
///     .build()
///     .unwrap();
/// assert_eq!(config.pagination.min_progress_chars, 500);
/// ```
#[derive(Clone)]
pub struct BotConfig {
    /// Gemini API key (`GOOGLE_API_KEY`).
    pub gemini_api_key: String,

    /// Gemini REST base URL, without trailing slash.
    pub gemini_base_url: String,

    /// Discord bot token (`DISCORD_TOKEN`). Only the `serve` command needs it.
    pub discord_token: Option<String>,

    pub translation: TaskProfile,
    pub summary: TaskProfile,
    pub pagination: PaginationConfig,
    pub polling: PollConfig,
    pub conversion: ConversionSettings,

    /// Root for `images/` and `debug/`. Default: current directory.
    pub workspace_dir: PathBuf,

    /// Write each translation turn to `debug/<job>.txt`. Default: true.
    pub debug_transcripts: bool,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_base_url", &self.gemini_base_url)
            .field("discord_token", &self.discord_token.as_ref().map(|_| "<redacted>"))
            .field("translation", &self.translation)
            .field("summary", &self.summary)
            .field("pagination", &self.pagination)
            .field("polling", &self.polling)
            .field("conversion", &self.conversion)
            .field("workspace_dir", &self.workspace_dir)
            .field("debug_transcripts", &self.debug_transcripts)
            .finish()
    }
}

impl BotConfig {
    /// Create a new builder with every default filled in except the API key.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: BotConfig {
                gemini_api_key: String::new(),
                gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                discord_token: None,
                translation: TaskProfile::translation(),
                summary: TaskProfile::summary(),
                pagination: PaginationConfig::default(),
                polling: PollConfig::default(),
                conversion: ConversionSettings::default(),
                workspace_dir: PathBuf::from("."),
                debug_transcripts: true,
            },
        }
    }

    /// Directory under which every job's images live.
    pub fn image_root(&self) -> PathBuf {
        self.workspace_dir.join(crate::html::LOCAL_IMAGE_PREFIX.trim_end_matches('/'))
    }

    /// Directory holding per-job debug transcripts.
    pub fn debug_dir(&self) -> PathBuf {
        self.workspace_dir.join("debug")
    }

    /// The Discord token, or an error naming the missing variable.
    pub fn require_discord_token(&self) -> Result<&str, PaperBotError> {
        self.discord_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(PaperBotError::MissingSecret {
                name: "DISCORD_TOKEN",
            })
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = key.into();
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn discord_token(mut self, token: impl Into<String>) -> Self {
        self.config.discord_token = Some(token.into());
        self
    }

    pub fn translation_model(mut self, model: impl Into<String>) -> Self {
        self.config.translation.model = model.into();
        self
    }

    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.config.summary.model = model.into();
        self
    }

    /// Replace the stop phrase in both the loop and the provider stop list.
    pub fn stop_phrase(mut self, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        self.config.translation.generation.stop_sequences = vec![phrase.clone()];
        self.config.pagination.stop_phrase = phrase;
        self
    }

    pub fn min_progress_chars(mut self, n: usize) -> Self {
        self.config.pagination.min_progress_chars = n;
        self
    }

    pub fn continuation_delay(mut self, delay: Duration) -> Self {
        self.config.pagination.continuation_delay = delay;
        self
    }

    pub fn max_turns(mut self, n: usize) -> Self {
        self.config.pagination.max_turns = n;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.polling.interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.polling.max_attempts = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.conversion.max_rendered_pixels = px.max(100);
        self
    }

    pub fn scanned_chars_per_page(mut self, n: usize) -> Self {
        self.config.conversion.scanned_chars_per_page = n;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.conversion.pdfium_library_path = Some(path.into());
        self
    }

    pub fn workspace_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.workspace_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn debug_transcripts(mut self, v: bool) -> Self {
        self.config.debug_transcripts = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, PaperBotError> {
        let c = &self.config;
        if c.gemini_api_key.trim().is_empty() {
            return Err(PaperBotError::MissingSecret {
                name: "GOOGLE_API_KEY",
            });
        }
        if c.pagination.stop_phrase.is_empty() {
            return Err(PaperBotError::InvalidConfig(
                "Stop phrase must not be empty".into(),
            ));
        }
        if c.pagination.max_turns == 0 {
            return Err(PaperBotError::InvalidConfig("max_turns must be ≥ 1".into()));
        }
        if c.polling.max_attempts == 0 {
            return Err(PaperBotError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        for profile in [&c.translation, &c.summary] {
            let g = &profile.generation;
            if !(0.0..=2.0).contains(&g.temperature) {
                return Err(PaperBotError::InvalidConfig(format!(
                    "temperature must be 0.0–2.0, got {}",
                    g.temperature
                )));
            }
            if !(g.top_p > 0.0 && g.top_p <= 1.0) {
                return Err(PaperBotError::InvalidConfig(format!(
                    "top_p must be in (0, 1], got {}",
                    g.top_p
                )));
            }
            if profile.model.is_empty() {
                return Err(PaperBotError::InvalidConfig("model must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_tuning() {
        let c = BotConfig::builder().gemini_api_key("k").build().unwrap();
        assert_eq!(c.translation.model, "gemini-1.5-flash");
        assert_eq!(c.summary.model, "gemini-1.5-pro");
        assert_eq!(c.pagination.min_progress_chars, 500);
        assert_eq!(c.pagination.continuation_delay, Duration::from_secs(30));
        assert_eq!(c.polling.interval, Duration::from_secs(1));
        assert_eq!(
            c.translation.generation.stop_sequences,
            vec!["This is end of translation.".to_string()]
        );
        assert!(c.summary.generation.stop_sequences.is_empty());
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = BotConfig::builder().build().unwrap_err();
        assert!(matches!(err, PaperBotError::MissingSecret { name: "GOOGLE_API_KEY" }));
    }

    #[test]
    fn zero_turns_is_rejected() {
        let err = BotConfig::builder()
            .gemini_api_key("k")
            .max_turns(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PaperBotError::InvalidConfig(_)));
    }

    #[test]
    fn stop_phrase_updates_both_sides() {
        let c = BotConfig::builder()
            .gemini_api_key("k")
            .stop_phrase("FIN")
            .build()
            .unwrap();
        assert_eq!(c.pagination.stop_phrase, "FIN");
        assert_eq!(c.translation.generation.stop_sequences, vec!["FIN".to_string()]);
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = BotConfig::builder()
            .gemini_api_key("super-secret")
            .discord_token("also-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("also-secret"));
    }

    #[test]
    fn generation_config_wire_format() {
        let json = serde_json::to_value(GenerationConfig::translation()).unwrap();
        assert_eq!(json["topK"], 64);
        assert_eq!(json["maxOutputTokens"], 8192);
        assert_eq!(json["responseMimeType"], "text/plain");
        assert_eq!(json["stopSequences"][0], "This is end of translation.");

        let json = serde_json::to_value(GenerationConfig::summary()).unwrap();
        assert!(json.get("stopSequences").is_none());
    }

    #[test]
    fn missing_discord_token_is_reported() {
        let c = BotConfig::builder().gemini_api_key("k").build().unwrap();
        assert!(matches!(
            c.require_discord_token(),
            Err(PaperBotError::MissingSecret { name: "DISCORD_TOKEN" })
        ));
    }
}
