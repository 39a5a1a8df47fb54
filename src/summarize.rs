//! Single-shot summarisation.
//!
//! Unlike translation, a summary fits comfortably in one response, so this
//! is one upload plus one generation call with the summary profile.

use crate::config::BotConfig;
use crate::error::PaperBotError;
use crate::gemini::{Content, GenerateRequest, GenerativeBackend, Part};
use crate::prompts::{SUMMARY_EN_SLIDE_PROMPT, SUMMARY_JA_PROMPT};
use crate::upload::upload_markdown;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Which summary to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTask {
    /// Japanese explanatory summary (`ja_summary`).
    JaSummary,
    /// English slide deck in Markdown (`en_slide`).
    EnSlide,
}

impl SummaryTask {
    pub fn prompt(self) -> &'static str {
        match self {
            SummaryTask::JaSummary => SUMMARY_JA_PROMPT,
            SummaryTask::EnSlide => SUMMARY_EN_SLIDE_PROMPT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryTask::JaSummary => "ja_summary",
            SummaryTask::EnSlide => "en_slide",
        }
    }
}

impl fmt::Display for SummaryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryTask {
    type Err = PaperBotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ja_summary" => Ok(SummaryTask::JaSummary),
            "en_slide" => Ok(SummaryTask::EnSlide),
            other => Err(PaperBotError::InvalidArgument(format!(
                "unknown summary task '{other}' (expected ja_summary or en_slide)"
            ))),
        }
    }
}

/// Summarise `markdown` for the task named by `selector`.
///
/// The selector is validated before anything is uploaded.
pub async fn summarize_markdown(
    backend: &dyn GenerativeBackend,
    markdown: &str,
    selector: &str,
    job_id: &str,
    config: &BotConfig,
    cancel: &CancellationToken,
) -> Result<String, PaperBotError> {
    let task: SummaryTask = selector.parse()?;
    summarize(backend, markdown, task, job_id, config, cancel).await
}

/// Summarise `markdown` with an already-parsed task.
pub async fn summarize(
    backend: &dyn GenerativeBackend,
    markdown: &str,
    task: SummaryTask,
    job_id: &str,
    config: &BotConfig,
    cancel: &CancellationToken,
) -> Result<String, PaperBotError> {
    let file = upload_markdown(
        backend,
        &format!("{job_id}.md"),
        markdown,
        &config.polling,
        cancel,
    )
    .await?;

    let profile = &config.summary;
    let request = GenerateRequest {
        model: profile.model.clone(),
        system_instruction: Some(profile.system_instruction.clone()),
        contents: vec![Content::user(vec![Part::file(&file), Part::text(task.prompt())])],
        generation: profile.generation.clone(),
    };

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PaperBotError::Cancelled),
        r = backend.generate(&request) => r?,
    };
    info!(
        "Summary ({}) complete: {} chars",
        task,
        response.text.chars().count()
    );

    Ok(response.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBackend;

    fn config() -> BotConfig {
        BotConfig::builder().gemini_api_key("k").build().unwrap()
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("ja_summary".parse::<SummaryTask>().unwrap(), SummaryTask::JaSummary);
        assert_eq!("en_slide".parse::<SummaryTask>().unwrap(), SummaryTask::EnSlide);
        assert!(matches!(
            "summary".parse::<SummaryTask>(),
            Err(PaperBotError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn ja_summary_uses_japanese_prompt() {
        let backend = ScriptedBackend::with_replies(vec![Ok("要約".into())]);
        let out = summarize_markdown(&backend, "# p", "ja_summary", "j1", &config(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "要約");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gemini-1.5-pro");
        assert!(req.generation.stop_sequences.is_empty());
        assert_eq!(req.contents.len(), 1);
        assert_eq!(req.contents[0].parts[1], Part::text(SUMMARY_JA_PROMPT));
    }

    #[tokio::test]
    async fn en_slide_uses_slide_prompt() {
        let backend = ScriptedBackend::with_replies(vec![Ok("# Slides".into())]);
        summarize_markdown(&backend, "# p", "en_slide", "j2", &config(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            backend.requests()[0].contents[0].parts[1],
            Part::text(SUMMARY_EN_SLIDE_PROMPT)
        );
    }

    #[tokio::test]
    async fn unknown_selector_fails_before_upload() {
        let backend = ScriptedBackend::with_replies(vec![]);
        let err = summarize_markdown(&backend, "# p", "haiku", "j3", &config(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PaperBotError::InvalidArgument(_)));
        assert!(backend.uploads().is_empty());
        assert!(backend.requests().is_empty());
    }
}
