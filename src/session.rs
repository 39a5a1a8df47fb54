//! Multi-turn conversation with a fixed model, system instruction and
//! generation config.
//!
//! Gemini's `generateContent` is stateless, so a "chat" is just the full
//! history resent on every call. [`ChatSession`] owns that history and only
//! records a turn once the provider has answered it, which keeps the
//! history an exact, ordered log of completed exchanges.

use crate::config::{GenerationConfig, TaskProfile};
use crate::error::PaperBotError;
use crate::gemini::{Content, GenerateRequest, GenerateResponse, GenerativeBackend, Part};
use tracing::debug;

pub struct ChatSession<'a> {
    backend: &'a dyn GenerativeBackend,
    model: String,
    system_instruction: String,
    generation: GenerationConfig,
    history: Vec<Content>,
}

impl<'a> ChatSession<'a> {
    /// Open an empty session configured from `profile`.
    pub fn new(backend: &'a dyn GenerativeBackend, profile: &TaskProfile) -> Self {
        Self {
            backend,
            model: profile.model.clone(),
            system_instruction: profile.system_instruction.clone(),
            generation: profile.generation.clone(),
            history: Vec::new(),
        }
    }

    /// Send one user turn and return the model's reply.
    ///
    /// On error the history is left untouched.
    pub async fn send(&mut self, parts: Vec<Part>) -> Result<GenerateResponse, PaperBotError> {
        let mut contents = self.history.clone();
        contents.push(Content::user(parts));

        let request = GenerateRequest {
            model: self.model.clone(),
            system_instruction: Some(self.system_instruction.clone()),
            contents,
            generation: self.generation.clone(),
        };

        let response = self.backend.generate(&request).await?;
        debug!(
            "Turn {}: {} prompt tokens, {} output tokens, finish={:?}",
            self.turns() + 1,
            response.prompt_tokens,
            response.output_tokens,
            response.finish_reason
        );

        let GenerateRequest { mut contents, .. } = request;
        contents.push(Content::model(response.text.clone()));
        self.history = contents;

        Ok(response)
    }

    /// Completed exchanges so far.
    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::Role;
    use crate::test_support::ScriptedBackend;

    #[tokio::test]
    async fn history_alternates_user_and_model() {
        let backend = ScriptedBackend::with_replies(vec![Ok("one".into()), Ok("two".into())]);
        let mut session = ChatSession::new(&backend, &TaskProfile::translation());

        session.send(vec![Part::text("a")]).await.unwrap();
        session.send(vec![Part::text("b")]).await.unwrap();

        assert_eq!(session.turns(), 2);
        let roles: Vec<Role> = session.history().iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User, Role::Model]);
        assert_eq!(session.history()[3].parts, vec![Part::text("two")]);

        // The second request carried the first exchange.
        let requests = backend.requests();
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].model, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn failed_turn_is_not_recorded() {
        let backend = ScriptedBackend::with_replies(vec![Err(PaperBotError::Api {
            status: 500,
            message: "boom".into(),
        })]);
        let mut session = ChatSession::new(&backend, &TaskProfile::summary());
        assert!(session.send(vec![Part::text("a")]).await.is_err());
        assert_eq!(session.turns(), 0);
    }
}
