//! Provider-agnostic LLM types and the `LlmProvider` capability trait.

use async_trait::async_trait;

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// A single message in a completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A plain text completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Concatenated content of all system messages.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Response to a text completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A generative language model that turns a system instruction plus a user
/// prompt into one text completion.
///
/// Implemented by `RigAdapter` for real providers and by deterministic stubs
/// in tests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier (e.g. `mistral-large-latest`).
    fn model_name(&self) -> &str;

    /// Run a single completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("{}|{}", request.system_prompt().unwrap_or_default(), user),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    #[test]
    fn system_prompt_joins_system_messages() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("one"),
            ChatMessage::user("question"),
            ChatMessage::system("two"),
        ]);
        assert_eq!(req.system_prompt().as_deref(), Some("one\n\ntwo"));
    }

    #[test]
    fn system_prompt_none_without_system_messages() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert!(req.system_prompt().is_none());
    }

    #[test]
    fn builder_sets_sampling_options() {
        let req = CompletionRequest::new(vec![])
            .with_temperature(0.1)
            .with_max_tokens(256);
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(req.max_tokens, Some(256));
    }

    #[tokio::test]
    async fn complete_sees_system_and_user() {
        let llm = EchoLlm;
        let request =
            CompletionRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("user q")]);
        let out = llm.complete(request).await.unwrap();
        assert_eq!(out.content, "sys|user q");
    }
}
