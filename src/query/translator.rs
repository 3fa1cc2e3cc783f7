//! Query translator — natural-language question to one SQL statement.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::QueryError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::query::context::DateContext;
use crate::query::prompt::{build_system_prompt, build_user_prompt};
use crate::query::sanitize::extract_statement;

/// Low temperature: the same question should map to the same statement.
const TRANSLATE_TEMPERATURE: f32 = 0.1;

/// A single SELECT never needs more than this.
const TRANSLATE_MAX_TOKENS: u32 = 512;

/// Turns questions into sanitized, terminated SQL via a language model.
///
/// Two steps, driven by the query processor: `generate` then `sanitize`.
pub struct QueryTranslator {
    llm: Arc<dyn LlmProvider>,
}

impl QueryTranslator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Call the model and return its raw text.
    pub async fn generate(&self, question: &str, ctx: &DateContext) -> Result<String, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::Translation("question is empty".to_string()));
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt(ctx)),
            ChatMessage::user(build_user_prompt(question)),
        ])
        .with_temperature(TRANSLATE_TEMPERATURE)
        .with_max_tokens(TRANSLATE_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| QueryError::Translation(format!("LLM call failed: {e}")))?;

        debug!(
            model = self.llm.model_name(),
            output_tokens = response.output_tokens,
            "SQL generation complete"
        );
        Ok(response.content)
    }

    /// Clean raw model text into one terminated statement.
    pub fn sanitize(&self, raw: &str) -> Result<String, QueryError> {
        extract_statement(raw).inspect_err(|_| {
            warn!(raw_response = %raw, "Model output contained no SELECT");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, Role};

    /// Returns a fixed response and records the last request.
    struct ScriptedLlm {
        response: Result<String, String>,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                last_request: Mutex::new(None),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(reason.to_string()),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_request.lock().unwrap() = Some(request);
            match &self.response {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    fn ctx() -> DateContext {
        DateContext::for_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())
    }

    async fn translate(translator: &QueryTranslator, question: &str) -> Result<String, QueryError> {
        let raw = translator.generate(question, &ctx()).await?;
        translator.sanitize(&raw)
    }

    #[tokio::test]
    async fn sanitizes_fenced_output() {
        let llm = ScriptedLlm::ok("```sql\nSELECT * FROM emails\n```");
        let translator = QueryTranslator::new(llm);
        let sql = translate(&translator, "all emails").await.unwrap();
        assert_eq!(sql, "SELECT * FROM emails;");
    }

    #[tokio::test]
    async fn request_carries_instruction_and_question() {
        let llm = ScriptedLlm::ok("SELECT 1;");
        let translator = QueryTranslator::new(llm.clone());
        translate(&translator, "show emails from last week from John").await.unwrap();

        let request = llm.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0]
            .content
            .contains("\"Last week\" means from 2025-03-03 to 2025-03-10"));
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(
            request.messages[1].content,
            "Write SQL query for: show emails from last week from John"
        );
        assert_eq!(request.temperature, Some(TRANSLATE_TEMPERATURE));
    }

    #[tokio::test]
    async fn output_without_select_is_translation_error() {
        let llm = ScriptedLlm::ok("Sorry, I cannot answer that.");
        let translator = QueryTranslator::new(llm);
        let err = translate(&translator, "who am I").await.unwrap_err();
        assert!(matches!(err, QueryError::Translation(_)));
    }

    #[tokio::test]
    async fn empty_question_skips_model_call() {
        let llm = ScriptedLlm::ok("SELECT 1;");
        let translator = QueryTranslator::new(llm.clone());
        let err = translate(&translator, "   ").await.unwrap_err();
        assert!(matches!(err, QueryError::Translation(_)));
        assert!(llm.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn model_failure_is_translation_error() {
        let llm = ScriptedLlm::failing("503 upstream");
        let translator = QueryTranslator::new(llm);
        let err = translate(&translator, "anything").await.unwrap_err();
        match err {
            QueryError::Translation(msg) => assert!(msg.contains("503 upstream")),
            other => panic!("expected translation error, got {other:?}"),
        }
    }
}
