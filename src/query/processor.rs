//! Query processor — the `process_query` entry point.
//!
//! Per-request flow:
//! Received → Translating → Sanitizing → DialectFixing → Executing → {Succeeded | Failed}
//!
//! No retries and no state carried between requests.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::QueryError;
use crate::llm::LlmProvider;
use crate::query::context::DateContext;
use crate::query::dialect::ensure_order_by;
use crate::query::executor::QueryExecutor;
use crate::query::translator::QueryTranslator;
use crate::store::{RecordStore, ResultSet};

/// Stage of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Received,
    Translating,
    Sanitizing,
    DialectFixing,
    Executing,
    Succeeded,
    Failed,
}

impl QueryState {
    pub fn label(&self) -> &'static str {
        match self {
            QueryState::Received => "received",
            QueryState::Translating => "translating",
            QueryState::Sanitizing => "sanitizing",
            QueryState::DialectFixing => "dialect_fixing",
            QueryState::Executing => "executing",
            QueryState::Succeeded => "succeeded",
            QueryState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Succeeded | QueryState::Failed)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one natural-language query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Rows plus the exact statement that produced them.
    Succeeded { rows: ResultSet, sql: String },
    /// Human-readable failure. `sql` is set when execution was attempted.
    Failed { message: String, sql: Option<String> },
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Succeeded { .. })
    }

    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Succeeded { rows, .. } => Some(rows),
            QueryOutcome::Failed { .. } => None,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            QueryOutcome::Succeeded { sql, .. } => Some(sql),
            QueryOutcome::Failed { sql, .. } => sql.as_deref(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            QueryOutcome::Succeeded { .. } => None,
            QueryOutcome::Failed { message, .. } => Some(message),
        }
    }

    fn from_translation_error(e: QueryError) -> Self {
        QueryOutcome::Failed {
            message: e.to_string(),
            sql: None,
        }
    }
}

/// Long-lived service: build once, share by reference across requests.
pub struct QueryProcessor {
    translator: QueryTranslator,
    executor: QueryExecutor,
}

impl QueryProcessor {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            translator: QueryTranslator::new(llm),
            executor: QueryExecutor::new(store),
        }
    }

    /// Translate and run a question against today's date.
    pub async fn process_query(&self, question: &str) -> QueryOutcome {
        self.process_query_with_context(question, &DateContext::now())
            .await
    }

    /// Translate and run a question with an explicit date context.
    pub async fn process_query_with_context(
        &self,
        question: &str,
        ctx: &DateContext,
    ) -> QueryOutcome {
        let request_id = Uuid::new_v4();
        let mut state = QueryState::Received;
        info!(%request_id, question = %question, "Processing query");

        advance(&mut state, QueryState::Translating, request_id);
        let raw = match self.translator.generate(question, ctx).await {
            Ok(raw) => raw,
            Err(e) => return fail(&mut state, request_id, e),
        };

        advance(&mut state, QueryState::Sanitizing, request_id);
        let sql = match self.translator.sanitize(&raw) {
            Ok(sql) => sql,
            Err(e) => return fail(&mut state, request_id, e),
        };

        advance(&mut state, QueryState::DialectFixing, request_id);
        let sql = ensure_order_by(&sql);
        info!(%request_id, sql = %sql, "Generated SQL query");

        advance(&mut state, QueryState::Executing, request_id);
        let outcome = self.executor.execute(&sql).await;

        let terminal = if outcome.is_success() {
            QueryState::Succeeded
        } else {
            QueryState::Failed
        };
        advance(&mut state, terminal, request_id);
        outcome
    }
}

fn advance(state: &mut QueryState, next: QueryState, request_id: Uuid) {
    debug!(%request_id, from = %state, to = %next, "Query state transition");
    if next.is_terminal() {
        info!(%request_id, state = %next, "Query finished");
    }
    *state = next;
}

fn fail(state: &mut QueryState, request_id: Uuid, e: QueryError) -> QueryOutcome {
    warn!(%request_id, stage = %state, error = %e, "Query failed before execution");
    advance(state, QueryState::Failed, request_id);
    QueryOutcome::from_translation_error(e)
}
