//! Query executor — runs a finalized statement against the record store.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::QueryError;
use crate::query::QueryOutcome;
use crate::store::RecordStore;

/// Prefix of every execution failure message.
pub const EXECUTION_ERROR_PREFIX: &str = "Error executing query";

/// Executes statements and shapes the outcome for the caller.
pub struct QueryExecutor {
    store: Arc<dyn RecordStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Run one statement. Store failures become `QueryOutcome::Failed`; never retried.
    pub async fn execute(&self, sql: &str) -> QueryOutcome {
        match self.store.execute_read(sql).await {
            Ok(rows) => {
                info!(rows = rows.len(), "Query executed");
                QueryOutcome::Succeeded {
                    rows,
                    sql: sql.to_string(),
                }
            }
            Err(e) => {
                let e = QueryError::from(e);
                warn!(error = %e, sql = %sql, "Query execution failed");
                QueryOutcome::Failed {
                    message: format!("{EXECUTION_ERROR_PREFIX}: {e}"),
                    sql: Some(sql.to_string()),
                }
            }
        }
    }
}
