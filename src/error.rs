//! Error types for mail-query.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Mail ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Source {name} is not configured: {reason}")]
    NotConfigured { name: String, reason: String },

    #[error("Fetch from {name} failed: {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("Failed to store fetched records: {0}")]
    Store(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Natural-language query errors.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The model output (or the question itself) could not produce a statement.
    #[error("Translation failed: {0}")]
    Translation(String),

    /// The store rejected or could not run the statement.
    #[error("Execution failed: {0}")]
    Execution(String),
}

impl From<DatabaseError> for QueryError {
    fn from(e: DatabaseError) -> Self {
        QueryError::Execution(e.to_string())
    }
}
