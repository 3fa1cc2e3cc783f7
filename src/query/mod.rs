//! Natural-language to SQL pipeline.
//!
//! Translator (prompt + model call) → sanitizer → dialect pass → executor.

pub mod context;
pub mod dialect;
pub mod executor;
pub mod processor;
pub mod prompt;
pub mod sanitize;
pub mod translator;

pub use context::DateContext;
pub use executor::QueryExecutor;
pub use processor::{QueryOutcome, QueryProcessor, QueryState};
pub use translator::QueryTranslator;
