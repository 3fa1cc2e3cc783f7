//! mail-query — ask questions about your mailbox in plain language.
//!
//! Messages are ingested into a single libSQL table; questions are turned
//! into SQL by a language model, sanitized, and run against that table.

pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod query;
pub mod render;
pub mod store;
