//! Mail ingestion — pull messages from a source and upsert them into the store.

pub mod eml;
pub mod imap;
pub mod parse;

pub use eml::EmlDirSource;
pub use imap::ImapSource;
pub use parse::parse_record;

use async_trait::async_trait;
use tracing::info;

use crate::error::IngestError;
use crate::store::{Record, RecordStore};

/// Somewhere recent messages can be read from.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Up to `limit` of the most recent messages.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Record>, IngestError>;
}

/// Fetch from `source` and upsert into `store`. Returns the number stored.
pub async fn ingest(
    source: &dyn MailSource,
    store: &dyn RecordStore,
    limit: usize,
) -> Result<usize, IngestError> {
    let records = source.fetch_recent(limit).await?;
    if records.is_empty() {
        info!(source = source.name(), "No messages to store");
        return Ok(0);
    }
    let stored = store.upsert_records(&records).await?;
    info!(source = source.name(), stored, "Fetched and stored messages");
    Ok(stored)
}
