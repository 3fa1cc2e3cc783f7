//! `RecordStore` trait and the types that cross it.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;

/// Name of the single message table.
pub const TABLE_NAME: &str = "emails";

/// Column holding the message timestamp.
pub const TIMESTAMP_COLUMN: &str = "date";

/// Text format of the timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Unique message identifier (primary key).
    pub id: String,
    /// Free text, may embed a display name and an address.
    pub sender: String,
    /// Free text, may be empty.
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    /// Plain-text body.
    pub content: String,
}

impl Record {
    /// Timestamp as stored in the `date` column.
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Parse a stored `date` column value back into a UTC instant.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(ndt.and_utc());
    }
    // Fractional seconds, as written by some SQLite date functions
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// An opaque column value from a read query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => write!(f, "NULL"),
            ColumnValue::Integer(i) => write!(f, "{i}"),
            ColumnValue::Real(r) => write!(f, "{r}"),
            ColumnValue::Text(s) => write!(f, "{s}"),
            ColumnValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Rows returned by a read query, in store order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ColumnValue>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Values of one column across all rows.
    pub fn column_values(&self, name: &str) -> Vec<&ColumnValue> {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().filter_map(|r| r.get(idx)).collect(),
            None => Vec::new(),
        }
    }
}

/// Single-table message store with upsert semantics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert or overwrite records by id. All-or-nothing; returns the count written.
    async fn upsert_records(&self, records: &[Record]) -> Result<usize, DatabaseError>;

    /// Run one read statement and materialize every row.
    async fn execute_read(&self, sql: &str) -> Result<ResultSet, DatabaseError>;

    /// Look up a record by id.
    async fn get_record(&self, id: &str) -> Result<Option<Record>, DatabaseError>;

    /// Number of stored records.
    async fn count_records(&self) -> Result<usize, DatabaseError>;
}
