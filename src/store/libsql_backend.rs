//! libSQL backend — async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Reads run on a scoped
//! connection that is dropped when the call returns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    ColumnValue, Record, RecordStore, ResultSet, parse_timestamp,
};

const RECORD_COLUMNS: &str = "id, sender, recipient, date, subject, content";

/// libSQL database backend.
pub struct LibSqlBackend {
    db: LibSqlDatabase,
    /// Long-lived connection. In-memory databases are per-connection, so
    /// they serve every operation from this one.
    conn: Connection,
    path: Option<PathBuf>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db,
            conn,
            path: Some(path.to_path_buf()),
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db,
            conn,
            path: None,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A connection for the duration of one operation.
    fn scoped_conn(&self) -> Result<Connection, DatabaseError> {
        if self.path.is_none() {
            return Ok(self.conn.clone());
        }
        self.db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn to_column_value(value: Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::Integer(i) => ColumnValue::Integer(i),
        Value::Real(r) => ColumnValue::Real(r),
        Value::Text(s) => ColumnValue::Text(s),
        Value::Blob(b) => ColumnValue::Blob(b),
    }
}

/// Map a libsql Row to a Record.
///
/// Column order matches RECORD_COLUMNS:
/// 0:id, 1:sender, 2:recipient, 3:date, 4:subject, 5:content
fn row_to_record(row: &libsql::Row) -> Result<Record, libsql::Error> {
    let id: String = row.get(0)?;
    let date_str: String = row.get::<String>(3).unwrap_or_default();
    let timestamp = parse_timestamp(&date_str).unwrap_or_else(|| {
        warn!(id = %id, date = %date_str, "Unparseable stored date");
        chrono::DateTime::<Utc>::MIN_UTC
    });
    Ok(Record {
        id,
        sender: row.get::<String>(1).unwrap_or_default(),
        recipient: row.get::<String>(2).unwrap_or_default(),
        timestamp,
        subject: row.get::<String>(4).unwrap_or_default(),
        content: row.get::<String>(5).unwrap_or_default(),
    })
}

async fn write_records(conn: &Connection, records: &[Record]) -> Result<(), libsql::Error> {
    for record in records {
        conn.execute(
            "INSERT INTO emails (id, sender, recipient, date, subject, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                sender = excluded.sender,
                recipient = excluded.recipient,
                date = excluded.date,
                subject = excluded.subject,
                content = excluded.content",
            params![
                record.id.as_str(),
                record.sender.as_str(),
                record.recipient.as_str(),
                record.timestamp_text(),
                record.subject.as_str(),
                record.content.as_str(),
            ],
        )
        .await?;
    }
    Ok(())
}

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    async fn upsert_records(&self, records: &[Record]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        let conn = self.scoped_conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_records: begin: {e}")))?;

        if let Err(e) = write_records(&tx, records).await {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "Rollback after failed upsert also failed");
            }
            return Err(DatabaseError::Query(format!("upsert_records: {e}")));
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_records: commit: {e}")))?;

        debug!(count = records.len(), "Records upserted");
        Ok(records.len())
    }

    async fn execute_read(&self, sql: &str) -> Result<ResultSet, DatabaseError> {
        let conn = self.scoped_conn()?;
        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let column_count = rows.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut result = ResultSet {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            let mut values = Vec::with_capacity(result.columns.len());
            for i in 0..column_count {
                let value = row
                    .get_value(i)
                    .map_err(|e| DatabaseError::Query(e.to_string()))?;
                values.push(to_column_value(value));
            }
            result.rows.push(values);
        }

        debug!(rows = result.rows.len(), "Read query materialized");
        Ok(result)
    }

    async fn get_record(&self, id: &str) -> Result<Option<Record>, DatabaseError> {
        let conn = self.scoped_conn()?;
        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?
        {
            Some(row) => Ok(Some(
                row_to_record(&row).map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn count_records(&self) -> Result<usize, DatabaseError> {
        let conn = self.scoped_conn()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM emails", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_records: {e}")))?;

        let count: i64 = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count_records: {e}")))?
        {
            Some(row) => row.get(0).unwrap_or(0),
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(id: &str, subject: &str) -> Record {
        Record {
            id: id.into(),
            sender: "John Doe <john@example.com>".into(),
            recipient: "me@example.com".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 5, 14, 30, 0).unwrap(),
            subject: subject.into(),
            content: "Body".into(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_record() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let written = store.upsert_records(&[record("m1", "Hello")]).await.unwrap();
        assert_eq!(written, 1);

        let got = store.get_record("m1").await.unwrap().unwrap();
        assert_eq!(got, record("m1", "Hello"));
        assert!(store.get_record("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_id() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .upsert_records(&[record("abc123", "First")])
            .await
            .unwrap();
        store
            .upsert_records(&[record("abc123", "Second")])
            .await
            .unwrap();

        assert_eq!(store.count_records().await.unwrap(), 1);
        let got = store.get_record("abc123").await.unwrap().unwrap();
        assert_eq!(got.subject, "Second");
    }

    #[tokio::test]
    async fn upsert_empty_batch_is_noop() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        assert_eq!(store.upsert_records(&[]).await.unwrap(), 0);
        assert_eq!(store.count_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn date_column_uses_text_format() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store.upsert_records(&[record("m1", "x")]).await.unwrap();

        let rs = store
            .execute_read("SELECT date FROM emails WHERE date >= '2025-03-05' AND date < '2025-03-06';")
            .await
            .unwrap();
        assert_eq!(rs.columns, vec!["date".to_string()]);
        assert_eq!(rs.rows, vec![vec![ColumnValue::Text("2025-03-05 14:30:00".into())]]);
    }

    #[tokio::test]
    async fn execute_read_returns_columns_and_typed_values() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .upsert_records(&[record("m1", "a"), record("m2", "b")])
            .await
            .unwrap();

        let rs = store
            .execute_read("SELECT id, COUNT(*) AS n, NULL AS empty FROM emails GROUP BY id ORDER BY id;")
            .await
            .unwrap();
        assert_eq!(rs.columns, vec!["id", "n", "empty"]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows[0][0], ColumnValue::Text("m1".into()));
        assert_eq!(rs.rows[0][1], ColumnValue::Integer(1));
        assert_eq!(rs.rows[0][2], ColumnValue::Null);
    }

    #[tokio::test]
    async fn execute_read_reports_bad_sql() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let err = store.execute_read("SELEC nonsense FROM;").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(ref m) if !m.is_empty()));

        let err = store
            .execute_read("SELECT missing_column FROM emails;")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("emails.db");

        {
            let store = LibSqlBackend::new_local(&db_path).await.unwrap();
            store.upsert_records(&[record("m1", "kept")]).await.unwrap();
            assert_eq!(store.path(), Some(db_path.as_path()));
        }
        assert!(db_path.exists());

        let store = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert_eq!(store.count_records().await.unwrap(), 1);
        let rs = store.execute_read("SELECT subject FROM emails;").await.unwrap();
        assert_eq!(rs.rows, vec![vec![ColumnValue::Text("kept".into())]]);
    }
}
