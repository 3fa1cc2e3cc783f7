//! Persistence layer — single-table libSQL record store.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    ColumnValue, Record, RecordStore, ResultSet, TABLE_NAME, TIMESTAMP_COLUMN, TIMESTAMP_FORMAT,
};
