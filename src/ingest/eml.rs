//! `.eml` directory source — imports saved messages from disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::ingest::MailSource;
use crate::ingest::parse::parse_record;
use crate::store::Record;

/// Reads `*.eml` files from one directory, newest first by modification time.
pub struct EmlDirSource {
    dir: PathBuf,
}

impl EmlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
}

#[async_trait]
impl MailSource for EmlDirSource {
    fn name(&self) -> &str {
        "eml-dir"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Record>, IngestError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            IngestError::FetchFailed {
                name: self.name().to_string(),
                reason: format!("cannot read {}: {e}", self.dir.display()),
            }
        })?;

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_eml(&path) {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
            }
        }
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut records = Vec::new();
        for (_, path) in files.into_iter().take(limit) {
            let raw = tokio::fs::read(&path).await?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| format!("eml-{s}"));
            match parse_record(&raw, stem.as_deref()) {
                Some(record) => records.push(record),
                None => warn!(path = %path.display(), "Skipping unparseable message file"),
            }
        }

        debug!(dir = %self.dir.display(), count = records.len(), "Read messages from directory");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_eml(dir: &Path, name: &str, id: &str, subject: &str) {
        let raw = format!(
            "From: Sam <sam@example.com>\r\nMessage-ID: <{id}>\r\nSubject: {subject}\r\nDate: Mon, 03 Mar 2025 12:00:00 +0000\r\n\r\nbody\r\n"
        );
        std::fs::write(dir.join(name), raw).unwrap();
    }

    #[tokio::test]
    async fn reads_only_eml_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_eml(tmp.path(), "a.eml", "a@x", "A");
        write_eml(tmp.path(), "b.EML", "b@x", "B");
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let source = EmlDirSource::new(tmp.path());
        let mut records = source.fetch_recent(10).await.unwrap();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a@x");
        assert_eq!(records[1].subject, "B");
    }

    #[tokio::test]
    async fn respects_limit() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_eml(tmp.path(), &format!("m{i}.eml"), &format!("m{i}@x"), "s");
        }
        let source = EmlDirSource::new(tmp.path());
        assert_eq!(source.fetch_recent(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_directory_is_fetch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = EmlDirSource::new(tmp.path().join("absent"));
        let err = source.fetch_recent(10).await.unwrap_err();
        assert!(matches!(err, IngestError::FetchFailed { .. }));
    }

    #[test]
    fn eml_extension_check() {
        assert!(is_eml(Path::new("x.eml")));
        assert!(is_eml(Path::new("x.Eml")));
        assert!(!is_eml(Path::new("x.txt")));
        assert!(!is_eml(Path::new("eml")));
    }
}
