//! Result store: one pretty-printed JSON record per source item.
//!
//! Records live flat in one directory as `<item key>.json`. Writing the same
//! key again replaces the record, so re-running OCR over an image is
//! idempotent. Reading returns records sorted by key, which fixes the order
//! of the stitched document.

use crate::error::{PantheonError, StitchIssue};
use crate::record::{ItemKey, OcrRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A record read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: ItemKey,
    /// File name the record was read from, for messages.
    pub source: String,
    pub record: OcrRecord,
}

/// Everything [`ResultStore::read_all`] found.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// Valid records, sorted by key.
    pub records: Vec<StoredRecord>,
    /// Record files that were skipped.
    pub skipped: Vec<StitchIssue>,
}

/// Directory-backed record store.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// A store rooted at `dir`. Nothing touches the filesystem yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: &ItemKey) -> PathBuf {
        self.dir.join(key.record_file_name())
    }

    /// Create the store directory if needed.
    pub async fn ensure_dir(&self) -> Result<(), PantheonError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PantheonError::Workspace {
                path: self.dir.clone(),
                source,
            })
    }

    /// Persist `record` under `key`, replacing any previous record.
    ///
    /// Writes to a sibling temp file and renames it into place, so readers
    /// never see a half-written record. The temp file is removed if either
    /// step fails.
    pub async fn write(&self, key: &ItemKey, record: &OcrRecord) -> std::io::Result<PathBuf> {
        let path = self.record_path(key);
        let json = serde_json::to_string_pretty(record)?;

        let tmp_path = path.with_extension("json.tmp");
        let written = match tokio::fs::write(&tmp_path, json).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        debug!("Saved record {}", path.display());
        Ok(path)
    }

    /// Read every `.json` record, sorted by key.
    ///
    /// Fails only when there is nothing to read at all. Unreadable or
    /// malformed files are skipped with a warning and listed in
    /// [`RecordSet::skipped`].
    pub fn read_all(&self) -> Result<RecordSet, PantheonError> {
        let no_records = || PantheonError::NoRecords {
            dir: self.dir.clone(),
        };

        let entries = std::fs::read_dir(&self.dir).map_err(|_| no_records())?;
        let mut files: Vec<(ItemKey, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| ItemKey::from_path(&p).map(|key| (key, p)))
            .collect();

        if files.is_empty() {
            return Err(no_records());
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut set = RecordSet::default();
        for (key, path) in files {
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| key.record_file_name());

            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| StitchIssue::Parse {
                    record: source.clone(),
                    detail: e.to_string(),
                })
                .and_then(|text| OcrRecord::parse_lenient(&text, &source));

            match parsed {
                Ok(record) => set.records.push(StoredRecord {
                    key,
                    source,
                    record,
                }),
                Err(issue) => {
                    warn!("{issue}");
                    set.skipped.push(issue);
                }
            }
        }

        Ok(set)
    }
}
