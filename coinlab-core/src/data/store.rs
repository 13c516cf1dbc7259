//! CSV dataset store.
//!
//! Layout under the data root:
//!
//! - `symbols/crypto_symbols_{YYYYmmdd_HHMMSS}.csv`: one entity snapshot per collection run
//! - `historical/{id}_historical.csv`: daily OHLCV bars per entity
//! - `metrics/{id}_metrics.csv`: daily metric snapshots per entity
//!
//! Series files are rewritten in full on every save: existing rows are
//! merged with the new ones by date (newest wins), re-sorted and written
//! atomically (`.tmp` then rename). A file that can no longer be parsed is
//! moved aside to `{file}.quarantined` and replaced by the new rows alone.
//! Saves never return an error; they report a [`SaveOutcome`] instead.

use crate::domain::{Entity, HistoricalBar, MetricSnapshot};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

const SYMBOLS_DIR: &str = "symbols";
const HISTORICAL_DIR: &str = "historical";
const METRICS_DIR: &str = "metrics";
const SNAPSHOT_PREFIX: &str = "crypto_symbols_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A persisted row with a unique, ordered key.
pub trait Record: Serialize + DeserializeOwned + Clone {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

impl Record for HistoricalBar {
    type Key = NaiveDate;

    fn key(&self) -> NaiveDate {
        self.date
    }
}

impl Record for MetricSnapshot {
    type Key = NaiveDate;

    fn key(&self) -> NaiveDate {
        self.date
    }
}

/// What a save did to the collection on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save; the file was not touched.
    NoChange,
    /// Merged and rewritten; `rows` is the resulting row count.
    Written { rows: usize },
    /// The existing file was unreadable and has been replaced by the new rows.
    Recovered { rows: usize },
    /// The write itself failed; the previous file (if any) is intact.
    Failed(String),
}

impl SaveOutcome {
    /// True if the new rows are now on disk.
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Written { .. } | Self::Recovered { .. })
    }
}

/// File counts backing the status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStatus {
    pub snapshot_count: usize,
    pub history_file_count: usize,
    pub metrics_file_count: usize,
}

/// Merge `new_rows` into `existing` by key. New rows win on collision and
/// the result is sorted ascending with no duplicate keys.
pub fn merge_rows<R: Record>(existing: Vec<R>, new_rows: &[R]) -> Vec<R> {
    let mut by_key: BTreeMap<R::Key, R> = BTreeMap::new();
    for row in existing {
        by_key.insert(row.key(), row);
    }
    for row in new_rows {
        by_key.insert(row.key(), row.clone());
    }
    by_key.into_values().collect()
}

/// Flat-file store for entity snapshots and per-entity series.
///
/// The read-merge-write cycle is not safe against concurrent writers to the
/// same entity; callers must serialize saves per entity.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self, entity_id: &str) -> PathBuf {
        self.root
            .join(HISTORICAL_DIR)
            .join(format!("{entity_id}_historical.csv"))
    }

    pub fn metrics_path(&self, entity_id: &str) -> PathBuf {
        self.root
            .join(METRICS_DIR)
            .join(format!("{entity_id}_metrics.csv"))
    }

    fn symbols_dir(&self) -> PathBuf {
        self.root.join(SYMBOLS_DIR)
    }

    // ── Series ──

    pub fn save_history(&self, entity_id: &str, bars: &[HistoricalBar]) -> SaveOutcome {
        self.save_merged(&self.history_path(entity_id), bars)
    }

    pub fn save_metrics(&self, entity_id: &str, snapshots: &[MetricSnapshot]) -> SaveOutcome {
        self.save_merged(&self.metrics_path(entity_id), snapshots)
    }

    /// Merge `new_rows` into the collection at `path` and rewrite it.
    pub fn save_merged<R: Record>(&self, path: &Path, new_rows: &[R]) -> SaveOutcome {
        if new_rows.is_empty() {
            return SaveOutcome::NoChange;
        }

        let (existing, recovered) = if path.exists() {
            match read_rows::<R>(path) {
                Ok(rows) => (rows, false),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "existing file unreadable, keeping new rows only");
                    quarantine(path);
                    (Vec::new(), true)
                }
            }
        } else {
            (Vec::new(), false)
        };

        let merged = merge_rows(existing, new_rows);
        match write_rows_atomic(path, &merged) {
            Ok(()) => {
                debug!(path = %path.display(), rows = merged.len(), "saved");
                if recovered {
                    SaveOutcome::Recovered { rows: merged.len() }
                } else {
                    SaveOutcome::Written { rows: merged.len() }
                }
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "save failed");
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    /// Latest date key in an entity's history, as stored.
    ///
    /// Absent file, empty file and read errors all yield `None`.
    pub fn last_key(&self, entity_id: &str) -> Option<String> {
        let path = self.history_path(entity_id);
        if !path.exists() {
            return None;
        }
        match read_date_column(&path) {
            Ok(dates) => dates.into_iter().max(),
            Err(e) => {
                warn!(entity = entity_id, error = %e, "could not read last date");
                None
            }
        }
    }

    /// True if the entity has a historical file.
    pub fn exists(&self, entity_id: &str) -> bool {
        self.history_path(entity_id).is_file()
    }

    /// Full history for an entity. A missing file is an empty history.
    pub fn load_history(&self, entity_id: &str) -> Result<Vec<HistoricalBar>, StoreError> {
        read_rows_if_present(&self.history_path(entity_id))
    }

    /// Full metric series for an entity. A missing file is an empty series.
    pub fn load_metrics(&self, entity_id: &str) -> Result<Vec<MetricSnapshot>, StoreError> {
        read_rows_if_present(&self.metrics_path(entity_id))
    }

    // ── Entity snapshots ──

    /// Most recent snapshot file, resolved by filename ordering.
    pub fn latest_snapshot_file(&self) -> Option<PathBuf> {
        list_files(&self.symbols_dir())
            .into_iter()
            .filter(|p| is_snapshot_file(p))
            .max()
    }

    /// Entities from the most recent snapshot; empty if there is none.
    pub fn load_entities(&self) -> Result<Vec<Entity>, StoreError> {
        match self.latest_snapshot_file() {
            Some(path) => read_rows(&path),
            None => Ok(Vec::new()),
        }
    }

    /// Write a new snapshot file stamped with the current UTC time.
    pub fn save_entities(&self, entities: &[Entity]) -> SaveOutcome {
        self.save_entities_at(entities, Utc::now().naive_utc())
    }

    /// Write a new snapshot file stamped with `at`.
    pub fn save_entities_at(&self, entities: &[Entity], at: NaiveDateTime) -> SaveOutcome {
        if entities.is_empty() {
            return SaveOutcome::NoChange;
        }
        let path = self
            .symbols_dir()
            .join(format!("{SNAPSHOT_PREFIX}{}.csv", at.format("%Y%m%d_%H%M%S")));
        match write_rows_atomic(&path, entities) {
            Ok(()) => SaveOutcome::Written {
                rows: entities.len(),
            },
            Err(e) => {
                error!(path = %path.display(), error = %e, "entity snapshot save failed");
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            snapshot_count: list_files(&self.symbols_dir())
                .iter()
                .filter(|p| is_snapshot_file(p))
                .count(),
            history_file_count: count_csv(&self.root.join(HISTORICAL_DIR)),
            metrics_file_count: count_csv(&self.root.join(METRICS_DIR)),
        }
    }
}

// ── File helpers ──

fn read_rows<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(csv_err)
}

fn read_rows_if_present<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, StoreError> {
    if path.exists() {
        read_rows(path)
    } else {
        Ok(Vec::new())
    }
}

fn read_date_column(path: &Path) -> Result<Vec<String>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let idx = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h == "date");
    let Some(idx) = idx else {
        return Ok(Vec::new());
    };

    let mut dates = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if let Some(value) = record.get(idx).filter(|v| !v.is_empty()) {
            dates.push(value.to_string());
        }
    }
    Ok(dates)
}

fn write_rows_atomic<R: Serialize>(path: &Path, rows: &[R]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let written = (|| {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok::<(), csv::Error>(())
    })();
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Csv {
            path: tmp_path,
            source,
        });
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })
}

fn quarantine(path: &Path) {
    let mut target = path.as_os_str().to_owned();
    target.push(".quarantined");
    if let Err(e) = fs::rename(path, &target) {
        warn!(path = %path.display(), error = %e, "could not quarantine file");
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect()
}

fn is_snapshot_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(".csv"))
}

fn count_csv(dir: &Path) -> usize {
    list_files(dir)
        .iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .count()
}
