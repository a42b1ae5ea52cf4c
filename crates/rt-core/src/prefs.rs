//! Preference sync - range filter bounds in a host-provided key-value store
//!
//! Reads happen once, when a table instance is created. Writes are queued to a
//! background writer so the render path never waits on the store.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::columns::{filterable, FilterKind};
use crate::filter::{FilterState, RangeBounds};
use crate::row::ColumnId;

/// Default prefix of every preference key
pub const DEFAULT_KEY_PREFIX: &str = "rocketTable.";

/// Errors raised by preference stores
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value store owned by the host
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);
}

/// In-process store, the equivalent of browser local storage for tests and
/// hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<AHashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.write().insert(key.to_string(), value);
    }
}

/// Store backed by a JSON object file, rewritten on every set
pub struct FilePreferenceStore {
    path: PathBuf,
    values: RwLock<AHashMap<String, String>>,
}

impl FilePreferenceStore {
    /// Open the file at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => AHashMap::new(),
            Ok(text) => serde_json::from_str::<HashMap<String, String>>(&text)?
                .into_iter()
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AHashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values: RwLock::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &AHashMap<String, String>) -> Result<(), PrefsError> {
        // Sorted so the file is stable across writes
        let sorted: BTreeMap<&String, &String> = values.iter().collect();
        let text = serde_json::to_string_pretty(&sorted)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        if let Err(e) = self.flush(&values) {
            tracing::error!("Failed to write preferences to {:?}: {}", self.path, e);
        }
    }
}

/// Key of one range bound
pub fn bound_key(prefix: &str, column: ColumnId, bound: Bound) -> String {
    format!("{}{}.{}", prefix, column.as_str(), bound.suffix())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    fn suffix(self) -> &'static str {
        match self {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }
}

fn encode_bound(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn decode_bound(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Mirrors the range bounds of a [`FilterState`] into a [`PreferenceStore`]
pub struct PreferenceSync {
    prefix: String,
    store: Arc<dyn PreferenceStore>,
    /// Last value written (or read) per key
    persisted: AHashMap<String, String>,
    writes: Option<mpsc::UnboundedSender<(String, String)>>,
    writer: Option<JoinHandle<()>>,
}

impl PreferenceSync {
    /// Create the sync and spawn its writer task on `handle`
    pub fn new(
        handle: &Handle,
        store: Arc<dyn PreferenceStore>,
        prefix: impl Into<String>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, String)>();
        let writer_store = store.clone();

        let writer = handle.spawn(async move {
            while let Some((key, value)) = rx.recv().await {
                let store = writer_store.clone();
                let result = tokio::task::spawn_blocking(move || store.set(&key, value)).await;
                if let Err(e) = result {
                    tracing::error!("Preference write task failed: {}", e);
                }
            }
            tracing::debug!("Preference writer finished");
        });

        Self {
            prefix: prefix.into(),
            store,
            persisted: AHashMap::new(),
            writes: Some(tx),
            writer: Some(writer),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read the stored bounds of every range column. Called once at construction;
    /// the values read are remembered so they are not written straight back.
    pub fn restore(&mut self) -> Vec<(ColumnId, RangeBounds)> {
        let mut restored = Vec::new();
        for column in filterable(FilterKind::Range) {
            let mut bounds = RangeBounds::default();
            for bound in [Bound::Min, Bound::Max] {
                let key = bound_key(&self.prefix, column.id, bound);
                let Some(text) = self.store.get(&key) else {
                    continue;
                };
                let value = decode_bound(&text);
                match bound {
                    Bound::Min => bounds.min = value,
                    Bound::Max => bounds.max = value,
                }
                self.persisted.insert(key, encode_bound(value));
            }
            if !bounds.is_unbounded() {
                restored.push((column.id, bounds));
            }
        }
        tracing::debug!("Restored {} range filters from preferences", restored.len());
        restored
    }

    /// Queue writes for every range bound that differs from what was last persisted
    pub fn persist(&mut self, filters: &FilterState) {
        for column in filterable(FilterKind::Range) {
            let bounds = filters.range(column.id);
            for (bound, value) in [(Bound::Min, bounds.min), (Bound::Max, bounds.max)] {
                let key = bound_key(&self.prefix, column.id, bound);
                let encoded = encode_bound(value);
                let unchanged = match self.persisted.get(&key) {
                    Some(previous) => *previous == encoded,
                    // Never stored: an absent bound needs no write
                    None => value.is_none(),
                };
                if unchanged {
                    continue;
                }
                self.persisted.insert(key.clone(), encoded.clone());
                self.enqueue(key, encoded);
            }
        }
    }

    fn enqueue(&self, key: String, value: String) {
        let Some(writes) = &self.writes else {
            return;
        };
        if writes.send((key, value)).is_err() {
            tracing::warn!("Preference writer is gone, dropping write");
        }
    }

    /// Stop accepting writes and let the writer drain what is already queued
    pub fn close(&mut self) -> Option<JoinHandle<()>> {
        self.writes.take();
        self.writer.take()
    }
}

impl Drop for PreferenceSync {
    fn drop(&mut self) {
        // Dropping the sender ends the writer loop once the queue is empty
        self.writes.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut sync: PreferenceSync) {
        if let Some(writer) = sync.close() {
            writer.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_restore_reads_both_bounds() {
        let store = Arc::new(MemoryPreferenceStore::with_values([
            ("rocketTable.twr.min", "1.2"),
            ("rocketTable.twr.max", ""),
            ("rocketTable.wet_mass.max", "not a number"),
        ]));
        let mut sync = PreferenceSync::new(&Handle::current(), store, DEFAULT_KEY_PREFIX);

        let restored = sync.restore();
        assert_eq!(restored, vec![(ColumnId::Twr, RangeBounds::new(Some(1.2), None))]);
        drain(sync).await;
    }

    #[tokio::test]
    async fn test_persist_writes_only_changes() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let mut sync = PreferenceSync::new(&Handle::current(), store.clone(), DEFAULT_KEY_PREFIX);
        sync.restore();

        let mut filters = FilterState::new();
        sync.persist(&filters);

        filters.set_range(ColumnId::WetMass, Some(2.0), Some(8.0)).unwrap();
        sync.persist(&filters);
        filters.set_range(ColumnId::WetMass, Some(2.0), None).unwrap();
        sync.persist(&filters);
        drain(sync).await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("rocketTable.wet_mass.min").as_deref(), Some("2"));
        assert_eq!(store.get("rocketTable.wet_mass.max").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_restored_values_not_written_back() {
        let store = Arc::new(MemoryPreferenceStore::with_values([("rocketTable.twr.min", "1.5")]));
        let mut sync = PreferenceSync::new(&Handle::current(), store.clone(), DEFAULT_KEY_PREFIX);

        let mut filters = FilterState::new();
        for (column, bounds) in sync.restore() {
            filters.set_range(column, bounds.min, bounds.max).unwrap();
        }
        sync.persist(&filters);
        drain(sync).await;

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FilePreferenceStore::open(&path).unwrap();
        assert_eq!(store.get("rocketTable.twr.min"), None);
        store.set("rocketTable.twr.min", "0.8".to_string());

        let reopened = FilePreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get("rocketTable.twr.min").as_deref(), Some("0.8"));
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(FilePreferenceStore::open(&path), Err(PrefsError::Json(_))));
    }
}
