//! Persistent, append-only results store backed by one JSON document.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use at_types::{
    config_error, BestSoFar, Configuration, Cost, History, StoreError, TrialRecord, TuneResult,
};

/// Summary written once a run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub algorithm: String,
    pub total_runtime_sec: f64,
}

/// On-disk layout: `{ "records": [...], "best": {...}, "summary": {...} }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub records: Vec<TrialRecord>,
    pub best: BestSoFar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

/// Handle on an experiment's results document.
///
/// Every read-modify-write runs under a lock shared by all handles on the
/// same document in this process. The store is meant to have a single
/// writing task per document; handles in other processes are not
/// coordinated.
#[derive(Debug)]
pub struct ResultsStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

/// One lock per canonical document path, shared process-wide.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS.get_or_init(Default::default).lock();
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

impl ResultsStore {
    /// Open or create the document at `path`. An existing valid document is
    /// kept as-is; an unreadable one is reported, never reset.
    pub fn open<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .ok_or_else(|| config_error!("'{}' does not name a store file", path.display()))?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let path = std::fs::canonicalize(parent)?.join(file_name);

        let store = Self {
            lock: path_lock(&path),
            path,
        };

        let guard = store.lock.lock();
        if store.path.exists() {
            let existing = store.read_document()?;
            debug!(path = %store.path.display(), records = existing.records.len(), "reusing results store");
        } else {
            store.write_document(&StoreDocument::default())?;
        }
        drop(guard);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one trial and lower the best if this result is strictly better.
    pub fn save(&self, config: &Configuration, time: Cost) -> TuneResult<()> {
        let _guard = self.lock.lock();
        let mut doc = self.read_document()?;
        doc.records.push(TrialRecord::new(config.clone(), time));
        doc.best.offer(config, time);
        self.write_document(&doc)
    }

    /// Every recorded trial keyed by canonical configuration.
    pub fn get_all(&self) -> TuneResult<History> {
        Ok(self
            .document()?
            .records
            .into_iter()
            .map(|r| (r.config.canonical_key(), r.time))
            .collect())
    }

    pub fn get_best(&self) -> TuneResult<BestSoFar> {
        Ok(self.document()?.best)
    }

    /// Records in the order they were saved.
    pub fn records(&self) -> TuneResult<Vec<TrialRecord>> {
        Ok(self.document()?.records)
    }

    pub fn len(&self) -> TuneResult<usize> {
        Ok(self.document()?.records.len())
    }

    pub fn is_empty(&self) -> TuneResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn summary(&self) -> TuneResult<Option<RunSummary>> {
        Ok(self.document()?.summary)
    }

    pub fn add_summary(&self, algorithm: &str, total_runtime: Duration) -> TuneResult<()> {
        let _guard = self.lock.lock();
        let mut doc = self.read_document()?;
        doc.summary = Some(RunSummary {
            algorithm: algorithm.to_string(),
            total_runtime_sec: (total_runtime.as_secs_f64() * 1000.0).round() / 1000.0,
        });
        self.write_document(&doc)
    }

    pub fn document(&self) -> TuneResult<StoreDocument> {
        let _guard = self.lock.lock();
        self.read_document()
    }

    fn read_document(&self) -> TuneResult<StoreDocument> {
        let bytes = std::fs::read(&self.path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Corruption {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Write to a uniquely named sibling file, then rename over the document.
    fn write_document(&self, doc: &StoreDocument) -> TuneResult<()> {
        let blob = serde_json::to_vec_pretty(doc)?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let tmp = self.path.with_file_name(tmp_name);

        let persist = std::fs::write(&tmp, blob).and_then(|()| std::fs::rename(&tmp, &self.path));
        if persist.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        persist.map_err(|source| {
            StoreError::WriteFailed {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }
}
