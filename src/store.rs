//! Durable job store.
//!
//! A single JSON document on disk holding a string-keyed map; job records
//! live under `job:<id>` keys so they can be enumerated by prefix. The store
//! has no locking discipline: exactly one scheduler process should write to
//! a given document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{BatonError, Result};
use crate::scheduler::job::Job;

/// Key prefix for job records.
const JOB_KEY_PREFIX: &str = "job:";

/// File-backed key/value store for job descriptors.
#[derive(Debug, Clone)]
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    /// Open a store backed by the given document path.
    ///
    /// The file is created lazily on the first write; a missing file reads
    /// as an empty store.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a job descriptor under `job:<id>`, overwriting any existing
    /// entry with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`BatonError::StoreUnavailable`] when the document cannot be
    /// read or written.
    pub fn put(&self, job: &Job) -> Result<()> {
        let mut doc = self.read_document()?;
        let value = serde_json::to_value(job)
            .map_err(|e| BatonError::StoreUnavailable(format!("cannot serialize job: {e}")))?;
        doc.insert(job_key(&job.id), value);
        self.write_document(&doc)
    }

    /// Fetch one job descriptor by id.
    ///
    /// An unreadable record is logged and reported as absent.
    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let doc = self.read_document()?;
        let Some(value) = doc.get(&job_key(id)) else {
            return Ok(None);
        };
        match serde_json::from_value(value.clone()) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!(job_id = id, "skipping unreadable job record: {e}");
                Ok(None)
            }
        }
    }

    /// Return every stored job descriptor, enumerating keys under the
    /// `job:` prefix. Order is unspecified.
    ///
    /// Records that fail to deserialize are logged and skipped so one bad
    /// entry never takes down an evaluation pass.
    pub fn list_all(&self) -> Result<Vec<Job>> {
        let doc = self.read_document()?;
        let mut jobs = Vec::new();
        for (key, value) in &doc {
            if !key.starts_with(JOB_KEY_PREFIX) {
                continue;
            }
            match serde_json::from_value(value.clone()) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(key = key.as_str(), "skipping unreadable job record: {e}"),
            }
        }
        Ok(jobs)
    }

    /// Remove a job descriptor. Deleting an id that is not present is a
    /// no-op, not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut doc = self.read_document()?;
        if doc.remove(&job_key(id)).is_none() {
            return Ok(());
        }
        self.write_document(&doc)
    }

    fn read_document(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(BatonError::StoreUnavailable(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            BatonError::StoreUnavailable(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn write_document(&self, doc: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BatonError::StoreUnavailable(format!("cannot create store dir: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| BatonError::StoreUnavailable(format!("cannot serialize store: {e}")))?;

        // Write-then-rename keeps a crashed write from truncating the store.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| BatonError::StoreUnavailable(format!("cannot write store: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| BatonError::StoreUnavailable(format!("cannot write store: {e}")))?;

        Ok(())
    }
}

fn job_key(id: &str) -> String {
    format!("{JOB_KEY_PREFIX}{id}")
}
