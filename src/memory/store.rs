//! Durable per-identity memory storage.
//!
//! One flat JSON file holds every identity's record. Writes go through a
//! temp-sibling + fsync + atomic-rename sequence so a reader never observes
//! a half-written file; a corrupt file on load is quarantined rather than
//! crashing the process (losing memory beats refusing to serve anyone).

use crate::{MnemoError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::MemoryRecord;

/// Attempts for a transient I/O failure during save before failing loudly.
const SAVE_ATTEMPTS: u32 = 3;

/// Delay between save attempts.
const SAVE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Process-wide durable store, shared across all concurrently handled
/// sessions. The in-memory map and the temp-file/rename sequence are guarded
/// by one mutex so two concurrent `put`s never interleave.
pub struct MemoryStore {
    file_path: PathBuf,
    inner: Mutex<BTreeMap<String, MemoryRecord>>,
}

impl MemoryStore {
    /// Open the store, loading the durable file if present.
    ///
    /// A missing file is a cold start, not an error. A file that fails to
    /// parse is renamed aside with a timestamp suffix and the store starts
    /// empty.
    pub async fn open(file_path: PathBuf) -> Result<Self> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let records = Self::load(&file_path).await?;
        info!(
            path = %file_path.display(),
            identities = records.len(),
            "Opened memory store"
        );

        Ok(Self {
            file_path,
            inner: Mutex::new(records),
        })
    }

    /// Read and validate the durable file.
    async fn load(path: &Path) -> Result<BTreeMap<String, MemoryRecord>> {
        if !path.exists() {
            debug!(path = %path.display(), "No memory file yet, starting empty");
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await?;
        match serde_json::from_str::<BTreeMap<String, MemoryRecord>>(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                let quarantine = Self::quarantine_path(path);
                warn!(
                    path = %path.display(),
                    quarantined_to = %quarantine.display(),
                    error = %e,
                    "Memory file failed validation, quarantining and starting empty"
                );
                fs::rename(path, &quarantine).await?;
                Ok(BTreeMap::new())
            }
        }
    }

    fn quarantine_path(path: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "memory".to_string());
        path.with_file_name(format!("{}.corrupt-{}", name, stamp))
    }

    /// Get the record for an identity, or a fresh empty record (version 0)
    /// if the identity has not been seen. Never an error.
    pub async fn get(&self, identity: &str) -> MemoryRecord {
        let records = self.inner.lock().await;
        records
            .get(identity)
            .cloned()
            .unwrap_or_else(|| MemoryRecord::empty(identity))
    }

    /// Replace an identity's record and persist the whole store.
    ///
    /// Optimistic concurrency: the incoming record's `version` must be
    /// exactly one past the stored version (0 for an unseen identity), or
    /// the call fails with [`MnemoError::StaleWrite`] and the caller must
    /// re-read, re-apply, and retry.
    pub async fn put(&self, identity: &str, record: MemoryRecord) -> Result<()> {
        let mut records = self.inner.lock().await;

        let current = records.get(identity).map(|r| r.version).unwrap_or(0);
        if record.version != current + 1 {
            return Err(MnemoError::StaleWrite {
                identity: identity.to_string(),
                given: record.version,
                expected: current + 1,
            });
        }

        let previous = records.insert(identity.to_string(), record);
        if let Err(e) = Self::save(&self.file_path, &records).await {
            // Keep memory consistent with disk so the version check
            // stays meaningful on the retry path.
            match previous {
                Some(p) => {
                    records.insert(identity.to_string(), p);
                }
                None => {
                    records.remove(identity);
                }
            }
            return Err(e);
        }

        debug!(identity, version = current + 1, "Persisted memory record");
        Ok(())
    }

    /// Write the full mapping durably: serialize to a temp sibling, fsync,
    /// then atomically rename over the target. Bounded retry on transient
    /// I/O failure, then fail loudly.
    async fn save(path: &Path, records: &BTreeMap<String, MemoryRecord>) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;

        let mut last_err = None;
        for attempt in 1..=SAVE_ATTEMPTS {
            match Self::write_atomic(path, &content).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        path = %path.display(),
                        "Memory save attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < SAVE_ATTEMPTS {
                        tokio::time::sleep(SAVE_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            MnemoError::MemoryUnavailable("save failed without error detail".to_string())
        }))
    }

    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Persist the current in-memory state. Called on shutdown.
    pub async fn flush(&self) -> Result<()> {
        let records = self.inner.lock().await;
        Self::save(&self.file_path, &records).await
    }

    /// Number of identities currently held.
    pub async fn identity_count(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
