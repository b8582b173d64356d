use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{ContactInfo, FieldMap, StepId, WizardSession};

/// Bump when the snapshot layout changes; older snapshots are then ignored.
pub const SNAPSHOT_VERSION: u32 = 1;

const KEY_PREFIX: &str = "casaready.wizard";

/// Minimal resumable subset of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    pub version: u32,
    pub current_step: StepId,
    pub total_steps: u8,
    pub step_data: BTreeMap<StepId, FieldMap>,
    pub contact_info: ContactInfo,
    pub completed_steps: BTreeSet<StepId>,
    pub saved_at: DateTime<Utc>,
}

impl WizardSnapshot {
    pub fn capture(session: &WizardSession, now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_step: session.current_step,
            total_steps: session.total_steps,
            step_data: session.step_data.clone(),
            contact_info: session.contact_info.clone(),
            completed_steps: session.completed_steps.clone(),
            saved_at: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.saved_at).max(chrono::Duration::zero())
    }
}

/// Read-only view for a "resume where you left off?" prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeSummary {
    pub step: StepId,
    pub total_steps: u8,
    pub completed_count: usize,
    pub age_seconds: i64,
}

/// Keyed string store backing snapshots (browser storage, files, memory).
pub trait SnapshotStorage: Send + Sync + Debug {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl SnapshotStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// One JSON file per key under `root`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

impl SnapshotStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, value)?;
        std::fs::rename(staging, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Storage that is switched off (private browsing, disabled by policy).
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStorage;

impl SnapshotStorage for DisabledStorage {
    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }

    fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }
}

/// Saves and restores wizard snapshots. Every storage failure is logged and swallowed,
/// leaving the wizard in session-only mode.
#[derive(Debug, Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn SnapshotStorage>,
    key: String,
    resume_window: Duration,
}

impl PersistenceAdapter {
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        namespace: &str,
        resume_window: Duration,
    ) -> Self {
        Self {
            storage,
            key: format!("{KEY_PREFIX}.{namespace}"),
            resume_window,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, session: &WizardSession, now: DateTime<Utc>) {
        let snapshot = WizardSnapshot::capture(session, now);
        let encoded = match serde_json::to_string(&snapshot) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key = %self.key, error = %err, "unable to encode wizard snapshot");
                return;
            }
        };

        if let Err(err) = self.storage.write(&self.key, &encoded) {
            warn!(key = %self.key, error = %err, "wizard snapshot not saved");
        }
    }

    /// Returns `None` when nothing is stored or the stored data cannot be decoded.
    pub fn load(&self) -> Option<WizardSnapshot> {
        let raw = match self.storage.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "wizard snapshot unreadable");
                return None;
            }
        };

        match serde_json::from_str::<WizardSnapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot),
            Ok(snapshot) => {
                warn!(
                    key = %self.key,
                    version = snapshot.version,
                    "ignoring snapshot from another schema version"
                );
                None
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "ignoring corrupt wizard snapshot");
                None
            }
        }
    }

    /// Like [`load`](Self::load) but also drops snapshots older than the resume window.
    pub fn load_resumable(&self, now: DateTime<Utc>) -> Option<WizardSnapshot> {
        let snapshot = self.load()?;
        if self.is_stale(&snapshot, now) {
            self.clear();
            return None;
        }
        Some(snapshot)
    }

    pub fn is_stale(&self, snapshot: &WizardSnapshot, now: DateTime<Utc>) -> bool {
        snapshot
            .age(now)
            .to_std()
            .map(|age| age > self.resume_window)
            .unwrap_or(false)
    }

    pub fn summarize(&self, snapshot: &WizardSnapshot, now: DateTime<Utc>) -> ResumeSummary {
        ResumeSummary {
            step: snapshot.current_step,
            total_steps: snapshot.total_steps,
            completed_count: snapshot.completed_steps.len(),
            age_seconds: snapshot.age(now).num_seconds(),
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %err, "wizard snapshot not cleared");
        }
    }
}
