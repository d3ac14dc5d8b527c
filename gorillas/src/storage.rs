//! Durable client-side key/value storage.
//!
//! The session token, the pending referral code and the locally claimed task
//! overlay all live here so they survive a restart. [`FileStorage`] persists
//! to a JSON file; [`MemoryStorage`] backs tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{GorillasError, Result};

/// Well-known storage keys.
pub mod keys {
    /// Bearer token of the current session.
    pub const AUTH_TOKEN: &str = "authToken";
    /// Referral code captured but not yet submitted.
    pub const PENDING_REFERRAL: &str = "pendingReferralCode";

    /// Locally claimed task ids for one wallet address.
    pub fn claimed_tasks(address: &str) -> String {
        format!("claimedTasks_{}", address.to_lowercase())
    }
}

/// A durable string key/value store.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Whether durable storage can be used at all in this context.
    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
    available: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            available: true,
        }
    }

    /// A store that reports itself unavailable, as in a context without
    /// durable storage. Reads return nothing and writes fail.
    pub fn unavailable() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            available: false,
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn is_available(&self) -> bool {
        self.available
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.available {
            return None;
        }
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if !self.available {
            return Err(GorillasError::Storage("storage unavailable".into()));
        }
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.available {
            return Ok(());
        }
        self.entries().remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// The whole map is rewritten on every mutation; the data set is a handful of
/// short strings.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let data = fs::read_to_string(path)?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&data).map_err(|e| {
                    GorillasError::Storage(format!(
                        "failed to parse storage file {}: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "storage opened");

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}
