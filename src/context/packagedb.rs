//! Installed-module database.
//!
//! Records the revision identifier each module was installed from. Entries are
//! kept in a JSON file next to the install prefix.

use crate::error::PackageDbError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Record of an installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub revision: String,
    pub installed_at: DateTime<Utc>,
}

/// Store of installed module revisions. `add` is an idempotent upsert and must
/// be safe to call from several module builds at once.
pub trait PackageDb: Send + Sync {
    fn add(&self, module: &str, revision: &str) -> Result<(), PackageDbError>;

    fn get(&self, module: &str) -> Option<PackageEntry>;
}

/// JSON-file backed package database. With no path it stays in memory.
pub struct JsonPackageDb {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, PackageEntry>>,
}

impl JsonPackageDb {
    /// Opens the database at `path`, loading existing entries if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PackageDbError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| PackageDbError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened package database");

        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn modules(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn persist(&self, entries: &BTreeMap<String, PackageEntry>) -> Result<(), PackageDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source: std::io::Error| PackageDbError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

impl PackageDb for JsonPackageDb {
    fn add(&self, module: &str, revision: &str) -> Result<(), PackageDbError> {
        let mut entries = self.entries.write().map_err(|_| PackageDbError::Poisoned)?;
        let mut updated = entries.clone();
        updated.insert(
            module.to_string(),
            PackageEntry {
                revision: revision.to_string(),
                installed_at: Utc::now(),
            },
        );
        // Only commit what made it to disk.
        self.persist(&updated)?;
        *entries = updated;
        debug!(module, revision, "Recorded installed module");
        Ok(())
    }

    fn get(&self, module: &str) -> Option<PackageEntry> {
        self.entries.read().ok()?.get(module).cloned()
    }
}
