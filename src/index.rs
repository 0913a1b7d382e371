//! Persisted metadata index for tracked content files.
//!
//! One JSON document per processed directory (`.mdxgen-index.json`) maps
//! content hashes to [`FileRecord`]s. Keying by **content hash** rather
//! than path is what lets metadata survive renames: when a file moves —
//! whether by this tool or by hand — the next scan finds the same hash at
//! a new path and re-attaches the existing record instead of minting a
//! duplicate.
//!
//! ## Invariants
//!
//! - Every live file in the directory has exactly one record.
//! - No two non-orphaned records share a `current_slug`.
//! - A record's `current_slug` names an existing file, or the record is
//!   flagged `orphaned` (missing at load time, retained pending
//!   reconciliation — a delayed manual rename can still be matched by
//!   hash on a later scan).
//!
//! ## Atomicity
//!
//! [`MetadataIndex::save`] writes through a named temp file in the same
//! directory and persists it over the target with a rename. A crash
//! mid-save leaves either the previous index or the fully-written new
//! one, never a torn file.
//!
//! ## Forward compatibility
//!
//! Unknown per-record JSON fields are captured into an `extra` map and
//! written back out on save, so an index touched by a newer version
//! round-trips through an older one without losing data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use sha2::{Digest, Sha256};

/// Name of the index file within a processed directory.
pub const INDEX_FILENAME: &str = ".mdxgen-index.json";

/// Version of the index format. Bump when the record shape or key
/// computation changes incompatibly.
const INDEX_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt metadata index at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Persisted metadata for one tracked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Filename the file had when first seen.
    pub original_name: String,
    /// Current filename (relative to the index directory), always kept in
    /// step with the filesystem entry.
    pub current_slug: String,
    /// SHA-256 of file contents — the record's identity.
    pub content_hash: String,
    /// Topic bucket assigned by the organizer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Epoch seconds when the record was created.
    pub created_at: u64,
    /// Epoch seconds of the last update to this record.
    pub last_modified: u64,
    /// Set at load time when the file named by `current_slug` is missing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub orphaned: bool,
    /// Fields written by other (newer) versions, preserved on rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileRecord {
    /// A fresh record for a newly-discovered file.
    pub fn new(original_name: String, current_slug: String, content_hash: String) -> Self {
        let now = epoch_secs();
        Self {
            original_name,
            current_slug,
            content_hash,
            topic: None,
            created_at: now,
            last_modified: now,
            orphaned: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// On-disk index mapping content hashes to file records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataIndex {
    pub version: u32,
    pub records: BTreeMap<String, FileRecord>,
}

impl MetadataIndex {
    /// Create an empty index (first run, or caller-chosen rebuild).
    pub fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            records: BTreeMap::new(),
        }
    }

    /// Load the index for a directory.
    ///
    /// A missing file is a first run and yields an empty index. A file
    /// that exists but cannot be parsed (or carries an unsupported
    /// version) is `Corrupt` — the caller decides whether to rebuild
    /// from scratch or abort; this function never guesses.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => return Err(e.into()),
        };
        let index: Self = serde_json::from_str(&content).map_err(|e| IndexError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if index.version != INDEX_VERSION {
            return Err(IndexError::Corrupt {
                path,
                reason: format!(
                    "unsupported index version {} (expected {})",
                    index.version, INDEX_VERSION
                ),
            });
        }
        Ok(index)
    }

    /// Save atomically: write to a temp file in the same directory, then
    /// rename over the target.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        let path = dir.join(INDEX_FILENAME);
        let json = serde_json::to_string_pretty(self).map_err(|e| IndexError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| IndexError::Io(e.error))?;
        Ok(())
    }

    /// Insert or replace the record for its content hash, touching
    /// `last_modified`.
    pub fn upsert(&mut self, mut record: FileRecord) {
        record.last_modified = epoch_secs();
        self.records.insert(record.content_hash.clone(), record);
    }

    /// Record for a content hash, if tracked.
    pub fn get(&self, content_hash: &str) -> Option<&FileRecord> {
        self.records.get(content_hash)
    }

    /// Record whose `current_slug` matches, if any.
    pub fn by_slug(&self, slug: &str) -> Option<&FileRecord> {
        self.records.values().find(|r| r.current_slug == slug)
    }

    /// Remove records for the given identities (confirmed-missing files).
    pub fn prune(&mut self, missing: &[String]) {
        for hash in missing {
            self.records.remove(hash);
        }
    }

    /// Mark records whose file is missing on disk as orphaned, and clear
    /// the flag on records whose file is back. Returns the hashes that
    /// are orphaned after reconciliation.
    pub fn reconcile(&mut self, dir: &Path) -> Vec<String> {
        let mut orphaned = Vec::new();
        for record in self.records.values_mut() {
            let exists = dir.join(&record.current_slug).is_file();
            record.orphaned = !exists;
            if !exists {
                orphaned.push(record.content_hash.clone());
            }
        }
        orphaned
    }

    /// Records in deterministic (hash) order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
///
/// Content-based rather than mtime-based so identity survives
/// `git checkout` and external copies.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
