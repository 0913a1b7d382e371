//! Exclusive per-directory run lock.
//!
//! The rename engine and the metadata index are single-writer per
//! directory. A run takes the lock by creating `.mdxgen.lock` beside the
//! index with `create_new`, which is atomic on every platform we care
//! about: whoever creates the file owns the run. The guard removes the
//! file on drop, so the lock is released on every exit path, including
//! panics unwinding out of a run.
//!
//! Distinct directories get distinct lock files and never contend.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the lock file within a processed directory.
pub const LOCK_FILENAME: &str = ".mdxgen.lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("directory {0} is locked by another run (remove {LOCK_FILENAME} if stale)")]
    AlreadyLocked(PathBuf),
    #[error("IO error acquiring lock: {0}")]
    Io(#[from] std::io::Error),
}

/// Holds the run lock for one directory. Released on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock for `dir`, failing immediately if it is held.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    LockError::AlreadyLocked(dir.to_path_buf())
                } else {
                    LockError::Io(e)
                }
            })?;
        // PID makes a stale lock diagnosable by hand.
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
