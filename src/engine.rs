//! Filename normalization and metadata synchronization engine.
//!
//! The heart of the pipeline: scans a directory, computes the canonical
//! slug for every eligible file, renames files on disk, and keeps the
//! metadata index consistent with what actually happened — across
//! collisions, partial failures, and repeated runs.
//!
//! ## Run shape
//!
//! ```text
//! lock → load index → reconcile orphans → enumerate → hash (parallel)
//!      → plan (collision resolution) → rename (sequential, retried)
//!      → flush index (single atomic write) → unlock
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotence**: a second run over a normalized directory performs
//!   zero renames and zero metadata changes.
//! - **Collision determinism**: files are planned in lexical order of
//!   their original names; the first claimant keeps the bare slug,
//!   later ones get `-2`, `-3`, … suffixes. Already-normalized files
//!   claim their names before anything else is planned, so a rename can
//!   never steal the name of a file that already owns it.
//! - **Failure isolation**: a rename that fails (permissions, target
//!   appeared from outside the run, transient I/O after retries) is
//!   recorded as a per-file outcome and never aborts the run.
//! - **Atomic flush**: index updates are buffered in memory and written
//!   once at the end via the temp-file-plus-rename path in
//!   [`crate::index`]. A crash mid-run leaves the previous index intact;
//!   the renamed files are re-attached by content hash on the next run.
//!
//! ## Identity notes
//!
//! Records are keyed by content hash, so two files with byte-identical
//! content share one identity; the first-seen file owns the record and
//! later duplicates are renamed but not separately tracked. The hash is
//! re-verified immediately before each rename — if the file changed
//! under us since the scan, the rename is refused as a failure rather
//! than silently moving unknown content.

use crate::config::PipelineConfig;
use crate::index::{self, FileRecord, IndexError, MetadataIndex};
use crate::lock::{DirLock, LockError};
use crate::slug;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not a directory: {0}")]
    Validation(PathBuf),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attempts for a failing filesystem operation before giving up.
const IO_RETRIES: u32 = 3;

/// Initial backoff between retries; doubles each attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// What happened to one file during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Name was already canonical.
    Unchanged,
    /// Renamed on disk, index updated.
    Renamed { from: String, to: String },
    /// Dry run: would rename, nothing touched.
    WouldRename { from: String, to: String },
    /// Rename or bookkeeping failed; file and its record left alone.
    Failed { reason: String },
    /// Not processed (run cancelled before this file was scheduled).
    Skipped { reason: String },
}

/// Per-file result, path relative to the scanned directory.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Progress events streamed to an optional reporter channel.
///
/// Sends are fire-and-forget: a closed or slow receiver never fails or
/// blocks the run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Scanned { files: usize },
    FileProcessed(FileOutcome),
    IndexFlushed { records: usize },
}

/// Summary of one engine run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
    pub flushed: bool,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged))
    }

    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Renamed { .. } | Outcome::WouldRename { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    /// Process exit code for this run: 0 clean, 1 partial failure.
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 { 1 } else { 0 }
    }
}

/// One file's planned disposition, computed before any mutation.
struct PlanEntry {
    /// Relative path as found on disk.
    rel_path: PathBuf,
    /// Relative path it should have.
    target_rel: PathBuf,
    /// Content hash from the scan phase.
    hash: String,
    /// Whether this file owns its hash's record. Duplicates of an
    /// earlier file are renamed like any other but leave the owner's
    /// record untouched.
    tracked: bool,
}

/// Scan `dir` and normalize every eligible filename, keeping the
/// metadata index in step. See the module docs for the run shape.
///
/// `cancel` stops scheduling new files when set; files already being
/// processed finish, and the flush is skipped only when nothing
/// completed. The engine never prompts — interactive confirmation is
/// the caller's concern, typically via a `dry_run` pass first.
pub fn scan_and_normalize(
    dir: &Path,
    config: &PipelineConfig,
    dry_run: bool,
    cancel: Option<&AtomicBool>,
    reporter: Option<mpsc::Sender<RunEvent>>,
) -> Result<RunReport, EngineError> {
    if !dir.is_dir() {
        return Err(EngineError::Validation(dir.to_path_buf()));
    }
    let _lock = DirLock::acquire(dir)?;

    let mut idx = MetadataIndex::load(dir)?;
    // Orphans recorded by *previous* runs; still-unmatched ones are
    // pruned at flush time (two-strike rule, see DESIGN.md).
    let prior_orphans: BTreeSet<String> = idx
        .records()
        .filter(|r| r.orphaned)
        .map(|r| r.content_hash.clone())
        .collect();
    idx.reconcile(dir);

    let files = enumerate(dir, config);
    report(&reporter, RunEvent::Scanned { files: files.len() });

    // Hash everything up front, in parallel. The hash is the file's
    // identity for rename detection and the baseline for the pre-rename
    // re-verification.
    let hashes: Vec<(PathBuf, std::io::Result<String>)> = files
        .par_iter()
        .map(|rel| (rel.clone(), index::hash_file(&dir.join(rel))))
        .collect();

    let mut outcomes = Vec::with_capacity(files.len());
    let mut plan = Vec::new();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    // hash → relative path of the file that owns the record this run.
    // Exactly one file per hash syncs the record; byte-identical
    // duplicates are still renamed but never touch the owner's record.
    let mut owners: BTreeMap<String, String> = BTreeMap::new();

    // Already-normalized files claim their names first. Among identical
    // files the one the index already points at owns the record, so
    // repeated runs settle on the same owner.
    for (rel, hash) in &hashes {
        if let Ok(hash) = hash
            && desired_target(rel) == *rel
        {
            let rel_str = rel.to_string_lossy().into_owned();
            taken.insert(rel_str.clone());
            if idx.get(hash).is_some_and(|r| r.current_slug == rel_str) {
                owners.insert(hash.clone(), rel_str);
            } else {
                owners.entry(hash.clone()).or_insert(rel_str);
            }
        }
    }

    // Plan in lexical order of original relative path (enumerate sorts).
    for (rel, hash) in hashes {
        let rel_str = rel.to_string_lossy().into_owned();
        let hash = match hash {
            Ok(h) => h,
            Err(e) => {
                push_outcome(
                    &mut outcomes,
                    &reporter,
                    rel_str,
                    Outcome::Failed {
                        reason: format!("hashing failed: {e}"),
                    },
                );
                continue;
            }
        };

        let desired = desired_target(&rel);
        if desired == rel {
            if owners.get(&hash).is_some_and(|owner| *owner == rel_str) {
                sync_record(&mut idx, &rel_str, &rel_str, &hash);
            }
            push_outcome(&mut outcomes, &reporter, rel_str, Outcome::Unchanged);
            continue;
        }

        let tracked = if owners.contains_key(&hash) {
            false
        } else {
            owners.insert(hash.clone(), rel_str);
            true
        };
        let target_rel = claim_slug(&desired, &mut taken);
        plan.push(PlanEntry {
            rel_path: rel,
            target_rel,
            hash,
            tracked,
        });
    }

    // Mutation phase. Renames are sequential: collision claims were made
    // against a single namespace and the per-file work is one syscall.
    let mut completed = 0usize;
    for entry in plan {
        let from = entry.rel_path.to_string_lossy().into_owned();
        let to = entry.target_rel.to_string_lossy().into_owned();

        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            push_outcome(
                &mut outcomes,
                &reporter,
                from,
                Outcome::Skipped {
                    reason: "run cancelled".into(),
                },
            );
            continue;
        }

        if dry_run {
            push_outcome(
                &mut outcomes,
                &reporter,
                from.clone(),
                Outcome::WouldRename { from, to },
            );
            continue;
        }

        match perform_rename(dir, &entry, config) {
            Ok(()) => {
                if entry.tracked {
                    sync_record(&mut idx, &from, &to, &entry.hash);
                }
                completed += 1;
                push_outcome(
                    &mut outcomes,
                    &reporter,
                    from.clone(),
                    Outcome::Renamed { from, to },
                );
            }
            Err(reason) => {
                push_outcome(&mut outcomes, &reporter, from, Outcome::Failed { reason });
            }
        }
    }

    // Single flush covering the whole run. Skipped for dry runs, when
    // the caller opted out of metadata writes, and when a cancelled run
    // completed nothing.
    let cancelled = cancel.is_some_and(|c| c.load(Ordering::Relaxed));
    let flushed = if dry_run || !config.update_metadata || (cancelled && completed == 0) {
        false
    } else {
        let stale: Vec<String> = idx
            .records()
            .filter(|r| r.orphaned && prior_orphans.contains(&r.content_hash))
            .map(|r| r.content_hash.clone())
            .collect();
        idx.prune(&stale);
        idx.save(dir)?;
        report(&reporter, RunEvent::IndexFlushed {
            records: idx.len(),
        });
        true
    };

    Ok(RunReport { outcomes, flushed })
}

/// Enumerate eligible files as paths relative to `dir`, sorted.
///
/// Hidden and underscore-prefixed names are skipped (editor droppings,
/// `_meta.json`, the index and lock files), as are `.bak` backups.
fn enumerate(dir: &Path, config: &PipelineConfig) -> Vec<PathBuf> {
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        // depth 0 is the scan root itself, never subject to name rules
        .filter_entry(|e| e.depth() == 0 || !is_excluded_name(&e.file_name().to_string_lossy()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| config.matches_extension(e.path()))
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(PathBuf::from))
        .collect();
    files.sort();
    files
}

fn is_excluded_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || name.ends_with(".bak")
}

/// The path a file should have: same parent, normalized filename.
fn desired_target(rel: &Path) -> PathBuf {
    let name = rel.file_name().unwrap_or_default().to_string_lossy();
    let normalized = slug::normalize_filename(&name);
    match rel.parent() {
        Some(parent) if parent != Path::new("") => parent.join(normalized),
        _ => PathBuf::from(normalized),
    }
}

/// Claim a unique target path, appending `-2`, `-3`, … to the stem on
/// collision. The claim set spans the whole run so the result is
/// deterministic given the same input set. Shared with the organizer,
/// which faces the same problem when flattening sub-paths into topic
/// directories.
pub(crate) fn claim_slug(desired: &Path, taken: &mut BTreeSet<String>) -> PathBuf {
    let desired_str = desired.to_string_lossy().into_owned();
    if taken.insert(desired_str) {
        return desired.to_path_buf();
    }
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = desired
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = desired.parent().unwrap_or_else(|| Path::new(""));
    for n in 2.. {
        let candidate = parent.join(format!("{stem}-{n}{ext}"));
        let candidate_str = candidate.to_string_lossy().into_owned();
        if taken.insert(candidate_str) {
            return candidate;
        }
    }
    unreachable!("collision counter exhausted");
}

/// Execute one planned rename: backup, re-verify, check target, rename.
/// Any failure is returned as a human-readable reason; the file and its
/// record are left untouched.
fn perform_rename(dir: &Path, entry: &PlanEntry, config: &PipelineConfig) -> Result<(), String> {
    let from_abs = dir.join(&entry.rel_path);
    let to_abs = dir.join(&entry.target_rel);

    // Detect concurrent external modification between scan and rename.
    let current = index::hash_file(&from_abs)
        .map_err(|e| format!("re-hash before rename failed: {e}"))?;
    if current != entry.hash {
        return Err("content changed since scan, refusing to rename".into());
    }

    // A target appearing from outside this run is a conflict, not a
    // license to overwrite.
    if to_abs.exists() {
        return Err(format!(
            "target {} already exists",
            entry.target_rel.display()
        ));
    }

    if config.create_backups {
        let backup = from_abs.with_extension(format!(
            "{}.bak",
            from_abs
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        with_retries(|| std::fs::copy(&from_abs, &backup).map(|_| ()))
            .map_err(|e| format!("backup copy failed: {e}"))?;
    }

    with_retries(|| std::fs::rename(&from_abs, &to_abs)).map_err(|e| format!("rename failed: {e}"))
}

/// Create or update the record for a file, preserving identity fields
/// when the hash is already tracked (external rename, re-scan). A record
/// previously occupying the same slug with a different hash is removed —
/// the file's content was replaced in place and the old identity is
/// superseded.
fn sync_record(idx: &mut MetadataIndex, original_rel: &str, current_rel: &str, hash: &str) {
    let superseded = idx
        .by_slug(current_rel)
        .filter(|prev| prev.content_hash != hash)
        .map(|prev| prev.content_hash.clone());
    if let Some(stale) = superseded {
        idx.prune(&[stale]);
    }

    match idx.get(hash) {
        Some(existing) => {
            // No-op when nothing moved: repeated runs must not churn
            // the index.
            if existing.current_slug == current_rel && !existing.orphaned {
                return;
            }
            let mut updated = existing.clone();
            updated.current_slug = current_rel.to_string();
            updated.orphaned = false;
            idx.upsert(updated);
        }
        None => {
            let name = Path::new(original_rel)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| original_rel.to_string());
            idx.upsert(FileRecord::new(name, current_rel.to_string(), hash.to_string()));
        }
    }
}

/// Retry a transient-failure-prone filesystem call with doubling backoff.
fn with_retries<T>(mut op: impl FnMut() -> std::io::Result<T>) -> std::io::Result<T> {
    let mut delay = RETRY_BACKOFF;
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= IO_RETRIES {
                    return Err(e);
                }
                std::thread::sleep(delay);
                delay *= 2;
            }
        }
    }
}

fn push_outcome(
    outcomes: &mut Vec<FileOutcome>,
    reporter: &Option<mpsc::Sender<RunEvent>>,
    path: String,
    outcome: Outcome,
) {
    let file_outcome = FileOutcome { path, outcome };
    report(reporter, RunEvent::FileProcessed(file_outcome.clone()));
    outcomes.push(file_outcome);
}

fn report(reporter: &Option<mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = reporter {
        let _ = tx.send(event);
    }
}
