//! # mdxgen
//!
//! A batch content pipeline for directories of loosely-named markdown
//! files: normalize filenames into URL-safe slugs, keep a sidecar
//! metadata index in step with every rename, group files into topic
//! buckets, and emit templated MDX documents with front-matter.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! mdxgen processes a content directory through three independent stages,
//! each reading the metadata index the previous stage maintains:
//!
//! ```text
//! 1. Normalize   content/  →  slugged filenames + .mdxgen-index.json
//! 2. Organize    index     →  topic directories   (rust/, guides/, …)
//! 3. Generate    index     →  _generated/*.mdx    (+ _meta.json per dir)
//! ```
//!
//! The index is the only state shared between stages, and it is keyed by
//! **content hash** rather than path. That single decision is what makes
//! the pipeline safe to re-run: a file renamed by the engine, by the
//! organizer, or by hand is recognized by its bytes and re-attached to
//! its existing record instead of being treated as new.
//!
//! This separation exists for three reasons:
//!
//! - **Re-entrancy**: every stage is idempotent; running it twice changes
//!   nothing the second time.
//! - **Debuggability**: the index is human-readable JSON you can inspect
//!   between stages.
//! - **Testability**: each stage is a function over a directory and an
//!   index, exercised directly in unit tests with temp directories.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`slug`] | Pure filename → slug normalization, deterministic and idempotent |
//! | [`index`] | Persisted hash-keyed metadata index with atomic writes and orphan reconciliation |
//! | [`engine`] | Stage 1 — scans, resolves slug collisions, renames, syncs the index |
//! | [`topics`] | Stage 2 — topic strategies, bucketing, directory restructuring |
//! | [`generate`] | Stage 3 — template rendering and MDX/`_meta.json` emission |
//! | [`lock`] | Exclusive per-directory run lock (single writer per directory) |
//! | [`config`] | `mdxgen.toml` loading, validation, sparse overrides |
//! | [`provider`] | Text-generation collaborator seam, never on the core path |
//! | [`output`] | CLI output formatting — pure `format_*` functions plus print wrappers |
//!
//! # Design Decisions
//!
//! ## Content Hash as Identity
//!
//! Paths are the one thing this tool exists to change, so they cannot be
//! the key. SHA-256 of the file's bytes is: it survives renames in either
//! direction, costs one read per file per run (parallelized), and doubles
//! as the pre-rename verification that nothing modified the file between
//! scan and mutation.
//!
//! ## One Atomic Flush per Run
//!
//! Per-file index writes would turn a crash into a half-updated index.
//! Instead all record changes are buffered in memory and written once at
//! the end of a run, through a temp file persisted over the target. The
//! worst a crash can do is leave renamed files with a stale index, which
//! the next run repairs through orphan reconciliation.
//!
//! ## Failures Are Per-File, Not Per-Run
//!
//! A file that cannot be renamed (permissions, a squatted target) is
//! reported and skipped; the rest of the batch proceeds. Only setup
//! problems — an unreadable index, a held lock, a bad directory — abort
//! a run, because continuing past them risks the metadata itself.
//!
//! ## Explicit Strategy Registry
//!
//! Topic detection is pluggable, but plugins are registered in code at
//! startup and selected by name, never discovered by naming convention.
//! What runs is exactly what [`topics::StrategyRegistry::builtin`] lists.

pub mod config;
pub mod engine;
pub mod generate;
pub mod index;
pub mod lock;
pub mod output;
pub mod provider;
pub mod slug;
pub mod topics;

#[cfg(test)]
pub(crate) mod test_helpers;
