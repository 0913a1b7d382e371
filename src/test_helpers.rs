//! Shared test utilities for the mdxgen test suite.
//!
//! Fixture builders and index assertions used across engine, organizer,
//! and generator tests. Tests build their content trees inline in a
//! `TempDir` so each one documents exactly the filesystem shape it
//! exercises.

use std::path::Path;

use crate::index::{FileRecord, MetadataIndex};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(name, content)` pairs into `dir`.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

// =========================================================================
// Index assertions — panic with a clear message on miss
// =========================================================================

/// Find a record by current slug. Panics if not found.
pub fn find_record<'a>(index: &'a MetadataIndex, slug: &str) -> &'a FileRecord {
    index.by_slug(slug).unwrap_or_else(|| {
        let slugs: Vec<&str> = index.records().map(|r| r.current_slug.as_str()).collect();
        panic!("record '{slug}' not found. Available: {slugs:?}")
    })
}

/// All current slugs in index order.
pub fn all_slugs(index: &MetadataIndex) -> Vec<&str> {
    index.records().map(|r| r.current_slug.as_str()).collect()
}
