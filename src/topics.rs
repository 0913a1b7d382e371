//! Topic bucketing and directory restructuring.
//!
//! The organizer reads the metadata index, assigns every tracked file to
//! exactly one topic bucket, and optionally restructures the directory so
//! each file lives under its topic. Assignment is delegated to a
//! [`TopicStrategy`] chosen by name from an explicit registry built at
//! startup — no convention-based discovery.
//!
//! Two built-in strategies:
//!
//! - `keywords`: the caller supplies a fixed topic list; a file joins the
//!   first topic (in caller order) whose name appears in its slug or
//!   content, case-insensitively.
//! - `headings`: auto-detection from the first markdown heading — the
//!   heading's first word, slugified, becomes the topic.
//!
//! Files matching nothing land in the `uncategorized` bucket, so bucket
//! coverage is total: every readable record appears in exactly one
//! bucket. A file that cannot be read is reported as a per-file failure,
//! never silently filed under `uncategorized`.

use crate::config::PipelineConfig;
use crate::engine::claim_slug;
use crate::index::{FileRecord, IndexError, MetadataIndex};
use crate::lock::{DirLock, LockError};
use crate::slug;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fallback bucket for records no strategy claims.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("not a directory: {0}")]
    Validation(PathBuf),
    #[error("unknown topic strategy '{0}'")]
    UnknownStrategy(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Assigns a topic to one file, or declines it.
///
/// Strategies see the record and the file's content and return the topic
/// name to file it under. Returning `None` sends the record to
/// [`UNCATEGORIZED`].
pub trait TopicStrategy {
    fn name(&self) -> &'static str;
    fn assign(&self, record: &FileRecord, content: &str) -> Option<String>;
}

/// Explicit-list strategy: first topic whose name appears in the slug or
/// content wins. Caller order is the tie-break, so `["rust", "go"]` and
/// `["go", "rust"]` can classify the same file differently — that order
/// is the caller's ranking, not ours to sort.
pub struct KeywordStrategy {
    topics: Vec<String>,
}

impl KeywordStrategy {
    pub fn new(topics: Vec<String>) -> Self {
        Self { topics }
    }
}

impl TopicStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn assign(&self, record: &FileRecord, content: &str) -> Option<String> {
        let slug_lower = record.current_slug.to_lowercase();
        let content_lower = content.to_lowercase();
        self.topics
            .iter()
            .find(|topic| {
                let needle = topic.to_lowercase();
                slug_lower.contains(&needle) || content_lower.contains(&needle)
            })
            .cloned()
    }
}

/// Auto-detect strategy: topic = first word of the document's first
/// markdown heading, slugified. Documents without a heading stay
/// uncategorized.
pub struct HeadingStrategy;

impl TopicStrategy for HeadingStrategy {
    fn name(&self) -> &'static str {
        "headings"
    }

    fn assign(&self, _record: &FileRecord, content: &str) -> Option<String> {
        let heading = first_heading(content)?;
        let word = heading.split_whitespace().next()?;
        let topic = slug::normalize(word);
        Some(topic)
    }
}

/// Text of the first heading in a markdown document, if any.
fn first_heading(content: &str) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();
    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) if in_heading => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                return Some(trimmed.to_string());
            }
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Named strategies available to a run. Built once at startup; selection
/// is by name from config or the command line.
pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Box<dyn TopicStrategy>>,
}

impl StrategyRegistry {
    /// Registry with the built-in strategies. `topics` parameterizes the
    /// `keywords` strategy.
    pub fn builtin(topics: Vec<String>) -> Self {
        let mut strategies: HashMap<&'static str, Box<dyn TopicStrategy>> = HashMap::new();
        for strategy in [
            Box::new(KeywordStrategy::new(topics)) as Box<dyn TopicStrategy>,
            Box::new(HeadingStrategy),
        ] {
            strategies.insert(strategy.name(), strategy);
        }
        Self { strategies }
    }

    pub fn get(&self, name: &str) -> Result<&dyn TopicStrategy, OrganizeError> {
        self.strategies
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| OrganizeError::UnknownStrategy(name.to_string()))
    }
}

/// Result of an assignment pass: bucketed records plus the files whose
/// content could not be read.
#[derive(Debug, Default)]
pub struct TopicAssignment {
    pub buckets: BTreeMap<String, Vec<FileRecord>>,
    pub failed: Vec<(String, String)>,
}

/// Assign every live record to exactly one bucket.
///
/// Pure with respect to the index and filesystem layout: reads file
/// contents, mutates nothing. Orphaned records are skipped — there is no
/// file to read or move. A record whose file cannot be read is excluded
/// from the buckets and reported in `failed`; a permission error must
/// not masquerade as an uncategorized file.
pub fn organize(
    dir: &Path,
    index: &MetadataIndex,
    strategy: &dyn TopicStrategy,
) -> Result<TopicAssignment, OrganizeError> {
    if !dir.is_dir() {
        return Err(OrganizeError::Validation(dir.to_path_buf()));
    }
    let mut assignment = TopicAssignment::default();
    for record in index.records().filter(|r| !r.orphaned) {
        let content = match std::fs::read_to_string(dir.join(&record.current_slug)) {
            Ok(c) => c,
            Err(e) => {
                assignment
                    .failed
                    .push((record.current_slug.clone(), format!("read failed: {e}")));
                continue;
            }
        };
        let topic = strategy
            .assign(record, &content)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        assignment
            .buckets
            .entry(topic)
            .or_default()
            .push(record.clone());
    }
    Ok(assignment)
}

/// One file movement performed (or planned) by [`apply_organization`].
#[derive(Debug, Clone)]
pub struct Move {
    pub from: String,
    pub to: String,
    pub topic: String,
}

/// Summary of a restructuring pass.
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub moves: Vec<Move>,
    pub already_in_place: usize,
    pub failed: Vec<(String, String)>,
}

impl OrganizeReport {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() { 0 } else { 1 }
    }
}

/// Move every bucketed file under `<dir>/<topic>/` and record the
/// assignment in the index.
///
/// Holds the directory lock for the duration. With `preserve_structure`
/// the file keeps its relative sub-path below the topic directory;
/// otherwise paths are flattened to the filename, disambiguating
/// collisions the same way the rename engine does. Re-running over an
/// already-organized tree moves nothing and rewrites nothing, so repeated
/// runs neither lose nor duplicate records.
pub fn apply_organization(
    dir: &Path,
    index: &mut MetadataIndex,
    buckets: &BTreeMap<String, Vec<FileRecord>>,
    config: &PipelineConfig,
) -> Result<OrganizeReport, OrganizeError> {
    if !dir.is_dir() {
        return Err(OrganizeError::Validation(dir.to_path_buf()));
    }
    let _lock = DirLock::acquire(dir)?;

    let mut report = OrganizeReport::default();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut dirty = false;

    // Files already in place claim their paths up front, so a later move
    // can never be planned onto a path that is staying occupied.
    for (topic, records) in buckets {
        for record in records {
            let current = PathBuf::from(&record.current_slug);
            if current == target_path(topic, &current, config.preserve_structure) {
                taken.insert(record.current_slug.clone());
            }
        }
    }

    for (topic, records) in buckets {
        for record in records {
            let current = PathBuf::from(&record.current_slug);
            let desired = target_path(topic, &current, config.preserve_structure);

            if current == desired {
                // Already organized; still record a topic assigned for
                // the first time (e.g. by a strategy change).
                if record.topic.as_deref() != Some(topic) {
                    let mut updated = record.clone();
                    updated.topic = Some(topic.clone());
                    index.upsert(updated);
                    dirty = true;
                }
                report.already_in_place += 1;
                continue;
            }

            let target = claim_slug(&desired, &mut taken);
            let from_abs = dir.join(&current);
            let to_abs = dir.join(&target);

            if let Err(e) = move_file(&from_abs, &to_abs) {
                report
                    .failed
                    .push((record.current_slug.clone(), e.to_string()));
                continue;
            }

            let mut updated = record.clone();
            updated.current_slug = target.to_string_lossy().into_owned();
            updated.topic = Some(topic.clone());
            index.upsert(updated);
            dirty = true;
            report.moves.push(Move {
                from: record.current_slug.clone(),
                to: target.to_string_lossy().into_owned(),
                topic: topic.clone(),
            });
        }
    }

    if dirty && config.update_metadata {
        index.save(dir)?;
    }
    Ok(report)
}

/// Where a record belongs under its topic directory.
fn target_path(topic: &str, current: &Path, preserve_structure: bool) -> PathBuf {
    if preserve_structure {
        // Keep the sub-path, minus any topic directory it already sits in.
        let rel = current.strip_prefix(topic).unwrap_or(current);
        Path::new(topic).join(rel)
    } else {
        let name = current.file_name().unwrap_or_default();
        Path::new(topic).join(name)
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if to.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("target {} already exists", to.display()),
        ));
    }
    std::fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FileRecord;
    use crate::test_helpers::{all_slugs, write_files};
    use std::fs;
    use tempfile::TempDir;

    fn record(slug: &str, hash: &str) -> FileRecord {
        FileRecord::new(slug.to_string(), slug.to_string(), hash.to_string())
    }

    fn indexed(dir: &Path, files: &[(&str, &str)]) -> MetadataIndex {
        write_files(dir, files);
        let mut idx = MetadataIndex::empty();
        for (i, (name, _)) in files.iter().enumerate() {
            idx.upsert(record(name, &format!("h{i}")));
        }
        idx
    }

    #[test]
    fn every_record_lands_in_exactly_one_bucket() {
        let tmp = TempDir::new().unwrap();
        let idx = indexed(
            tmp.path(),
            &[
                ("rust-intro.md", "learning rust"),
                ("go-basics.md", "about go"),
                ("misc-notes.md", "nothing topical"),
            ],
        );
        let strategy = KeywordStrategy::new(vec!["rust".into(), "go".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;

        let total: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(total, idx.len());
        assert_eq!(buckets["rust"].len(), 1);
        assert_eq!(buckets["go"].len(), 1);
        assert_eq!(buckets[UNCATEGORIZED].len(), 1);
        assert_eq!(buckets[UNCATEGORIZED][0].current_slug, "misc-notes.md");
    }

    #[test]
    fn first_matching_topic_wins_in_caller_order() {
        let tmp = TempDir::new().unwrap();
        let idx = indexed(tmp.path(), &[("post.md", "covers rust and go equally")]);

        let strategy = KeywordStrategy::new(vec!["rust".into(), "go".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        assert!(buckets.contains_key("rust"));

        let reversed = KeywordStrategy::new(vec!["go".into(), "rust".into()]);
        let buckets = organize(tmp.path(), &idx, &reversed).unwrap().buckets;
        assert!(buckets.contains_key("go"));
    }

    #[test]
    fn keyword_match_is_case_insensitive_and_sees_slug() {
        let tmp = TempDir::new().unwrap();
        let idx = indexed(tmp.path(), &[("rust-tips.md", "no keyword in body")]);
        let strategy = KeywordStrategy::new(vec!["RUST".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        assert_eq!(buckets["RUST"].len(), 1);
    }

    #[test]
    fn heading_strategy_uses_first_heading_word() {
        let tmp = TempDir::new().unwrap();
        let idx = indexed(
            tmp.path(),
            &[
                ("a.md", "# Rust Ownership Explained\n\nbody"),
                ("b.md", "intro text\n\n## Testing Strategies\n"),
                ("c.md", "no headings at all"),
            ],
        );
        let buckets = organize(tmp.path(), &idx, &HeadingStrategy).unwrap().buckets;
        assert_eq!(buckets["rust"].len(), 1);
        assert_eq!(buckets["testing"].len(), 1);
        assert_eq!(buckets[UNCATEGORIZED].len(), 1);
    }

    #[test]
    fn orphaned_records_are_not_bucketed() {
        let tmp = TempDir::new().unwrap();
        let mut idx = indexed(tmp.path(), &[("present.md", "x")]);
        let mut gone = record("gone.md", "hg");
        gone.orphaned = true;
        idx.upsert(gone);

        let buckets = organize(tmp.path(), &idx, &HeadingStrategy).unwrap().buckets;
        let total: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn unreadable_file_is_a_failure_not_uncategorized() {
        let tmp = TempDir::new().unwrap();
        let mut idx = indexed(tmp.path(), &[("readable.md", "plain notes")]);
        // Tracked but missing on disk, and not flagged orphaned: the
        // read error must surface instead of defaulting the content.
        idx.upsert(record("vanished.md", "hv"));

        let assignment = organize(tmp.path(), &idx, &HeadingStrategy).unwrap();
        assert_eq!(assignment.failed.len(), 1);
        assert_eq!(assignment.failed[0].0, "vanished.md");
        let total: usize = assignment.buckets.values().map(Vec::len).sum();
        assert_eq!(total, 1);
        assert_eq!(
            assignment.buckets[UNCATEGORIZED][0].current_slug,
            "readable.md"
        );
    }

    #[test]
    fn registry_selects_by_name() {
        let registry = StrategyRegistry::builtin(vec!["rust".into()]);
        assert_eq!(registry.get("keywords").unwrap().name(), "keywords");
        assert_eq!(registry.get("headings").unwrap().name(), "headings");
        assert!(matches!(
            registry.get("astrology"),
            Err(OrganizeError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn apply_moves_files_and_updates_index() {
        let tmp = TempDir::new().unwrap();
        let mut idx = indexed(
            tmp.path(),
            &[("rust-intro.md", "rust"), ("misc.md", "nothing")],
        );
        let strategy = KeywordStrategy::new(vec!["rust".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        let report =
            apply_organization(tmp.path(), &mut idx, &buckets, &PipelineConfig::default())
                .unwrap();

        assert_eq!(report.moves.len(), 2);
        assert!(report.failed.is_empty());
        assert!(tmp.path().join("rust/rust-intro.md").exists());
        assert!(tmp.path().join("uncategorized/misc.md").exists());

        let loaded = MetadataIndex::load(tmp.path()).unwrap();
        let rec = loaded.by_slug("rust/rust-intro.md").unwrap();
        assert_eq!(rec.topic.as_deref(), Some("rust"));
    }

    #[test]
    fn reapply_is_a_noop_without_losing_records() {
        let tmp = TempDir::new().unwrap();
        let mut idx = indexed(tmp.path(), &[("rust-intro.md", "rust")]);
        let strategy = KeywordStrategy::new(vec!["rust".into()]);

        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        apply_organization(tmp.path(), &mut idx, &buckets, &PipelineConfig::default()).unwrap();

        // Second pass over the organized tree.
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        let report =
            apply_organization(tmp.path(), &mut idx, &buckets, &PipelineConfig::default())
                .unwrap();
        assert!(report.moves.is_empty());
        assert_eq!(report.already_in_place, 1);
        assert_eq!(all_slugs(&idx), vec!["rust/rust-intro.md"]);
        assert!(tmp.path().join("rust/rust-intro.md").exists());
    }

    #[test]
    fn flattening_collisions_get_suffixes() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        write_files(&tmp.path().join("a"), &[("notes.md", "rust one")]);
        write_files(&tmp.path().join("b"), &[("notes.md", "rust two")]);

        let mut idx = MetadataIndex::empty();
        idx.upsert(record("a/notes.md", "h1"));
        idx.upsert(record("b/notes.md", "h2"));

        let strategy = KeywordStrategy::new(vec!["rust".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        let report =
            apply_organization(tmp.path(), &mut idx, &buckets, &PipelineConfig::default())
                .unwrap();

        assert!(report.failed.is_empty());
        assert!(tmp.path().join("rust/notes.md").exists());
        assert!(tmp.path().join("rust/notes-2.md").exists());
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn preserve_structure_keeps_sub_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("guides")).unwrap();
        write_files(&tmp.path().join("guides"), &[("notes.md", "rust stuff")]);

        let mut idx = MetadataIndex::empty();
        idx.upsert(record("guides/notes.md", "h1"));

        let config = PipelineConfig {
            preserve_structure: true,
            ..PipelineConfig::default()
        };
        let strategy = KeywordStrategy::new(vec!["rust".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        apply_organization(tmp.path(), &mut idx, &buckets, &config).unwrap();

        assert!(tmp.path().join("rust/guides/notes.md").exists());
    }

    #[test]
    fn move_failure_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let mut idx = indexed(
            tmp.path(),
            &[("rust-a.md", "rust"), ("rust-b.md", "rust")],
        );
        // Squat one target with a directory so the rename fails.
        fs::create_dir_all(tmp.path().join("rust/rust-a.md")).unwrap();

        let strategy = KeywordStrategy::new(vec!["rust".into()]);
        let buckets = organize(tmp.path(), &idx, &strategy).unwrap().buckets;
        let report =
            apply_organization(tmp.path(), &mut idx, &buckets, &PipelineConfig::default())
                .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.moves.len(), 1);
        assert_eq!(report.exit_code(), 1);
        assert!(tmp.path().join("rust-a.md").exists());
        assert!(tmp.path().join("rust/rust-b.md").exists());
        // The failed file's record is untouched.
        assert_eq!(idx.by_slug("rust-a.md").unwrap().topic, None);
    }
}
