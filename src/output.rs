//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output leads with what a file *became* — its slug, its topic, its
//! generated document — with the pre-run name shown as secondary context
//! via indented `Source:` lines. The output reads as a content inventory,
//! not a syscall log.
//!
//! # Output Format
//!
//! ## Normalize (dry run shows the same plan with a `Rename plan` header)
//!
//! ```text
//! hello-world.md
//!     Source: Hello World.md
//! my-post-2.md
//!     Source: my post.md
//! Failed
//!     Stuck File.md: rename failed: permission denied
//! 2 renamed, 3 unchanged, 0 skipped, 1 failed
//! ```
//!
//! ## Organize
//!
//! ```text
//! rust (2 files)
//!     rust/intro.md
//!     rust/ownership.md
//! uncategorized (1 file)
//!     uncategorized/misc.md
//! Moved 3 files into 2 topics, 0 already in place
//! ```
//!
//! ## Generate
//!
//! ```text
//! rust/intro.md → _generated/rust/intro.mdx
//! Generated 1 document, 2 unchanged
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects. Per-file progress during
//! a run comes through [`format_run_event`], consumed by the printer
//! thread in `main`.

use crate::engine::{FileOutcome, Outcome, RunEvent, RunReport};
use crate::generate::{GenerateReport, OUTPUT_DIRNAME};
use crate::index::FileRecord;
use crate::topics::OrganizeReport;
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Pluralize a count: `count(1, "file")` → `"1 file"`.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// One outcome as display lines, slug-first with the old name as context.
fn outcome_lines(file: &FileOutcome) -> Vec<String> {
    match &file.outcome {
        Outcome::Unchanged => vec![],
        Outcome::Renamed { from, to } => {
            vec![to.clone(), format!("    Source: {}", from)]
        }
        Outcome::WouldRename { from, to } => {
            vec![format!("    {} \u{2192} {}", from, to)]
        }
        Outcome::Skipped { reason } => {
            vec![format!("{} (skipped: {})", file.path, reason)]
        }
        // Failures are collected into their own section by the summary.
        Outcome::Failed { .. } => vec![],
    }
}

// ============================================================================
// Normalize output
// ============================================================================

/// Format a live progress event. Unchanged files stay silent so a clean
/// re-run prints nothing but the summary.
pub fn format_run_event(event: &RunEvent) -> Vec<String> {
    match event {
        RunEvent::Scanned { files } => {
            vec![format!("Scanning {}", count(*files, "file"))]
        }
        RunEvent::FileProcessed(file) => outcome_lines(file),
        RunEvent::IndexFlushed { records } => {
            vec![format!("Index updated ({})", count(*records, "record"))]
        }
    }
}

/// Format the dry-run rename plan.
pub fn format_plan(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    let planned: Vec<&FileOutcome> = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.outcome, Outcome::WouldRename { .. }))
        .collect();
    if planned.is_empty() {
        lines.push("Nothing to rename.".to_string());
        return lines;
    }
    lines.push("Rename plan".to_string());
    for file in planned {
        lines.extend(outcome_lines(file));
    }
    lines.push(format!(
        "{} to rename, {} unchanged",
        report.renamed(),
        report.unchanged()
    ));
    lines
}

/// Format the end-of-run summary: failure details, then counts.
pub fn format_run_summary(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    let failures: Vec<&FileOutcome> = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
        .collect();
    if !failures.is_empty() {
        lines.push("Failed".to_string());
        for file in failures {
            if let Outcome::Failed { reason } = &file.outcome {
                lines.push(format!("    {}: {}", file.path, reason));
            }
        }
    }
    lines.push(format!(
        "{} renamed, {} unchanged, {} skipped, {} failed",
        report.renamed(),
        report.unchanged(),
        report.skipped(),
        report.failed()
    ));
    lines
}

/// Print the dry-run plan to stdout.
pub fn print_plan(report: &RunReport) {
    for line in format_plan(report) {
        println!("{}", line);
    }
}

/// Print the run summary to stdout.
pub fn print_run_summary(report: &RunReport) {
    for line in format_run_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Organize output
// ============================================================================

/// Format organizer results: buckets with their members, then a move
/// summary and any failures.
pub fn format_organize_output(
    buckets: &BTreeMap<String, Vec<FileRecord>>,
    report: &OrganizeReport,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (topic, records) in buckets {
        lines.push(format!("{} ({})", topic, count(records.len(), "file")));
        for record in records {
            lines.push(format!("    {}", record.current_slug));
        }
    }
    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for (slug, reason) in &report.failed {
            lines.push(format!("    {}: {}", slug, reason));
        }
    }
    lines.push(format!(
        "Moved {} into {}, {} already in place",
        count(report.moves.len(), "file"),
        count(buckets.len(), "topic"),
        report.already_in_place
    ));
    lines
}

/// Print organizer output to stdout.
pub fn print_organize_output(
    buckets: &BTreeMap<String, Vec<FileRecord>>,
    report: &OrganizeReport,
) {
    for line in format_organize_output(buckets, report) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate output
// ============================================================================

/// Format generator results: one `source → output` line per written
/// document, then failures and counts.
pub fn format_generate_output(report: &GenerateReport) -> Vec<String> {
    let mut lines = Vec::new();
    for slug in &report.written {
        let out = Path::new(OUTPUT_DIRNAME)
            .join(Path::new(slug).with_extension("mdx"))
            .display()
            .to_string();
        lines.push(format!("{} \u{2192} {}", slug, out));
    }
    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for (slug, reason) in &report.failed {
            lines.push(format!("    {}: {}", slug, reason));
        }
    }
    lines.push(format!(
        "Generated {}, {} unchanged, {} failed",
        count(report.written.len(), "document"),
        report.unchanged,
        report.failed.len()
    ));
    lines
}

/// Print generator output to stdout.
pub fn print_generate_output(report: &GenerateReport) {
    for line in format_generate_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(path: &str, outcome: Outcome) -> FileOutcome {
        FileOutcome {
            path: path.to_string(),
            outcome,
        }
    }

    #[test]
    fn count_singular_and_plural() {
        assert_eq!(count(1, "file"), "1 file");
        assert_eq!(count(0, "file"), "0 files");
        assert_eq!(count(3, "record"), "3 records");
    }

    #[test]
    fn renamed_outcome_shows_slug_then_source() {
        let lines = outcome_lines(&outcome(
            "Hello World.md",
            Outcome::Renamed {
                from: "Hello World.md".into(),
                to: "hello-world.md".into(),
            },
        ));
        assert_eq!(lines, vec!["hello-world.md", "    Source: Hello World.md"]);
    }

    #[test]
    fn unchanged_outcome_is_silent() {
        assert!(outcome_lines(&outcome("ok.md", Outcome::Unchanged)).is_empty());
    }

    #[test]
    fn plan_lists_renames_with_arrow() {
        let report = RunReport {
            outcomes: vec![
                outcome(
                    "My Post!.md",
                    Outcome::WouldRename {
                        from: "My Post!.md".into(),
                        to: "my-post.md".into(),
                    },
                ),
                outcome("ok.md", Outcome::Unchanged),
            ],
            flushed: false,
        };
        let lines = format_plan(&report);
        assert_eq!(lines[0], "Rename plan");
        assert_eq!(lines[1], "    My Post!.md \u{2192} my-post.md");
        assert_eq!(lines[2], "1 to rename, 1 unchanged");
    }

    #[test]
    fn empty_plan_says_nothing_to_rename() {
        let report = RunReport {
            outcomes: vec![outcome("ok.md", Outcome::Unchanged)],
            flushed: false,
        };
        assert_eq!(format_plan(&report), vec!["Nothing to rename."]);
    }

    #[test]
    fn summary_lists_failures_before_counts() {
        let report = RunReport {
            outcomes: vec![
                outcome(
                    "Stuck.md",
                    Outcome::Failed {
                        reason: "permission denied".into(),
                    },
                ),
                outcome("ok.md", Outcome::Unchanged),
            ],
            flushed: true,
        };
        let lines = format_run_summary(&report);
        assert_eq!(lines[0], "Failed");
        assert_eq!(lines[1], "    Stuck.md: permission denied");
        assert_eq!(lines[2], "0 renamed, 1 unchanged, 0 skipped, 1 failed");
    }

    #[test]
    fn organize_output_groups_by_bucket() {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            "rust".to_string(),
            vec![FileRecord::new(
                "intro.md".into(),
                "rust/intro.md".into(),
                "h1".into(),
            )],
        );
        let report = OrganizeReport {
            moves: vec![],
            already_in_place: 1,
            failed: vec![],
        };
        let lines = format_organize_output(&buckets, &report);
        assert_eq!(lines[0], "rust (1 file)");
        assert_eq!(lines[1], "    rust/intro.md");
        assert_eq!(lines[2], "Moved 0 files into 1 topic, 1 already in place");
    }

    #[test]
    fn generate_output_shows_arrow_per_document() {
        let report = GenerateReport {
            written: vec!["rust/intro.md".to_string()],
            unchanged: 2,
            failed: vec![("bad.md".to_string(), "missing field".to_string())],
        };
        let lines = format_generate_output(&report);
        assert_eq!(lines[0], "rust/intro.md \u{2192} _generated/rust/intro.mdx");
        assert_eq!(lines[1], "Failed");
        assert_eq!(lines[2], "    bad.md: missing field");
        assert_eq!(lines[3], "Generated 1 document, 2 unchanged, 1 failed");
    }
}
