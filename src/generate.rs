//! Templated MDX document generation.
//!
//! The generator renders one MDX document per tracked file from a named
//! template, filling `{{field}}` placeholders from the file's metadata
//! record and content. Output goes under `_generated/` inside the content
//! directory (underscore-prefixed, so the rename engine never scans it),
//! mirroring topic sub-paths. Each topic directory also gets a
//! `_meta.json` mapping document stems to display titles for navigation.
//!
//! Rendering is strict: a placeholder with no value is a `MissingField`
//! error for that document, never silently-blank front-matter. Templates
//! can declare per-field fallbacks; the built-in template falls back to
//! `uncategorized` for `topic` so generation works on a directory that
//! was normalized but never organized. Like rename failures, a bad
//! document is isolated — the rest of the batch still generates.
//!
//! The generator reads the metadata index and never writes it.

use crate::index::{FileRecord, MetadataIndex};
use crate::topics::UNCATEGORIZED;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the built-in template.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Output directory name inside the content directory.
pub const OUTPUT_DIRNAME: &str = "_generated";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("not a directory: {0}")]
    Validation(PathBuf),
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("template '{template}' requires field '{field}' which is absent")]
    MissingField { template: String, field: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named document template with `{{field}}` placeholders.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub body: String,
    /// Values used when a placeholder has no record field. A field
    /// without a fallback is still a `MissingField` error.
    fallbacks: BTreeMap<String, String>,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            body: body.into(),
            fallbacks: BTreeMap::new(),
        }
    }

    pub fn with_fallback(mut self, field: &str, value: &str) -> Self {
        self.fallbacks.insert(field.to_string(), value.to_string());
        self
    }
}

const DEFAULT_TEMPLATE_BODY: &str = "\
---
title: '{{title}}'
slug: '{{slug}}'
topic: '{{topic}}'
source: '{{original_name}}'
---

{{body}}
";

/// Templates available to a run, selected by name.
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            templates: HashMap::new(),
        };
        // Records carry no topic until an organize pass; the built-in
        // template must still work straight after normalize.
        registry.register(
            Template::new(DEFAULT_TEMPLATE, DEFAULT_TEMPLATE_BODY)
                .with_fallback("topic", UNCATEGORIZED),
        );
        registry
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Result<&Template, GenerateError> {
        self.templates
            .get(name)
            .ok_or_else(|| GenerateError::UnknownTemplate(name.to_string()))
    }
}

/// Render one document. Pure: no filesystem access, no store mutation.
///
/// `content` is the file's current body text; metadata fields come from
/// the record. YAML-quoted fields have embedded single quotes doubled so
/// the front-matter stays parseable whatever the source filename held.
pub fn render(
    record: &FileRecord,
    content: &str,
    template: &Template,
) -> Result<String, GenerateError> {
    let stem = slug_stem(&record.current_slug);
    let mut fields: BTreeMap<&str, String> = BTreeMap::new();
    fields.insert("title", yaml_escape(&display_title(&stem)));
    fields.insert("slug", yaml_escape(&stem));
    fields.insert("original_name", yaml_escape(&record.original_name));
    fields.insert("created_at", record.created_at.to_string());
    fields.insert("body", content.to_string());
    if let Some(topic) = &record.topic {
        fields.insert("topic", yaml_escape(topic));
    }
    substitute(template, &fields)
}

/// Replace each `{{field}}` with its value, consulting the template's
/// fallbacks for fields the record lacks. An unclosed `{{` is passed
/// through literally.
fn substitute(
    template: &Template,
    fields: &BTreeMap<&str, String>,
) -> Result<String, GenerateError> {
    let mut out = String::with_capacity(template.body.len());
    let mut rest = template.body.as_str();
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let field = after[..end].trim();
        match fields.get(field).or_else(|| template.fallbacks.get(field)) {
            Some(value) => out.push_str(value),
            None => {
                return Err(GenerateError::MissingField {
                    template: template.name.clone(),
                    field: field.to_string(),
                });
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Filename stem of a slug path: `rust/my-post.md` → `my-post`.
fn slug_stem(slug: &str) -> String {
    let name = Path::new(slug)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| slug.to_string());
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

/// Human title from a slug stem: `my-first-post` → `My First Post`.
fn display_title(stem: &str) -> String {
    stem.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Double embedded single quotes for YAML single-quoted scalars.
fn yaml_escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Summary of one generation pass.
#[derive(Debug, Default)]
pub struct GenerateReport {
    pub written: Vec<String>,
    pub unchanged: usize,
    pub failed: Vec<(String, String)>,
}

impl GenerateReport {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() { 0 } else { 1 }
    }
}

/// Generate documents for every live record into `<dir>/_generated/`.
///
/// Output files mirror each record's topic sub-path and swap the
/// extension for `.mdx`. Files whose rendered content is unchanged are
/// left untouched, so repeated runs don't churn mtimes for downstream
/// watch tooling. Per-document failures (missing fields, unreadable
/// sources) are collected in the report.
pub fn write_documents(
    dir: &Path,
    index: &MetadataIndex,
    template: &Template,
) -> Result<GenerateReport, GenerateError> {
    if !dir.is_dir() {
        return Err(GenerateError::Validation(dir.to_path_buf()));
    }
    let out_root = dir.join(OUTPUT_DIRNAME);
    let mut report = GenerateReport::default();
    // stem → title per output directory, for _meta.json.
    let mut meta: BTreeMap<PathBuf, BTreeMap<String, String>> = BTreeMap::new();

    for record in index.records().filter(|r| !r.orphaned) {
        let content = match std::fs::read_to_string(dir.join(&record.current_slug)) {
            Ok(c) => c,
            Err(e) => {
                report
                    .failed
                    .push((record.current_slug.clone(), format!("read failed: {e}")));
                continue;
            }
        };
        let rendered = match render(record, &content, template) {
            Ok(r) => r,
            Err(e) => {
                report.failed.push((record.current_slug.clone(), e.to_string()));
                continue;
            }
        };

        let stem = slug_stem(&record.current_slug);
        let rel_dir = Path::new(&record.current_slug)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .to_path_buf();
        let out_dir = out_root.join(&rel_dir);
        let out_path = out_dir.join(format!("{stem}.mdx"));

        meta.entry(out_dir)
            .or_default()
            .insert(stem.clone(), display_title(&stem));

        match write_if_changed(&out_path, &rendered) {
            Ok(true) => report.written.push(record.current_slug.clone()),
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                report
                    .failed
                    .push((record.current_slug.clone(), format!("write failed: {e}")));
            }
        }
    }

    for (out_dir, entries) in meta {
        let json = serde_json::to_string_pretty(&json!(entries))
            .unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = write_if_changed(&out_dir.join("_meta.json"), &json) {
            report.failed.push((
                out_dir.display().to_string(),
                format!("meta write failed: {e}"),
            ));
        }
    }

    Ok(report)
}

/// Write `content` to `path`, creating parents, skipping the write when
/// the file already holds exactly that content. Returns whether a write
/// happened.
fn write_if_changed(path: &Path, content: &str) -> std::io::Result<bool> {
    if let Ok(existing) = std::fs::read_to_string(path)
        && existing == content
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(true)
}
