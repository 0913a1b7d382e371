//! Pipeline configuration module.
//!
//! Handles loading and validating `mdxgen.toml`. Configuration is sparse:
//! stock defaults cover everything, user files override only the values
//! they name. Unknown keys are rejected to catch typos early.
//!
//! ## Config File Location
//!
//! `mdxgen.toml` lives in the content directory being processed:
//!
//! ```text
//! content/
//! ├── mdxgen.toml          # Pipeline config (optional)
//! ├── My First Post.md
//! └── notes/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! normalize_filenames = true    # Run the rename step at all
//! create_backups = false        # Copy originals to .bak before renaming
//! update_metadata = true        # Flush the metadata index (off = diagnostics)
//! preserve_structure = false    # Organizer keeps relative sub-paths
//! recursive = false             # Descend into subdirectories when scanning
//! extensions = ["md", "mdx", "txt"]
//!
//! topics = []                   # Explicit topic list for `organize`
//! template = "default"          # Template name for `generate`
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file within a content directory.
pub const CONFIG_FILENAME: &str = "mdxgen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `mdxgen.toml`.
///
/// All fields have defaults. User config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Whether the normalize step renames files at all.
    pub normalize_filenames: bool,
    /// Copy each original file to `<name>.bak` before renaming it.
    pub create_backups: bool,
    /// Flush metadata index writes. Off = dry diagnostics: renames still
    /// happen but the index on disk is left untouched.
    pub update_metadata: bool,
    /// Organizer keeps each file's relative sub-path under its topic dir.
    pub preserve_structure: bool,
    /// Descend into subdirectories when scanning.
    pub recursive: bool,
    /// File extensions eligible for processing (lowercase, no dot).
    pub extensions: Vec<String>,
    /// Explicit topic list for the organize step.
    pub topics: Vec<String>,
    /// Template name for the generate step.
    pub template: String,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize_filenames: true,
            create_backups: false,
            update_metadata: true,
            preserve_structure: false,
            recursive: false,
            extensions: default_extensions(),
            topics: Vec::new(),
            template: "default".to_string(),
            processing: ProcessingConfig::default(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "mdx".into(), "txt".into()]
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "extensions must not be empty".into(),
            ));
        }
        for ext in &self.extensions {
            if ext.starts_with('.') || ext.chars().any(|c| !c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Validation(format!(
                    "extensions entries must be bare alphanumeric suffixes, got '{ext}'"
                )));
            }
        }
        if self.template.trim().is_empty() {
            return Err(ConfigError::Validation("template must not be empty".into()));
        }
        Ok(())
    }

    /// True if a path's extension is eligible for processing.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .map(|e| self.extensions.iter().any(|allowed| *allowed == e))
            .unwrap_or(false)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel hashing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Load config from `<dir>/mdxgen.toml`, falling back to defaults when the
/// file doesn't exist. Parse and validation errors are surfaced — a broken
/// config should stop the run, not silently revert to defaults.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: PipelineConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// A stock `mdxgen.toml` with every option present and documented.
/// Printed by the `gen-config` command.
pub fn stock_config_toml() -> String {
    r#"# mdxgen configuration. Every option is optional; the values below
# are the stock defaults. Delete anything you don't want to override.

# Run the filename normalization step at all.
normalize_filenames = true

# Copy each original file to <name>.bak before renaming it.
create_backups = false

# Write metadata index updates. Turn off for dry diagnostics: renames
# still happen but the index on disk is left untouched.
update_metadata = true

# When organizing into topic directories, keep each file's relative
# sub-path under its topic directory instead of flattening.
preserve_structure = false

# Descend into subdirectories when scanning.
recursive = false

# File extensions eligible for processing.
extensions = ["md", "mdx", "txt"]

# Explicit topic list for `mdxgen organize`. Empty = use --topics or
# --auto-detect on the command line.
topics = []

# Template name for `mdxgen generate`.
template = "default"

[processing]
# Max parallel hashing workers. Omit for auto (= CPU cores). Values
# above the core count are clamped down.
# max_processes = 4
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.normalize_filenames);
        assert!(config.update_metadata);
        assert!(!config.recursive);
        assert_eq!(config.extensions, vec!["md", "mdx", "txt"]);
        assert_eq!(config.template, "default");
    }

    #[test]
    fn sparse_override() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "recursive = true\ntopics = [\"rust\", \"guides\"]\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.recursive);
        assert_eq!(config.topics, vec!["rust", "guides"]);
        // untouched fields keep defaults
        assert!(config.normalize_filenames);
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "recusrive = true\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_extension_rejected() {
        let config = PipelineConfig {
            extensions: vec![".md".into()],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn empty_extensions_rejected() {
        let config = PipelineConfig {
            extensions: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn matches_extension_case_insensitive() {
        let config = PipelineConfig::default();
        assert!(config.matches_extension(Path::new("a/b/Post.MD")));
        assert!(config.matches_extension(Path::new("x.mdx")));
        assert!(!config.matches_extension(Path::new("photo.jpg")));
        assert!(!config.matches_extension(Path::new("no_extension")));
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism().unwrap().get();
        let config = ProcessingConfig {
            max_processes: Some(cores + 16),
        };
        assert_eq!(effective_threads(&config), cores);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        let one = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&one), 1);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let parsed: PipelineConfig = toml::from_str(&stock_config_toml()).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.extensions, PipelineConfig::default().extensions);
    }
}
