//! Filename → slug normalization.
//!
//! Every tracked file gets a canonical, URL-safe name derived from its
//! original filename. The rules are applied in a fixed order so the result
//! is deterministic and idempotent — normalizing an already-normalized name
//! is a no-op, which is what makes re-entrant runs cheap:
//!
//! 1. Split off the extension (normalized separately, lowercased).
//! 2. Lowercase the stem.
//! 3. Replace runs of whitespace and anything outside `[a-z0-9-]` with a
//!    single hyphen.
//! 4. Collapse consecutive hyphens.
//! 5. Trim leading/trailing hyphens.
//! 6. If nothing survives (e.g. a fully non-ASCII name), fall back to
//!    `file-<short-hash>` so the slug is still non-empty, ASCII-safe, and
//!    stable for that original name.
//!
//! Pure functions only: no I/O, no clocks, no global state.

use sha2::{Digest, Sha256};

/// Placeholder stem used when normalization leaves nothing behind.
const EMPTY_STEM_PLACEHOLDER: &str = "file";

/// Hex digits of the original-name hash appended to the placeholder.
const FALLBACK_HASH_LEN: usize = 8;

/// Normalize a filename stem into a slug.
///
/// Operates on the stem only — callers split the extension off first
/// (see [`normalize_filename`] for the whole-filename variant).
///
/// ```
/// use mdxgen::slug::normalize;
///
/// assert_eq!(normalize("Hello World"), "hello-world");
/// assert_eq!(normalize("  multiple   spaces"), "multiple-spaces");
/// assert_eq!(normalize("---trim---"), "trim");
/// assert_eq!(normalize(normalize("My Post!").as_str()), normalize("My Post!"));
/// ```
pub fn normalize(stem: &str) -> String {
    let mut slug = String::with_capacity(stem.len());
    let mut prev_hyphen = true; // swallows leading hyphens
    for c in stem.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        return format!("{}-{}", EMPTY_STEM_PLACEHOLDER, short_hash(stem));
    }
    slug
}

/// Normalize a full filename, preserving (and lowercasing) its extension.
///
/// `"Hello World.MD"` → `"hello-world.md"`. Files without an extension
/// are normalized as a bare stem.
pub fn normalize_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        // A leading dot (hidden file) or empty suffix is not an extension split.
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", normalize(stem), ext.to_ascii_lowercase())
        }
        _ => normalize(filename),
    }
}

/// Short hex hash of an original name, used for the empty-stem fallback.
///
/// Hashes the *original* input so distinct unnormalizable names get
/// distinct slugs, while the same name always maps to the same slug.
fn short_hash(original: &str) -> String {
    let digest = Sha256::digest(original.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..FALLBACK_HASH_LEN].to_string()
}
