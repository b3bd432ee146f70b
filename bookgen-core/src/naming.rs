//! Deterministic artifact names derived from a book title.

use std::sync::OnceLock;

use regex::Regex;

/// Name of the raw outline snapshot stored next to each book.
pub const OUTLINE_SNAPSHOT: &str = "outline.json";

/// Suffix of the book snapshot; never collides with [`OUTLINE_SNAPSHOT`].
const BOOK_SNAPSHOT_SUFFIX: &str = "book.json";

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s").expect("static regex"))
}

/// Derive the file base name: every whitespace character becomes `_`,
/// `:` becomes `-` and `?` is dropped. Path separators, control characters
/// and `"` also become `_` so the name stays a single path segment that fits
/// in a header.
pub fn derive_base_name(title: &str) -> String {
    whitespace()
        .replace_all(title, "_")
        .replace(':', "-")
        .replace('?', "")
        .replace(|c: char| c == '/' || c == '\\' || c == '"' || c.is_control(), "_")
}

/// `<base>.<extension>`
pub fn artifact_file_name(title: &str, extension: &str) -> String {
    format!("{}.{}", derive_base_name(title), extension)
}

/// `<base>.book.json`
pub fn book_snapshot_name(title: &str) -> String {
    artifact_file_name(title, BOOK_SNAPSHOT_SUFFIX)
}
