//! Note filename policy.
//!
//! Notes are named `"<title> (<identifier>).md"`. The identifier suffix is
//! what ties a file to its bibliography entry, so it always survives
//! truncation; the title is what gets cut.

use obsidian_fs::strip_illegal_filename_chars;

/// Maximum filename length, in characters. Leaves headroom under the
/// common 255 byte limit.
pub const MAX_FILENAME_LENGTH: usize = 250;

const EXTENSION: &str = ".md";

/// Identifier as it appears inside filenames.
pub fn filename_identifier(identifier: &str) -> String {
    strip_illegal_filename_chars(identifier)
}

/// The `" (<identifier>).md"` tail that marks a note as belonging to `identifier`.
pub fn identifier_suffix(identifier: &str) -> String {
    format!(" ({}){}", filename_identifier(identifier), EXTENSION)
}

/// Suffix used to locate an existing note regardless of its title.
///
/// Shorter than [`identifier_suffix`] (no leading space) so hand-renamed
/// files like `"Title(X1).md"` are still found.
pub fn locate_suffix(identifier: &str) -> String {
    format!("({}){}", filename_identifier(identifier), EXTENSION)
}

/// Build the filename for a note. Never fails.
pub fn note_filename(title: &str, identifier: &str) -> String {
    let safe_title = strip_illegal_filename_chars(title);
    let safe_title = safe_title.trim();

    let filename = if safe_title.is_empty() {
        format!("{}{}", filename_identifier(identifier), EXTENSION)
    } else {
        let suffix = identifier_suffix(identifier);
        let available = MAX_FILENAME_LENGTH.saturating_sub(suffix.chars().count());
        let title = truncate_chars(safe_title, available).trim_end();
        format!("{}{}", title, suffix)
    };

    // Only reachable with very long identifiers
    if filename.chars().count() > MAX_FILENAME_LENGTH {
        let stem = filename.strip_suffix(EXTENSION).unwrap_or(&filename);
        let budget = MAX_FILENAME_LENGTH - EXTENSION.len();
        return format!("{}{}", truncate_chars(stem, budget), EXTENSION);
    }

    filename
}

/// Backup name for a file that blocks a rename, e.g.
/// `"Title (X1)_backup_X1.md"`.
pub fn backup_filename(blocking: &str, identifier: &str) -> String {
    let stem = blocking.strip_suffix(EXTENSION).unwrap_or(blocking);
    format!("{}_backup_{}{}", stem, filename_identifier(identifier), EXTENSION)
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
