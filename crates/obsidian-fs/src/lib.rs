//! Filename and frontmatter utilities for Obsidian notes
//!
//! Handles note filename sanitization, relative path validation, and YAML
//! frontmatter parsing. These are pure functions with no I/O - actual
//! filesystem operations live with the callers.

mod frontmatter;

pub use frontmatter::{
    Frontmatter, ParsedNote, escape_double_quoted, parse_frontmatter, split_frontmatter,
};

/// Characters that are rejected in filenames by at least one of the
/// platforms Obsidian runs on.
pub const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove characters that cannot appear in a filename.
///
/// Everything else (spaces, casing, unicode) is kept as-is so note names
/// stay readable in the Obsidian file explorer.
pub fn strip_illegal_filename_chars(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}

/// Validate that a relative path is safe (no directory traversal)
pub fn validate_relative_path(path: &str) -> Result<String, PathValidationError> {
    // Remove leading slash if present
    let clean_path = path.strip_prefix('/').unwrap_or(path);

    if clean_path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathValidationError::DirectoryTraversal);
    }

    if clean_path.starts_with('/') {
        return Err(PathValidationError::AbsolutePath);
    }

    Ok(clean_path.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    DirectoryTraversal,
    AbsolutePath,
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathValidationError::DirectoryTraversal => {
                write!(f, "Path contains directory traversal")
            }
            PathValidationError::AbsolutePath => write!(f, "Path is absolute"),
        }
    }
}

impl std::error::Error for PathValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    // stripIllegalFilenameChars tests
    #[test]
    fn strip_removes_every_illegal_char() {
        let result = strip_illegal_filename_chars(r#"a<b>c:d"e/f\g|h?i*j"#);
        assert_eq!(result, "abcdefghij");
    }

    #[test]
    fn strip_keeps_spaces_and_punctuation() {
        let result = strip_illegal_filename_chars("BERT: Pre-training (v2), Revisited!");
        assert_eq!(result, "BERT Pre-training (v2), Revisited!");
    }

    // validateRelativePath tests
    #[test]
    fn validate_rejects_directory_traversal() {
        let result = validate_relative_path("../secret");
        assert_eq!(result, Err(PathValidationError::DirectoryTraversal));
    }

    #[test]
    fn validate_rejects_nested_traversal() {
        let result = validate_relative_path("Removed Papers/../../etc");
        assert_eq!(result, Err(PathValidationError::DirectoryTraversal));
    }

    #[test]
    fn validate_allows_dots_inside_names() {
        let result = validate_relative_path("A Study... Of Things (X1).md");
        assert_eq!(result, Ok("A Study... Of Things (X1).md".to_string()));
    }

    #[test]
    fn validate_strips_leading_slash() {
        let result = validate_relative_path("/Removed Papers/Note.md");
        assert_eq!(result, Ok("Removed Papers/Note.md".to_string()));
    }

    #[test]
    fn validate_rejects_double_leading_slash() {
        let result = validate_relative_path("//etc/passwd");
        assert_eq!(result, Err(PathValidationError::AbsolutePath));
    }
}
