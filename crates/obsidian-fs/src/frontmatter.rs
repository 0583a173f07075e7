//! YAML frontmatter handling for Obsidian notes
//!
//! Works with the YAML block at the start of markdown files:
//! ```markdown
//! ---
//! title: "My Paper"
//! year: 2021
//! ---
//!
//! Note content here...
//! ```

use serde_json::Value as JsonValue;

/// Frontmatter keys mapped to JSON values.
pub type Frontmatter = serde_json::Map<String, JsonValue>;

/// A parsed note with frontmatter separated from content.
///
/// The `content` field borrows from `raw` to avoid unnecessary allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote<'a> {
    /// The frontmatter key-value pairs, if present
    pub frontmatter: Option<Frontmatter>,
    /// The note content after the frontmatter (borrows from raw)
    pub content: &'a str,
    /// The raw file content (frontmatter + content)
    pub raw: &'a str,
}

/// Split a note into frontmatter YAML string and content, without parsing the YAML.
///
/// Returns (frontmatter_yaml, content) where frontmatter_yaml is None if
/// no valid frontmatter block was found. Exactly one line break after the
/// closing `---` is consumed, so a blank separator line shows up as a
/// leading newline in `content`.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let Some(after_opening) = raw.strip_prefix("---") else {
        return (None, raw);
    };

    // No newline after opening --- means invalid frontmatter
    let Some(block) = strip_line_break(after_opening) else {
        return (None, raw);
    };

    match find_closing_delimiter(block) {
        Some(close_pos) => {
            let yaml = &block[..close_pos];
            let after_close = &block[close_pos + 3..];
            let content = strip_line_break(after_close).unwrap_or(after_close);
            (Some(yaml), content)
        }
        None => (None, raw),
    }
}

fn strip_line_break(s: &str) -> Option<&str> {
    s.strip_prefix('\n').or_else(|| s.strip_prefix("\r\n"))
}

/// Find the position of the closing --- delimiter (must be at start of line)
fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut pos = 0;
    for line in s.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        if bare == "---" {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

/// Parse a note's raw content into frontmatter and content.
///
/// Invalid YAML, a non-mapping header and an empty header all yield
/// `frontmatter: None` rather than an error.
pub fn parse_frontmatter(raw: &str) -> ParsedNote<'_> {
    let (yaml_str, content) = split_frontmatter(raw);

    let frontmatter = yaml_str.and_then(|yaml| match serde_yaml::from_str::<JsonValue>(yaml) {
        Ok(JsonValue::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    });

    ParsedNote {
        frontmatter,
        content,
        raw,
    }
}

/// Escape text for embedding inside a YAML double-quoted scalar.
pub fn escape_double_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
