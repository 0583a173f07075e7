//! Paper note format.
//!
//! A note is a YAML header generated from the [`PaperEntry`], a blank line,
//! and the user's own notes. The header is rewritten on every update; the
//! body belongs to the user and is carried over verbatim.
//!
//! ```markdown
//! ---
//! title: "Attention Is All You Need"
//! authors: "Ashish Vaswani, Noam Shazeer"
//! year: 2017
//! ref_id: "Vaswani2017"
//! type: paper
//! ---
//!
//! <!-- Add your notes here -->
//!
//! ```

use obsidian_fs::{escape_double_quoted, parse_frontmatter, split_frontmatter};
use serde_json::Value;
use std::fmt::Write;

use crate::entry::PaperEntry;

/// Body written into notes the user has not touched yet.
pub const PLACEHOLDER: &str = "<!-- Add your notes here -->";

/// Value of the `type` header field.
pub const NOTE_TYPE: &str = "paper";

/// The user-owned part of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContent {
    pub notes: String,
}

impl UserContent {
    pub fn new(notes: impl Into<String>) -> Self {
        Self { notes: notes.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Render a note. Same inputs always give byte-identical output.
pub fn render_note(entry: &PaperEntry, user: &UserContent) -> String {
    let mut out = String::from("---\n");

    // Writing to a String cannot fail
    let _ = writeln!(out, "title: \"{}\"", escape_double_quoted(&entry.title));
    quoted_field(&mut out, "authors", &entry.authors);
    if !entry.year.is_empty() {
        let _ = writeln!(out, "year: {}", entry.year);
    }
    quoted_field(&mut out, "journal", &entry.venue);
    quoted_field(&mut out, "conference", &entry.conference_venue);
    quoted_field(&mut out, "abstract", &entry.abstract_text);
    quoted_field(&mut out, "url", entry.link.as_deref().unwrap_or_default());
    let _ = writeln!(out, "ref_id: \"{}\"", escape_double_quoted(&entry.identifier));
    let _ = writeln!(out, "type: {}", NOTE_TYPE);
    out.push_str("---\n\n");

    if user.is_empty() {
        out.push_str(PLACEHOLDER);
    } else {
        out.push_str(&user.notes);
    }
    out.push_str("\n\n");

    out
}

fn quoted_field(out: &mut String, key: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "{}: \"{}\"", key, escape_double_quoted(value));
    }
}

/// Recover the user's notes from an existing note file.
///
/// Never fails: missing files, unreadable bytes and notes without a header
/// all yield empty notes.
pub fn extract_user_content(contents: Option<&[u8]>) -> UserContent {
    let Some(text) = contents.and_then(note_text) else {
        return UserContent::default();
    };

    let (header, body) = split_frontmatter(text);
    if header.is_none() {
        return UserContent::default();
    }

    let notes = body.trim();
    if notes == PLACEHOLDER {
        return UserContent::default();
    }

    UserContent::new(notes)
}

/// The `ref_id` recorded in a note's header, if it has one.
pub fn note_identifier(contents: &[u8]) -> Option<String> {
    let text = note_text(contents)?;
    let frontmatter = parse_frontmatter(text).frontmatter?;
    match frontmatter.get("ref_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Note bytes as text, without the byte order mark some editors prepend.
fn note_text(bytes: &[u8]) -> Option<&str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => {
            tracing::warn!("Existing note is not valid UTF-8, treating it as empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entry() -> PaperEntry {
        PaperEntry {
            identifier: "Vaswani2017".into(),
            title: "Attention Is All You Need".into(),
            authors: "Ashish Vaswani, Noam Shazeer".into(),
            year: "2017".into(),
            link: Some("https://arxiv.org/abs/1706.03762".into()),
            abstract_text: "The \"Transformer\" model.".into(),
            venue: "JMLR".into(),
            conference_venue: "NeurIPS".into(),
        }
    }

    #[test]
    fn test_render_full_entry_exact_format() {
        let rendered = render_note(&full_entry(), &UserContent::default());
        let expected = "---\n\
title: \"Attention Is All You Need\"\n\
authors: \"Ashish Vaswani, Noam Shazeer\"\n\
year: 2017\n\
journal: \"JMLR\"\n\
conference: \"NeurIPS\"\n\
abstract: \"The \\\"Transformer\\\" model.\"\n\
url: \"https://arxiv.org/abs/1706.03762\"\n\
ref_id: \"Vaswani2017\"\n\
type: paper\n\
---\n\
\n\
<!-- Add your notes here -->\n\
\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_omits_empty_fields() {
        let entry = PaperEntry {
            identifier: "k1".into(),
            title: "Only Title".into(),
            ..PaperEntry::default()
        };
        let rendered = render_note(&entry, &UserContent::new("My thoughts."));
        assert_eq!(
            rendered,
            "---\ntitle: \"Only Title\"\nref_id: \"k1\"\ntype: paper\n---\n\nMy thoughts.\n\n"
        );
    }

    #[test]
    fn test_render_empty_link_is_omitted() {
        let entry = PaperEntry {
            identifier: "k1".into(),
            link: Some(String::new()),
            ..PaperEntry::default()
        };
        assert!(!render_note(&entry, &UserContent::default()).contains("url:"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let user = UserContent::new("notes");
        assert_eq!(render_note(&full_entry(), &user), render_note(&full_entry(), &user));
    }

    #[test]
    fn test_rendered_header_is_valid_yaml() {
        let mut entry = full_entry();
        entry.title = "A \"quoted\" title: with colon".into();
        let rendered = render_note(&entry, &UserContent::default());

        let fm = parse_frontmatter(&rendered).frontmatter.unwrap();
        assert_eq!(fm["title"], Value::String("A \"quoted\" title: with colon".into()));
        assert_eq!(fm["abstract"], Value::String("The \"Transformer\" model.".into()));
        assert_eq!(fm["ref_id"], Value::String("Vaswani2017".into()));
        assert_eq!(fm["year"], Value::Number(2017.into()));
        assert_eq!(fm["type"], Value::String("paper".into()));
    }

    #[test]
    fn test_extract_missing_file() {
        assert_eq!(extract_user_content(None), UserContent::default());
    }

    #[test]
    fn test_extract_placeholder_is_empty() {
        let rendered = render_note(&full_entry(), &UserContent::default());
        assert_eq!(extract_user_content(Some(rendered.as_bytes())), UserContent::default());
    }

    #[test]
    fn test_extract_round_trips_user_notes() {
        let notes = "## Summary\n\nKey idea: attention.\n\n- point one\n- point two";
        let rendered = render_note(&full_entry(), &UserContent::new(notes));
        assert_eq!(extract_user_content(Some(rendered.as_bytes())).notes, notes);
    }

    #[test]
    fn test_extract_keeps_horizontal_rules_in_notes() {
        let notes = "Before\n\n---\n\nAfter";
        let rendered = render_note(&full_entry(), &UserContent::new(notes));
        assert_eq!(extract_user_content(Some(rendered.as_bytes())).notes, notes);
    }

    #[test]
    fn test_extract_trims_surrounding_whitespace() {
        let text = "---\nref_id: \"k\"\n---\n\n\n   My note   \n\n\n";
        assert_eq!(extract_user_content(Some(text.as_bytes())).notes, "My note");
    }

    #[test]
    fn test_extract_skips_byte_order_mark() {
        let rendered = render_note(&full_entry(), &UserContent::new("precious notes"));
        let with_bom = format!("\u{feff}{}", rendered);
        assert_eq!(
            extract_user_content(Some(with_bom.as_bytes())).notes,
            "precious notes"
        );
    }

    #[test]
    fn test_note_identifier() {
        let rendered = render_note(&full_entry(), &UserContent::default());
        assert_eq!(note_identifier(rendered.as_bytes()).as_deref(), Some("Vaswani2017"));

        let with_bom = format!("\u{feff}{}", rendered);
        assert_eq!(note_identifier(with_bom.as_bytes()).as_deref(), Some("Vaswani2017"));

        assert_eq!(note_identifier(b"---\nref_id: 2020\n---\n").as_deref(), Some("2020"));
        assert_eq!(note_identifier(b"---\ntitle: \"x\"\n---\n"), None);
        assert_eq!(note_identifier(b"no header"), None);
    }

    #[test]
    fn test_extract_malformed_inputs_fail_open() {
        assert_eq!(extract_user_content(Some(b"no header at all")), UserContent::default());
        assert_eq!(extract_user_content(Some(b"---\nunterminated")), UserContent::default());
        assert_eq!(extract_user_content(Some(&[0xff, 0xfe, 0x00])), UserContent::default());
        assert_eq!(extract_user_content(Some(b"")), UserContent::default());
    }
}
