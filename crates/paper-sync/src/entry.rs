//! Bibliography record normalization.
//!
//! Turns a [`RawRecord`] into the canonical [`PaperEntry`] that is rendered
//! into notes and remembered in the archive. Normalization is pure: the same
//! record always yields the same entry, which is what makes the unchanged
//! check in the sync meaningful.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bibtex::RawRecord;

/// Anything outside letters, digits, whitespace and `& , - . / : ; ? ( ) " '`.
static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^A-Za-z0-9\s&,\-./:;?()"']+"#).expect("valid regex"));

/// `and` / `And` between authors, including across line breaks.
static AUTHOR_CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[Aa]nd\s+").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Record has no citation key")]
    MissingIdentifier,
}

/// Canonical, comparable view of one bibliography entry.
///
/// Serialized with the key names of the archive file, so `venue` and
/// `conference_venue` appear as `journal` and `booktitle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperEntry {
    #[serde(rename = "ref_id")]
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, rename = "journal")]
    pub venue: String,
    #[serde(default, rename = "booktitle")]
    pub conference_venue: String,
}

/// Normalize one raw record.
///
/// Fails only when the citation key is missing or blank.
pub fn normalize(raw: &RawRecord) -> Result<PaperEntry, NormalizeError> {
    let identifier = raw
        .id()
        .filter(|id| !id.trim().is_empty())
        .ok_or(NormalizeError::MissingIdentifier)?
        .to_string();

    let field = |name: &str| raw.get(name).map(clean_text).unwrap_or_default();

    Ok(PaperEntry {
        identifier,
        title: field("title"),
        authors: raw.get("author").map(normalize_authors).unwrap_or_default(),
        year: field("year"),
        link: raw.get("url").map(str::to_string),
        abstract_text: field("abstract"),
        venue: field("journal"),
        conference_venue: field("booktitle"),
    })
}

/// Strip characters outside the allow-list and collapse whitespace runs.
pub fn clean_text(text: &str) -> String {
    let stripped = DISALLOWED_CHARS.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full author pipeline: unify conjunctions, clean, then reorder names.
fn normalize_authors(raw: &str) -> String {
    let delimited = AUTHOR_CONJUNCTION.replace_all(raw, "; ");
    format_authors(&clean_text(&delimited))
}

/// Turn `"Last, First; Last2, First2"` into `"First Last, First2 Last2"`.
///
/// Bare names pass through. Names with more than one comma keep their parts
/// in order, joined by spaces.
pub fn format_authors(authors: &str) -> String {
    if authors.is_empty() {
        return String::new();
    }

    authors
        .split(';')
        .map(|author| {
            let parts: Vec<&str> = author.split(',').collect();
            match parts.as_slice() {
                [name] => name.trim().to_string(),
                [last, first] => format!("{} {}", first.trim(), last.trim()),
                _ => parts.join(" ").trim().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, &str)]) -> RawRecord {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_normalize_full_record() {
        let raw = record(&[
            ("ID", "Vaswani2017-ab"),
            ("title", "Attention is {All} you need"),
            ("author", "Vaswani, Ashish and Shazeer, Noam"),
            ("year", "2017"),
            ("url", "https://example.org/paper?id=1&x=2"),
            ("abstract", "The dominant\n   sequence models..."),
            ("booktitle", "Advances in {NeurIPS}"),
        ]);

        let entry = normalize(&raw).unwrap();
        assert_eq!(entry.identifier, "Vaswani2017-ab");
        assert_eq!(entry.title, "Attention is All you need");
        assert_eq!(entry.authors, "Ashish Vaswani, Noam Shazeer");
        assert_eq!(entry.year, "2017");
        assert_eq!(entry.link.as_deref(), Some("https://example.org/paper?id=1&x=2"));
        assert_eq!(entry.abstract_text, "The dominant sequence models...");
        assert_eq!(entry.venue, "");
        assert_eq!(entry.conference_venue, "Advances in NeurIPS");
    }

    #[test]
    fn test_normalize_missing_identifier() {
        let raw = record(&[("title", "No key")]);
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingIdentifier));

        let raw = record(&[("ID", "   "), ("title", "Blank key")]);
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingIdentifier));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = record(&[("ID", "k"), ("title", "Same"), ("author", "A, B")]);
        assert_eq!(normalize(&raw).unwrap(), normalize(&raw).unwrap());
    }

    #[test]
    fn test_normalize_absent_fields_are_empty() {
        let entry = normalize(&record(&[("ID", "k")])).unwrap();
        assert_eq!(
            entry,
            PaperEntry {
                identifier: "k".into(),
                ..PaperEntry::default()
            }
        );
    }

    #[test]
    fn test_clean_text_strips_and_collapses() {
        assert_eq!(clean_text("  {Deep}   \\emph{Learning}!  "), "Deep emphLearning");
        let allowed = "Q&A: what? (yes) \"quoted\" it's a/b; c-d.";
        assert_eq!(clean_text(allowed), allowed);
        assert_eq!(clean_text("tabs\tand\nnewlines"), "tabs and newlines");
        assert_eq!(clean_text("100% [sure] $x$"), "100 sure x");
    }

    #[test]
    fn test_format_authors_semicolon_list() {
        assert_eq!(format_authors("Smith, John; Doe, Jane"), "John Smith, Jane Doe");
    }

    #[test]
    fn test_format_authors_middle_names_and_bare_names() {
        assert_eq!(
            format_authors("Knuth, Donald Ervin; Plato; Lovelace, Ada"),
            "Donald Ervin Knuth, Plato, Ada Lovelace"
        );
    }

    #[test]
    fn test_format_authors_extra_commas() {
        assert_eq!(format_authors("King, Martin Luther, Jr"), "King  Martin Luther  Jr");
    }

    #[test]
    fn test_authors_conjunctions_match_semicolons() {
        let authors = |list: &str| normalize(&record(&[("ID", "a"), ("author", list)])).unwrap();
        let with_and = authors("Smith, John and Doe, Jane");
        let with_caps = authors("Smith, John And Doe, Jane");
        let with_semicolon = authors("Smith, John; Doe, Jane");

        assert_eq!(with_and.authors, "John Smith, Jane Doe");
        assert_eq!(with_and.authors, with_semicolon.authors);
        assert_eq!(with_caps.authors, with_semicolon.authors);
    }

    #[test]
    fn test_authors_wrapped_across_lines() {
        let raw = record(&[
            ("ID", "v"),
            ("author", "Vaswani, Ashish and Shazeer, Noam and\n    Parmar, Niki"),
        ]);
        assert_eq!(
            normalize(&raw).unwrap().authors,
            "Ashish Vaswani, Noam Shazeer, Niki Parmar"
        );
    }

    #[test]
    fn test_archive_key_names() {
        let entry = PaperEntry {
            identifier: "k".into(),
            venue: "J".into(),
            conference_venue: "C".into(),
            abstract_text: "A".into(),
            ..PaperEntry::default()
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ref_id"], "k");
        assert_eq!(json["journal"], "J");
        assert_eq!(json["booktitle"], "C");
        assert_eq!(json["abstract"], "A");
        assert_eq!(json["link"], serde_json::Value::Null);
    }
}
