//! Minimal BibTeX reader.
//!
//! Turns a `.bib` export into a list of [`RawRecord`]s: one field map per
//! entry, with the citation key under [`ID_FIELD`] and the entry type under
//! [`ENTRY_TYPE_FIELD`]. Field names are lower-cased, values keep their inner
//! braces and LaTeX markup (cleanup happens in [`crate::entry`]).
//!
//! Only standard entry types are read. `@string` macros are not interpolated:
//! a bare macro name is kept as its literal text.
//!
//! A malformed entry is logged and skipped; the reader resumes at the next
//! `@` so one bad entry never hides the rest of the bibliography.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Field holding the citation key.
pub const ID_FIELD: &str = "ID";
/// Field holding the lower-cased entry type.
pub const ENTRY_TYPE_FIELD: &str = "ENTRYTYPE";

/// Entry types read from the bibliography. Everything else is skipped.
pub const STANDARD_TYPES: &[&str] = &[
    "article",
    "book",
    "booklet",
    "conference",
    "inbook",
    "incollection",
    "inproceedings",
    "manual",
    "mastersthesis",
    "misc",
    "phdthesis",
    "proceedings",
    "techreport",
    "unpublished",
];

#[derive(Debug, Error)]
pub enum BibError {
    #[error("Failed to read bibliography {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// One bibliography entry as a plain field map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// The citation key, if the entry has one.
    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Result of reading a bibliography.
#[derive(Debug, Default)]
pub struct Bibliography {
    /// Entries of standard types, in file order
    pub records: Vec<RawRecord>,
    /// Malformed entries that were skipped
    pub malformed: usize,
}

/// Read and parse a bibliography file.
pub fn load(path: &Path) -> Result<Bibliography, BibError> {
    let text = fs::read_to_string(path).map_err(|source| BibError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse(&text))
}

/// Parse bibliography text.
pub fn parse(text: &str) -> Bibliography {
    let mut bibliography = Bibliography::default();
    let mut parser = Parser::new(text);

    while parser.seek_entry() {
        let start = parser.pos;
        match parser.entry() {
            Ok(Some(record)) => bibliography.records.push(record),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Skipping malformed bibliography entry: {}", e);
                bibliography.malformed += 1;
                // Resume scanning just past the '@' that started this entry
                parser.pos = start + 1;
            }
        }
    }

    bibliography
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn line(&self) -> usize {
        self.src[..self.pos].matches('\n').count() + 1
    }

    fn error(&self, message: impl Into<String>) -> BibError {
        BibError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Advance to the next `@name{` or `@name(`. Text between entries,
    /// including stray `@`s such as email addresses, is a comment.
    fn seek_entry(&mut self) -> bool {
        while let Some(offset) = self.rest().find('@') {
            self.pos += offset;
            if self.at_entry_start() {
                return true;
            }
            self.pos += 1;
        }
        self.pos = self.src.len();
        false
    }

    fn at_entry_start(&self) -> bool {
        let after = self.rest()['@'.len_utf8()..].trim_start();
        let name_len = after
            .find(|c: char| c.is_whitespace() || "{}()=,#\"@".contains(c))
            .unwrap_or(after.len());
        name_len > 0 && matches!(after[name_len..].trim_start().chars().next(), Some('{' | '('))
    }

    fn expect(&mut self, expected: char) -> Result<(), BibError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of file", expected))),
        }
    }

    /// Identifier-ish token: entry type, field name or bare value.
    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !"{}()=,#\"@".contains(c))
        {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// Parse one `@type{...}` block. Returns `None` for skipped block types.
    fn entry(&mut self) -> Result<Option<RawRecord>, BibError> {
        self.expect('@')?;
        self.skip_whitespace();
        let entry_type = self.name().to_lowercase();
        if entry_type.is_empty() {
            return Err(self.error("missing entry type after '@'"));
        }
        self.skip_whitespace();

        let close = match self.bump() {
            Some('{') => '}',
            Some('(') => ')',
            _ => return Err(self.error(format!("expected '{{' or '(' after @{}", entry_type))),
        };

        if !STANDARD_TYPES.contains(&entry_type.as_str()) {
            // @comment, @string, @preamble and non-standard types
            self.skip_balanced(close)?;
            return Ok(None);
        }

        let mut record = RawRecord::new();
        record.insert(ENTRY_TYPE_FIELD, entry_type);

        self.skip_whitespace();
        let key_start = self.pos;
        while self.peek().is_some_and(|c| c != ',' && c != close) {
            self.bump();
        }
        let key = self.src[key_start..self.pos].trim();
        if !key.is_empty() {
            record.insert(ID_FIELD, key);
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok(Some(record));
                }
                Some(_) => {
                    let field = self.name().to_lowercase();
                    if field.is_empty() {
                        return Err(self.error("expected a field name"));
                    }
                    self.skip_whitespace();
                    self.expect('=')?;
                    let value = self.value(close)?;
                    record.insert(field, value);
                }
                None => return Err(self.error("unterminated entry")),
            }
        }
    }

    /// A field value: pieces joined with `#`.
    fn value(&mut self, close: char) -> Result<String, BibError> {
        let mut value = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    let start = self.pos;
                    self.skip_balanced('}')?;
                    value.push_str(&self.src[start..self.pos - 1]);
                }
                Some('"') => {
                    self.bump();
                    value.push_str(self.quoted()?);
                }
                Some(c) if c != ',' && c != close => {
                    let word = self.name();
                    if word.is_empty() {
                        return Err(self.error(format!("unexpected '{}' in field value", c)));
                    }
                    value.push_str(word);
                }
                _ => return Err(self.error("missing field value")),
            }

            self.skip_whitespace();
            if self.peek() == Some('#') {
                self.bump();
            } else {
                return Ok(value);
            }
        }
    }

    /// Body of a `"..."` value; braces inside protect quotes.
    fn quoted(&mut self) -> Result<&'a str, BibError> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '\\' => {
                    self.bump();
                }
                '"' if depth == 0 => return Ok(&self.src[start..self.pos - 1]),
                _ => {}
            }
        }
        Err(self.error("unterminated quoted value"))
    }

    /// Skip to just past the matching `close`, honouring nested braces.
    fn skip_balanced(&mut self, close: char) -> Result<(), BibError> {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                c if c == close && depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error(format!("missing closing '{}'", close)))
    }
}
