//! Persisted memory of what was last synced.
//!
//! The archive maps each citation key to the entry that was last written and
//! the notes that were in the file at that time. It is only used to detect
//! changes; the note files stay the source of truth for user content.
//!
//! Stored as pretty-printed JSON:
//! ```json
//! {
//!   "Vaswani2017": {
//!     "entry": { "title": "...", "ref_id": "Vaswani2017", ... },
//!     "notes": ""
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entry::PaperEntry;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to access archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One archived paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchivedPaper {
    /// Entry written by the current format
    Synced {
        entry: PaperEntry,
        #[serde(default)]
        notes: String,
    },
    /// Anything else (older archive layouts); never matches a fresh entry
    Legacy(serde_json::Value),
}

impl ArchivedPaper {
    pub fn new(entry: PaperEntry, notes: impl Into<String>) -> Self {
        ArchivedPaper::Synced {
            entry,
            notes: notes.into(),
        }
    }

    pub fn entry(&self) -> Option<&PaperEntry> {
        match self {
            ArchivedPaper::Synced { entry, .. } => Some(entry),
            ArchivedPaper::Legacy(_) => None,
        }
    }

    /// Notes remembered from the last sync, if any.
    pub fn notes(&self) -> &str {
        match self {
            ArchivedPaper::Synced { notes, .. } => notes,
            ArchivedPaper::Legacy(_) => "",
        }
    }
}

/// Citation key -> last synced state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Archive {
    papers: BTreeMap<String, ArchivedPaper>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&ArchivedPaper> {
        self.papers.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.papers.contains_key(identifier)
    }

    /// True if `entry` is exactly what was last synced for its identifier.
    pub fn is_unchanged(&self, entry: &PaperEntry) -> bool {
        self.get(&entry.identifier)
            .and_then(ArchivedPaper::entry)
            .is_some_and(|archived| archived == entry)
    }

    pub fn insert(&mut self, entry: PaperEntry, notes: impl Into<String>) {
        let identifier = entry.identifier.clone();
        self.papers.insert(identifier, ArchivedPaper::new(entry, notes));
    }

    pub fn remove(&mut self, identifier: &str) -> Option<ArchivedPaper> {
        self.papers.remove(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.papers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

/// JSON file holding the archive.
pub struct ArchiveStorage {
    path: PathBuf,
}

impl ArchiveStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the archive. A missing file is an empty archive (first run).
    pub fn load(&self) -> Result<Archive, ArchiveError> {
        if !self.path.exists() {
            return Ok(Archive::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ArchiveError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the whole archive back in one go.
    pub fn save(&self, archive: &Archive) -> Result<(), ArchiveError> {
        let io_err = |source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(archive).map_err(|source| ArchiveError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, contents).map_err(io_err)
    }
}
