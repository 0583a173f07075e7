//! Reconciliation of the papers folder against the bibliography.
//!
//! For every bibliography entry the [`Reconciler`] decides between:
//! - skip: the entry equals what the archive remembers (no file is touched)
//! - create: no note exists yet
//! - update: the header is regenerated, the user's notes are carried over
//! - rename + update: the title changed, so the note moves to its new name
//!
//! Afterwards every archived identifier that is no longer in the
//! bibliography has its note moved into the removed-papers folder.
//!
//! Filenames are only a weak reference to an identifier: the note for `X1`
//! is found by scanning the folder for names ending in `(X1).md`. The scan is
//! O(folder size) per changed identifier, which is fine for the hundreds to
//! low thousands of notes a reference library holds.
//!
//! Failures are isolated per identifier. A failed entry is logged, left out
//! of the archive update, and naturally retried on the next run.

use std::collections::HashSet;
use thiserror::Error;

use crate::archive::Archive;
use crate::bibtex::{RawRecord, ENTRY_TYPE_FIELD};
use crate::entry::{normalize, PaperEntry};
use crate::filename::{backup_filename, locate_suffix, note_filename};
use crate::fs::{FileSystem, FsError};
use crate::note::{extract_user_content, note_identifier, render_note, UserContent};

/// Folder (inside the papers folder) receiving notes of removed entries.
pub const REMOVED_FOLDER: &str = "Removed Papers";

/// Give up finding a free name in the removed folder after this many tries.
const MAX_REMOVED_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("{path} already holds the note for {owner}")]
    NameTaken { path: String, owner: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Subfolder of the papers folder for notes whose entry was removed
    pub removed_folder: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            removed_folder: REMOVED_FOLDER.to_string(),
        }
    }
}

/// A note that was renamed because its title changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMove {
    pub from: String,
    pub to: String,
}

/// What a sync run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries read from the bibliography (including skipped ones)
    pub total_entries: usize,
    /// Notes created for new identifiers
    pub created: Vec<String>,
    /// Notes rewritten for changed entries
    pub updated: Vec<String>,
    /// Title-change renames (also counted in `updated`)
    pub renamed: Vec<FileMove>,
    /// Entries identical to the archive, left alone
    pub unchanged: usize,
    /// Records without identifier or with a duplicate identifier
    pub skipped: usize,
    /// Identifiers whose processing failed
    pub failed: Vec<String>,
    /// Notes moved into the removed-papers folder
    pub archived: Vec<String>,
}

impl SyncReport {
    /// Check if any file was written or moved
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty() || !self.updated.is_empty() || !self.archived.is_empty()
    }

    /// Notes written this run
    pub fn total_processed(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Notes in `dir` (non-recursive) belonging to `identifier`, sorted by name.
///
/// A note belongs to `identifier` when its name ends in `(<identifier>).md`
/// and its header does not name a different `ref_id`. The header check keeps
/// keys that sanitize to the same filename text (`Smith:2020`, `Smith2020`)
/// from claiming each other's notes.
pub fn matching_notes<F: FileSystem>(
    fs: &F,
    dir: &str,
    identifier: &str,
) -> std::result::Result<Vec<String>, FsError> {
    let suffix = locate_suffix(identifier);
    let mut names: Vec<String> = fs
        .list(dir)?
        .into_iter()
        .filter(|entry| !entry.is_dir && entry.name.ends_with(&suffix))
        .map(|entry| entry.name)
        .collect();
    names.sort();
    Ok(names
        .into_iter()
        .map(|name| join_path(dir, &name))
        .filter(|path| foreign_owner(fs, path, identifier).is_none())
        .collect())
}

/// The identifier in the header of `path`, if it names one other than `identifier`.
fn foreign_owner<F: FileSystem>(fs: &F, path: &str, identifier: &str) -> Option<String> {
    let bytes = fs.read(path).ok()?;
    note_identifier(&bytes).filter(|owner| owner != identifier)
}

/// First note in `dir` belonging to `identifier`, if any.
pub fn locate_by_identifier<F: FileSystem>(
    fs: &F,
    dir: &str,
    identifier: &str,
) -> std::result::Result<Option<String>, FsError> {
    Ok(matching_notes(fs, dir, identifier)?.into_iter().next())
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split `"Title (X1).md"` into `("Title (X1)", ".md")`.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

/// Reconciles a papers folder (the root of `fs`) with a bibliography.
pub struct Reconciler<F: FileSystem> {
    fs: F,
    archive: Archive,
    settings: SyncSettings,
}

impl<F: FileSystem> Reconciler<F> {
    pub fn new(fs: F, archive: Archive, settings: SyncSettings) -> Self {
        Self { fs, archive, settings }
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Hand back the archive for persisting.
    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// Run one full sync over `records`.
    pub fn run(&mut self, records: &[RawRecord]) -> SyncReport {
        let mut report = SyncReport {
            total_entries: records.len(),
            ..SyncReport::default()
        };
        let mut current_ids: HashSet<String> = HashSet::new();

        for raw in records {
            let entry = match normalize(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        "Skipping {} entry: {}",
                        raw.get(ENTRY_TYPE_FIELD).unwrap_or("bibliography"),
                        e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            if !current_ids.insert(entry.identifier.clone()) {
                tracing::warn!(
                    "Duplicate citation key {}, keeping the first entry",
                    entry.identifier
                );
                report.skipped += 1;
                continue;
            }

            if self.archive.is_unchanged(&entry) {
                tracing::debug!("Unchanged: {}", entry.identifier);
                report.unchanged += 1;
                continue;
            }

            let is_new = !self.archive.contains(&entry.identifier);
            match self.sync_entry(&entry, &mut report) {
                Ok((path, user)) => {
                    if is_new {
                        tracing::info!("Created: {}", path);
                        report.created.push(path);
                    } else {
                        tracing::info!("Updated: {}", path);
                        report.updated.push(path);
                    }
                    self.archive.insert(entry, user.notes);
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {}", entry.identifier, e);
                    report.failed.push(entry.identifier);
                }
            }
        }

        self.archive_removed(&current_ids, &mut report);

        report
    }

    /// Create, update or rename the note for one changed entry.
    ///
    /// Returns the path written and the user content embedded in it.
    fn sync_entry(
        &self,
        entry: &PaperEntry,
        report: &mut SyncReport,
    ) -> Result<(String, UserContent)> {
        let identifier = &entry.identifier;
        let target = note_filename(&entry.title, identifier);

        let existing = locate_by_identifier(&self.fs, "", identifier)?;
        if existing.is_none() {
            if let Some(owner) = foreign_owner(&self.fs, &target, identifier) {
                return Err(SyncError::NameTaken {
                    path: target,
                    owner,
                });
            }
        }

        let user = self.resolve_user_content(identifier, existing.as_deref(), &target);

        let path = match existing {
            Some(existing) if existing != target => {
                match self.rename_into_place(&existing, &target, identifier) {
                    Ok(()) => {
                        tracing::info!("Title changed - renamed: {} -> {}", existing, target);
                        report.renamed.push(FileMove {
                            from: existing,
                            to: target.clone(),
                        });
                        target
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Could not rename {} -> {}: {}. Updating it under its old name",
                            existing,
                            target,
                            e
                        );
                        existing
                    }
                }
            }
            Some(existing) => existing,
            None => target,
        };

        self.fs.write(&path, render_note(entry, &user).as_bytes())?;
        Ok((path, user))
    }

    /// User content to carry into the rewritten note.
    ///
    /// The located note wins. Without one, a file already sitting at the
    /// target name is used (names without the identifier suffix are not found
    /// by the scan). Only when neither exists do the archived notes apply.
    fn resolve_user_content(
        &self,
        identifier: &str,
        existing: Option<&str>,
        target: &str,
    ) -> UserContent {
        let path = existing.unwrap_or(target);
        match self.fs.read(path) {
            Ok(bytes) => extract_user_content(Some(&bytes)),
            Err(FsError::NotFound(_)) if existing.is_none() => {
                let notes = self
                    .archive
                    .get(identifier)
                    .map(|a| a.notes())
                    .unwrap_or_default();
                if !notes.is_empty() {
                    tracing::warn!("Note for {} is missing, restoring archived notes", identifier);
                }
                UserContent::new(notes)
            }
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path, e);
                extract_user_content(None)
            }
        }
    }

    /// Rename `existing` to `target`, first moving aside whatever blocks the target.
    ///
    /// A target holding another identifier's note is never moved.
    fn rename_into_place(
        &self,
        existing: &str,
        target: &str,
        identifier: &str,
    ) -> std::result::Result<(), FsError> {
        if self.fs.exists(target)? {
            if foreign_owner(&self.fs, target, identifier).is_some() {
                return Err(FsError::AlreadyExists(target.to_string()));
            }
            let backup = backup_filename(target, identifier);
            tracing::warn!("Target {} already exists, backing it up as {}", target, backup);
            self.fs.rename(target, &backup)?;
        }
        self.fs.rename(existing, target)
    }

    /// Move notes of identifiers that left the bibliography into the removed folder.
    fn archive_removed(&mut self, current_ids: &HashSet<String>, report: &mut SyncReport) {
        let removed: Vec<String> = self
            .archive
            .identifiers()
            .filter(|id| !current_ids.contains(*id))
            .map(str::to_string)
            .collect();

        for identifier in removed {
            let notes = match matching_notes(&self.fs, "", &identifier) {
                Ok(notes) => notes,
                Err(e) => {
                    tracing::error!("Could not look up note for removed {}: {}", identifier, e);
                    continue;
                }
            };

            let mut all_moved = true;
            for note in notes {
                match self.move_to_removed(&note) {
                    Ok(destination) => {
                        tracing::info!("Moved to {}: {}", self.settings.removed_folder, note);
                        report.archived.push(destination);
                    }
                    Err(e) => {
                        tracing::error!("Error moving {}: {}", note, e);
                        all_moved = false;
                    }
                }
            }

            // Failed moves keep the identifier so the next run retries them
            if all_moved {
                self.archive.remove(&identifier);
            }
        }
    }

    fn move_to_removed(&self, note: &str) -> std::result::Result<String, FsError> {
        let folder = &self.settings.removed_folder;
        if !self.fs.exists(folder)? {
            self.fs.mkdir(folder)?;
        }

        let destination = self.free_removed_name(note)?;
        self.fs.rename(note, &destination)?;
        Ok(destination)
    }

    /// `"<folder>/<name>"`, or `"<folder>/<stem> 2.md"` etc. if that is taken.
    fn free_removed_name(&self, note: &str) -> std::result::Result<String, FsError> {
        let folder = &self.settings.removed_folder;
        let candidate = join_path(folder, note);
        if !self.fs.exists(&candidate)? {
            return Ok(candidate);
        }

        let (stem, extension) = split_extension(note);
        for n in 2..MAX_REMOVED_NAME_ATTEMPTS {
            let candidate = join_path(folder, &format!("{} {}{}", stem, n, extension));
            if !self.fs.exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(FsError::AlreadyExists(candidate))
    }
}
