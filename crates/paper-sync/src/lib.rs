//! paper-sync: Keep a folder of Obsidian paper notes in step with a BibTeX export.
//!
//! This crate provides:
//! - A small BibTeX reader and entry normalization
//! - Note rendering and recovery of the user's own notes
//! - The archive that remembers what was last synced
//! - The reconciler that creates, updates, renames and retires notes
//! - A FileSystem trait abstraction so the reconciler runs against memory in tests

pub mod archive;
pub mod bibtex;
pub mod config;
pub mod entry;
pub mod filename;
pub mod fs;
pub mod note;
pub mod sync;

pub use archive::{Archive, ArchiveError, ArchiveStorage, ArchivedPaper};
pub use bibtex::{Bibliography, BibError, RawRecord};
pub use config::{Config, ConfigArgs, ConfigError};
pub use entry::{normalize, NormalizeError, PaperEntry};
pub use fs::{FileEntry, FileSystem, FsError, InMemoryFs, NativeFs};
pub use note::{extract_user_content, render_note, UserContent};
pub use sync::{locate_by_identifier, Reconciler, SyncError, SyncReport, SyncSettings};
