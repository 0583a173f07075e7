//! FileSystem trait abstraction for the papers directory.
//!
//! Implementations:
//! - `NativeFs` - std::fs rooted at the papers folder
//! - `InMemoryFs` - For testing
//!
//! All paths are relative to the root of the implementation, using `/` as
//! separator (e.g. `"Removed Papers/Title (X1).md"`).

use obsidian_fs::validate_relative_path;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File or directory name (not full path)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// The filesystem operations the sync needs from the papers directory.
pub trait FileSystem {
    /// Read file contents
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Replace file contents, creating the file if needed.
    ///
    /// Implementations should make the replacement atomic where the platform allows.
    fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// List directory contents (non-recursive)
    fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Move a file. Fails with `AlreadyExists` if `to` is taken.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Check if path exists
    fn exists(&self, path: &str) -> Result<bool>;

    /// Create directory (and parents if needed)
    fn mkdir(&self, path: &str) -> Result<()>;
}

impl<T: FileSystem + ?Sized> FileSystem for Arc<T> {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        (**self).write(path, content)
    }

    fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        (**self).list(path)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        (**self).rename(from, to)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path)
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        (**self).mkdir(path)
    }
}

/// Native filesystem rooted at a base directory.
pub struct NativeFs {
    base_path: PathBuf,
}

impl NativeFs {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            return Ok(self.base_path.clone());
        }
        let clean = validate_relative_path(path).map_err(|e| FsError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.base_path.join(clean))
    }

    fn io_error(path: &str, e: io::Error) -> FsError {
        if e.kind() == io::ErrorKind::NotFound {
            FsError::NotFound(path.to_string())
        } else {
            FsError::Io {
                path: path.to_string(),
                message: e.to_string(),
            }
        }
    }

    /// Generate a random hex string for temp file names.
    fn random_hex() -> String {
        let bytes: [u8; 8] = rand::rng().random();
        hex::encode(bytes)
    }

    /// Atomic write using temp file + rename.
    ///
    /// Readers (and file watchers) only ever see the old or the new content.
    /// The temp name is short and hidden so it never trips filename length
    /// limits or shows up in the Obsidian file explorer.
    fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
        let temp_name = format!(".{}.tmp", Self::random_hex());
        let temp_path = match path.parent() {
            Some(parent) => parent.join(temp_name),
            None => PathBuf::from(temp_name),
        };

        if let Err(e) = fs::write(&temp_path, content) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        Ok(())
    }
}

impl FileSystem for NativeFs {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        fs::read(&full_path).map_err(|e| Self::io_error(path, e))
    }

    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        Self::atomic_write(&full_path, content).map_err(|e| Self::io_error(path, e))
    }

    fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let full_path = self.full_path(path)?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&full_path).map_err(|e| Self::io_error(path, e))? {
            let entry = entry.map_err(|e| Self::io_error(path, e))?;
            let file_type = entry.file_type().map_err(|e| Self::io_error(path, e))?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.full_path(from)?;
        let to_path = self.full_path(to)?;

        // std::fs::rename silently replaces the target on unix
        if to_path.exists() {
            return Err(FsError::AlreadyExists(to.to_string()));
        }

        fs::rename(&from_path, &to_path).map_err(|e| Self::io_error(from, e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.full_path(path)?.exists())
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        fs::create_dir_all(&full_path).map_err(|e| Self::io_error(path, e))
    }
}

/// In-memory filesystem for testing
pub struct InMemoryFs {
    files: RwLock<HashMap<String, Vec<u8>>>,
    dirs: RwLock<HashSet<String>>,
    /// Number of successful `write` calls
    writes: AtomicUsize,
    /// Number of successful `rename` calls
    renames: AtomicUsize,
    /// Source paths whose rename should fail
    failing_renames: RwLock<HashSet<String>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        let mut dirs = HashSet::new();
        dirs.insert(String::new()); // Root directory
        Self {
            files: RwLock::new(HashMap::new()),
            dirs: RwLock::new(dirs),
            writes: AtomicUsize::new(0),
            renames: AtomicUsize::new(0),
            failing_renames: RwLock::new(HashSet::new()),
        }
    }

    /// Total writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total renames performed so far.
    pub fn rename_count(&self) -> usize {
        self.renames.load(Ordering::SeqCst)
    }

    /// Make every future rename of `from` fail with an IO error.
    pub fn fail_renames_from(&self, from: &str) {
        let mut failing = self.failing_renames.write().unwrap();
        failing.insert(Self::normalize_path(from));
    }

    /// Read a file as UTF-8, for assertions.
    pub fn read_string(&self, path: &str) -> Option<String> {
        let files = self.files.read().unwrap();
        files
            .get(&Self::normalize_path(path))
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
    }

    /// All file paths, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        let files = self.files.read().unwrap();
        let mut paths: Vec<String> = files.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn parent_path(path: &str) -> String {
        match path.rfind('/') {
            Some(pos) => path[..pos].to_string(),
            None => String::new(),
        }
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for InMemoryFs {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        files.get(&path).cloned().ok_or(FsError::NotFound(path))
    }

    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = Self::normalize_path(path);

        let parent = Self::parent_path(&path);
        if !self.dirs.read().unwrap().contains(&parent) {
            return Err(FsError::NotFound(parent));
        }

        let mut files = self.files.write().unwrap();
        files.insert(path, content.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = Self::normalize_path(path);

        let dirs = self.dirs.read().unwrap();
        if !dirs.contains(&path) {
            return Err(FsError::NotFound(path));
        }

        let files = self.files.read().unwrap();
        let mut entries: Vec<FileEntry> = files
            .keys()
            .filter(|file_path| Self::parent_path(file_path) == path)
            .map(|file_path| FileEntry {
                name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
                is_dir: false,
            })
            .collect();

        entries.extend(
            dirs.iter()
                .filter(|dir_path| !dir_path.is_empty() && Self::parent_path(dir_path) == path)
                .map(|dir_path| FileEntry {
                    name: dir_path.rsplit('/').next().unwrap_or(dir_path).to_string(),
                    is_dir: true,
                }),
        );

        Ok(entries)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = Self::normalize_path(from);
        let to = Self::normalize_path(to);

        if self.failing_renames.read().unwrap().contains(&from) {
            return Err(FsError::Io {
                path: from,
                message: "injected rename failure".to_string(),
            });
        }

        let parent = Self::parent_path(&to);
        if !self.dirs.read().unwrap().contains(&parent) {
            return Err(FsError::NotFound(parent));
        }

        let mut files = self.files.write().unwrap();
        if files.contains_key(&to) {
            return Err(FsError::AlreadyExists(to));
        }
        let content = files.remove(&from).ok_or_else(|| FsError::NotFound(from.clone()))?;
        files.insert(to, content);
        self.renames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let path = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        let dirs = self.dirs.read().unwrap();
        Ok(files.contains_key(&path) || dirs.contains(&path))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut dirs = self.dirs.write().unwrap();

        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            dirs.insert(current.clone());
        }
        Ok(())
    }
}
