//! File system access for archives and rendered images.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use walkdir::WalkDir;

use crate::error::{Error, Result};

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn dir_exists(&self, path: &Path) -> bool;

    fn read_binary_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Creates or truncates `path`.
    fn write_binary_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Every regular file below `root`, depth first, siblings sorted by name.
    fn all_file_paths(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_binary_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|source| Error::file_system(path, source))
    }

    fn write_binary_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes).map_err(|source| Error::file_system(path, source))
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|source| Error::file_system(path, source))
    }

    fn all_file_paths(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|error| {
                let path = error.path().unwrap_or(root).to_path_buf();
                Error::file_system(path, io::Error::other(error.to_string()))
            })?;
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryState {
    fn add_ancestors(&mut self, path: &Path) {
        for dir in path.ancestors() {
            if !dir.as_os_str().is_empty() {
                self.dirs.insert(dir.to_path_buf());
            }
        }
    }
}

/// Process-local file system; paths are compared exactly as given.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let state = self.state();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.state().dirs.contains(path)
    }

    fn read_binary_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.state().files.get(path).cloned().ok_or_else(|| {
            Error::file_system(path, io::Error::new(io::ErrorKind::NotFound, "no such file"))
        })
    }

    fn write_binary_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut state = self.state();
        if state.dirs.contains(path) {
            return Err(Error::file_system(
                path,
                io::Error::new(io::ErrorKind::IsADirectory, "path is a directory"),
            ));
        }
        if let Some(parent) = path.parent() {
            state.add_ancestors(parent);
        }
        state.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state();
        if state.files.contains_key(path) {
            return Err(Error::file_system(
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path is a file"),
            ));
        }
        state.add_ancestors(path);
        Ok(())
    }

    fn all_file_paths(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state();
        if !state.dirs.contains(root) && !state.files.contains_key(root) {
            return Err(Error::file_system(
                root,
                io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            ));
        }
        Ok(state
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }
}
