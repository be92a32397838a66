//! Read-only resource sets that fonts are loaded from.
//!
//! Resource paths are always `/`-separated and relative to the root of the
//! set, whatever the host platform uses.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const RESOURCE_PATH_SEPARATOR: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait ResourceProvider: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Entries directly below `path`, sorted by name.
    fn read_dir(&self, path: &str) -> Result<Vec<ResourceEntry>>;

    fn path_separator(&self) -> &str {
        RESOURCE_PATH_SEPARATOR
    }
}

pub fn join_resource_path(separator: &str, parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(separator);
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}{separator}{name}")
    }
}

/// Resources read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskResources {
    root: PathBuf,
}

impl DiskResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split(RESOURCE_PATH_SEPARATOR)
            .filter(|part| !part.is_empty() && *part != ".")
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl ResourceProvider for DiskResources {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|source| Error::file_system(full, source))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<ResourceEntry>> {
        let full = self.resolve(path);
        let entries = fs::read_dir(&full).map_err(|source| Error::file_system(&full, source))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::file_system(&full, source))?;
            let file_type = entry
                .file_type()
                .map_err(|source| Error::file_system(entry.path(), source))?;
            out.push(ResourceEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: file_type.is_dir(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

/// Resources held in memory, keyed by their `/`-separated path.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files
            .insert(path.trim_matches('/').to_owned(), bytes.into());
    }
}

impl ResourceProvider for MemoryResources {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path.trim_matches('/'))
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<ResourceEntry>> {
        let prefix = path.trim_matches('/');
        let mut entries: BTreeMap<String, bool> = BTreeMap::new();

        for key in self.files.keys() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    entries.insert(dir.to_owned(), true);
                }
                None => {
                    entries.entry(rest.to_owned()).or_insert(false);
                }
            }
        }

        if entries.is_empty() {
            return Err(not_found(path));
        }
        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| ResourceEntry { name, is_dir })
            .collect())
    }
}

fn not_found(path: &str) -> Error {
    Error::file_system(
        path,
        io::Error::new(io::ErrorKind::NotFound, "no such resource"),
    )
}
