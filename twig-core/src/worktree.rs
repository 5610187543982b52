//! Working tree access
//!
//! Paths are relative, `/`-separated, and never reach into the repository
//! directory itself.

use crate::error::{Result, TwigError};
use crate::object::ObjectId;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Name of the repository directory at the top of a working tree
pub const REPO_DIR: &str = ".twig";

/// Turn a user-supplied path into the form used as a snapshot key
pub fn normalize_path(path: &str) -> Result<String> {
    let invalid = || TwigError::InvalidPath(path.to_string());
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(invalid());
    }
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid()),
            _ => parts.push(part),
        }
    }
    if parts.is_empty() || parts[0] == REPO_DIR {
        return Err(invalid());
    }
    Ok(parts.join("/"))
}

pub trait WorkTree {
    /// Every file in the tree, sorted
    fn list_files(&self) -> Result<Vec<String>>;

    /// File content, `None` when the file is absent
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a file, creating parent directories
    fn write(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete a file; `false` if it was not there
    fn remove(&mut self, path: &str) -> Result<bool>;

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.read(path)?.is_some())
    }

    /// Content hash of a file, `None` when absent
    fn hash(&self, path: &str) -> Result<Option<ObjectId>> {
        Ok(self.read(path)?.map(|data| ObjectId::from_data(&data)))
    }
}

/// Working tree backed by a directory on disk
pub struct DiskWorkTree {
    root: PathBuf,
}

impl DiskWorkTree {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        path.split('/').fold(self.root.clone(), |acc, part| acc.join(part))
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!("skipping non UTF-8 name in {:?}", dir);
                continue;
            };
            if prefix.is_empty() && name == REPO_DIR {
                continue;
            }
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &rel, out)?;
            } else if file_type.is_file() {
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl WorkTree for DiskWorkTree {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        self.walk(&self.root, "", &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Ok(None);
        }
        match fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, data)?;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<bool> {
        let full = self.full_path(path);
        match fs::remove_file(&full) {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        // Prune directories the removal emptied
        let mut dir = full.parent();
        while let Some(d) = dir {
            if d == self.root.as_path() || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(true)
    }
}

/// Working tree held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryWorkTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, data)| (path.to_string(), data.to_vec()))
                .collect(),
        }
    }
}

impl WorkTree for MemoryWorkTree {
    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<bool> {
        Ok(self.files.remove(path).is_some())
    }
}
