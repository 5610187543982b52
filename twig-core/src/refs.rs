//! Branch refs and the current-branch marker
//!
//! Layout:
//! ```text
//! {root}/refs/heads/{branch}  — commit id (hex)
//! {root}/current-branch       — checked-out branch name
//! ```
//!
//! HEAD is not stored; it is always `refs/heads/{current-branch}`.

use crate::error::{Result, TwigError};
use crate::object::ObjectId;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

pub struct RefStore {
    heads_dir: PathBuf,
    current_path: PathBuf,
}

/// Reject names that cannot be a single file under `refs/heads`
pub fn validate_branch_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.ends_with(".tmp")
        || name.contains(['/', '\\'])
        || name.chars().any(|c| c.is_whitespace() || c.is_control());
    if bad {
        return Err(TwigError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl RefStore {
    pub fn new(root: &Path) -> Self {
        Self {
            heads_dir: root.join("refs").join("heads"),
            current_path: root.join("current-branch"),
        }
    }

    /// Create the ref layout with a single branch pointing at `commit`
    pub fn initialize(&self, branch: &str, commit: ObjectId) -> Result<()> {
        validate_branch_name(branch)?;
        fs::create_dir_all(&self.heads_dir)?;
        self.write(branch, commit)?;
        self.set_current_branch(branch)
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.heads_dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_branch_name(name).is_ok() && self.branch_path(name).is_file()
    }

    /// Commit a branch points at, `None` if there is no such branch
    pub fn read(&self, name: &str) -> Result<Option<ObjectId>> {
        if validate_branch_name(name).is_err() {
            return Ok(None);
        }
        let data = match fs::read_to_string(self.branch_path(name)) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ObjectId::from_hex(data.trim())
            .map(Some)
            .map_err(|e| TwigError::corrupt(format!("branch {} holds a bad id: {}", name, e)))
    }

    pub fn write(&self, name: &str, id: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        write_atomic(&self.branch_path(name), &id.to_hex())?;
        tracing::debug!(branch = name, %id, "ref updated");
        Ok(())
    }

    /// Delete a branch; `false` if it did not exist
    pub fn delete(&self, name: &str) -> Result<bool> {
        if validate_branch_name(name).is_err() {
            return Ok(false);
        }
        match fs::remove_file(self.branch_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All branch names, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.heads_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_branch_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn current_branch(&self) -> Result<String> {
        let name = fs::read_to_string(&self.current_path)
            .map_err(|e| TwigError::corrupt(format!("cannot read current branch: {}", e)))?;
        Ok(name.trim().to_string())
    }

    pub fn set_current_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        write_atomic(&self.current_path, name)
    }

    /// The checked-out commit
    pub fn head(&self) -> Result<ObjectId> {
        let branch = self.current_branch()?;
        self.read(&branch)?
            .ok_or_else(|| TwigError::corrupt(format!("current branch {} has no ref", branch)))
    }

    /// Point the current branch at `id`
    pub fn advance_head(&self, id: ObjectId) -> Result<()> {
        let branch = self.current_branch()?;
        self.write(&branch, id)
    }
}
