//! Exclusive repository lock
//!
//! One twig command mutates a repository at a time. The lock is an OS-level
//! advisory lock on `.twig/lock`, taken without blocking and released when
//! the guard drops.

use crate::error::{Result, TwigError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Lock file name inside the repository directory
pub const LOCK_FILE: &str = "lock";

/// An exclusive lock on the repository, released on drop
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Take the lock for the repository directory `repo_dir`
    ///
    /// Fails with [`TwigError::Locked`] right away if another process (or
    /// another guard in this process) holds it.
    pub fn acquire(repo_dir: &Path) -> Result<Self> {
        let path = repo_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("acquired repository lock {:?}", path);
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == IoErrorKind::WouldBlock => Err(TwigError::Locked),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release before the guard goes out of scope
    pub fn release(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file)?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = RepoLock::acquire(tmp.path()).unwrap();
        assert!(lock.is_held());
        assert_eq!(lock.path(), tmp.path().join(LOCK_FILE));
        drop(lock);

        let again = RepoLock::acquire(tmp.path()).unwrap();
        assert!(again.is_held());
    }

    #[test]
    fn test_second_acquire_fails_fast() {
        let tmp = TempDir::new().unwrap();
        let _held = RepoLock::acquire(tmp.path()).unwrap();
        assert!(matches!(RepoLock::acquire(tmp.path()), Err(TwigError::Locked)));
    }

    #[test]
    fn test_explicit_release() {
        let tmp = TempDir::new().unwrap();
        let mut lock = RepoLock::acquire(tmp.path()).unwrap();
        lock.release().unwrap();
        assert!(!lock.is_held());
        assert!(RepoLock::acquire(tmp.path()).is_ok());
    }
}
