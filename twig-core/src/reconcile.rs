//! Working tree reconciliation
//!
//! Compares the working tree, the staging index and the current snapshot to
//! classify files, and guards snapshot switches against clobbering files the
//! repository does not know about.

use crate::error::{Result, TwigError};
use crate::index::Index;
use crate::object::Snapshot;
use crate::storage::ObjectStore;
use crate::worktree::WorkTree;
use std::collections::BTreeMap;
use std::fmt;

/// A change on disk that the index does not reflect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Modified,
    Deleted,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Modified => write!(f, "modified"),
            Change::Deleted => write!(f, "deleted"),
        }
    }
}

/// Modifications not staged for commit, keyed by path
pub fn unstaged_changes(
    tree: &dyn WorkTree,
    head: &Snapshot,
    index: &Index,
) -> Result<BTreeMap<String, Change>> {
    let mut changes = BTreeMap::new();

    for path in tree.list_files()? {
        if index.is_staged_for_removal(&path) {
            continue;
        }
        let Some(on_disk) = tree.hash(&path)? else {
            continue;
        };
        let staged = index.staged_add_for(&path);
        let modified = match (head.get(&path), staged) {
            (_, Some(staged)) => staged != on_disk,
            (Some(tracked), None) => *tracked != on_disk,
            (None, None) => false,
        };
        if modified {
            changes.insert(path, Change::Modified);
        }
    }

    for path in index.staged_additions().keys() {
        if !tree.exists(path)? {
            changes.insert(path.clone(), Change::Deleted);
        }
    }
    for path in head.keys() {
        if !index.is_staged_for_removal(path) && !tree.exists(path)? {
            changes.insert(path.clone(), Change::Deleted);
        }
    }
    Ok(changes)
}

/// Files on disk the next commit would not include: not staged for addition
/// and either untracked or staged for removal
pub fn untracked_files(tree: &dyn WorkTree, head: &Snapshot, index: &Index) -> Result<Vec<String>> {
    Ok(tree
        .list_files()?
        .into_iter()
        .filter(|path| {
            index.staged_add_for(path).is_none()
                && (!head.contains_key(path) || index.is_staged_for_removal(path))
        })
        .collect())
}

/// Fail if moving from `head` to `target` would replace an untracked file
/// with different content
pub fn check_overwrite(tree: &dyn WorkTree, head: &Snapshot, target: &Snapshot) -> Result<()> {
    for (path, wanted) in target {
        if head.contains_key(path) {
            continue;
        }
        if let Some(on_disk) = tree.hash(path)? {
            if on_disk != *wanted {
                tracing::debug!(path = path.as_str(), "untracked file would be overwritten");
                return Err(TwigError::WouldOverwriteUntracked { path: path.clone() });
            }
        }
    }
    Ok(())
}

/// What a snapshot switch did to the working tree
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SwitchSummary {
    pub written: Vec<String>,
    pub deleted: Vec<String>,
}

/// Make the working tree match `target`, starting from `head`
///
/// Files tracked by `head` but absent from `target` are deleted; files whose
/// content differs from `target` are rewritten. Untracked files are left
/// alone. Everything that can fail is checked before the first write.
pub fn switch_snapshot<S: ObjectStore + ?Sized>(
    store: &S,
    tree: &mut dyn WorkTree,
    head: &Snapshot,
    target: &Snapshot,
) -> Result<SwitchSummary> {
    check_overwrite(tree, head, target)?;

    let mut pending: Vec<(&String, Vec<u8>)> = Vec::new();
    for (path, wanted) in target {
        if tree.hash(path)? != Some(*wanted) {
            pending.push((path, store.get_blob(*wanted)?));
        }
    }

    let mut summary = SwitchSummary::default();
    for path in head.keys() {
        if !target.contains_key(path) && tree.remove(path)? {
            summary.deleted.push(path.clone());
        }
    }
    for (path, data) in pending {
        tree.write(path, &data)?;
        summary.written.push(path.clone());
    }
    tracing::debug!(
        written = summary.written.len(),
        deleted = summary.deleted.len(),
        "working tree switched"
    );
    Ok(summary)
}

/// Ids for a handful of paths, for building test snapshots
#[cfg(test)]
pub(crate) fn snapshot_of(entries: &[(&str, &str)]) -> Snapshot {
    entries
        .iter()
        .map(|(path, data)| (path.to_string(), crate::object::ObjectId::from_data(data.as_bytes())))
        .collect()
}
