//! Staging index
//!
//! Pending additions and removals applied to the current snapshot to build
//! the next commit. A path is never staged both ways at once.

use crate::error::{Result, TwigError};
use crate::object::{ObjectId, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// What `record_add` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Content differs from the tracked version and is now staged
    Staged,
    /// Content equals the tracked version; any prior stage was dropped
    Unchanged,
}

/// What `record_remove` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Path was only staged for addition; that stage is gone
    Unstaged,
    /// Path is tracked and is now staged for removal
    StagedRemoval,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    staged_add: BTreeMap<String, ObjectId>,
    staged_remove: BTreeMap<String, ObjectId>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index record. It is written by `init`, so absence is corruption.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TwigError::corrupt(format!("missing index at {:?}", path)));
            }
            Err(e) => return Err(e.into()),
        };
        let index: Index = serde_json::from_str(&data)
            .map_err(|e| TwigError::corrupt(format!("unreadable index: {}", e)))?;
        if let Some(dup) = index.staged_add.keys().find(|p| index.staged_remove.contains_key(*p)) {
            return Err(TwigError::corrupt(format!("{} is staged both ways", dup)));
        }
        Ok(index)
    }

    /// Save atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn is_clean(&self) -> bool {
        self.staged_add.is_empty() && self.staged_remove.is_empty()
    }

    pub fn staged_additions(&self) -> &BTreeMap<String, ObjectId> {
        &self.staged_add
    }

    pub fn staged_removals(&self) -> &BTreeMap<String, ObjectId> {
        &self.staged_remove
    }

    pub fn staged_add_for(&self, path: &str) -> Option<ObjectId> {
        self.staged_add.get(path).copied()
    }

    pub fn is_staged_for_removal(&self, path: &str) -> bool {
        self.staged_remove.contains_key(path)
    }

    /// Stage `hash` for `path`, given the id the current commit tracks for it
    pub fn record_add(&mut self, path: &str, hash: ObjectId, tracked: Option<ObjectId>) -> AddOutcome {
        if tracked == Some(hash) {
            self.staged_add.remove(path);
            self.staged_remove.remove(path);
            return AddOutcome::Unchanged;
        }
        self.staged_remove.remove(path);
        self.staged_add.insert(path.to_string(), hash);
        AddOutcome::Staged
    }

    /// Unstage or stage `path` for removal, given the id the current commit tracks
    pub fn record_remove(&mut self, path: &str, tracked: Option<ObjectId>) -> Result<RemoveOutcome> {
        let was_added = self.staged_add.remove(path).is_some();
        match tracked {
            Some(hash) => {
                self.staged_remove.insert(path.to_string(), hash);
                Ok(RemoveOutcome::StagedRemoval)
            }
            None if was_added => Ok(RemoveOutcome::Unstaged),
            None => Err(TwigError::NothingToRemove),
        }
    }

    /// The snapshot the next commit records: removals first, then additions
    pub fn apply_to(&self, snapshot: &Snapshot) -> Snapshot {
        let mut next = snapshot.clone();
        for path in self.staged_remove.keys() {
            next.remove(path);
        }
        for (path, hash) in &self.staged_add {
            next.insert(path.clone(), *hash);
        }
        next
    }

    pub fn clear(&mut self) {
        self.staged_add.clear();
        self.staged_remove.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn id(data: &str) -> ObjectId {
        ObjectId::from_data(data.as_bytes())
    }

    #[test]
    fn test_add_matching_tracked_reverts_prior_stage() {
        let mut index = Index::new();
        assert_eq!(index.record_add("f.txt", id("v2"), Some(id("v1"))), AddOutcome::Staged);
        assert!(!index.is_clean());

        assert_eq!(index.record_add("f.txt", id("v1"), Some(id("v1"))), AddOutcome::Unchanged);
        assert!(index.is_clean());
    }

    #[test]
    fn test_add_clears_pending_removal() {
        let mut index = Index::new();
        index.record_remove("f.txt", Some(id("v1"))).unwrap();
        assert!(index.is_staged_for_removal("f.txt"));

        index.record_add("f.txt", id("v2"), Some(id("v1")));
        assert!(!index.is_staged_for_removal("f.txt"));
        assert_eq!(index.staged_add_for("f.txt"), Some(id("v2")));
    }

    #[test]
    fn test_remove_rules() {
        let mut index = Index::new();
        assert!(matches!(
            index.record_remove("ghost.txt", None),
            Err(TwigError::NothingToRemove)
        ));

        index.record_add("new.txt", id("n"), None);
        assert_eq!(index.record_remove("new.txt", None).unwrap(), RemoveOutcome::Unstaged);
        assert!(index.is_clean());

        index.record_add("old.txt", id("changed"), Some(id("old")));
        assert_eq!(
            index.record_remove("old.txt", Some(id("old"))).unwrap(),
            RemoveOutcome::StagedRemoval
        );
        assert_eq!(index.staged_add_for("old.txt"), None);
        assert_eq!(index.staged_removals().get("old.txt"), Some(&id("old")));
    }

    #[test]
    fn test_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        let mut index = Index::new();
        index.record_add("a.txt", id("a"), None);
        index.record_remove("b.txt", Some(id("b"))).unwrap();
        index.save(&path).unwrap();

        assert_eq!(Index::load(&path).unwrap(), index);
        assert!(!tmp.path().join("index.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let err = Index::load(&tmp.path().join("index.json")).unwrap_err();
        assert!(matches!(err, TwigError::CorruptStore(_)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, 0u8..4).prop_map(|(p, v)| Op::Add(p, v)),
            (0u8..6).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_commit_snapshot_composition(ops in proptest::collection::vec(op(), 0..24)) {
            let current: Snapshot = (0u8..4)
                .map(|p| (format!("f{}", p), id(&format!("base{}", p))))
                .collect();
            let mut index = Index::new();
            for op in ops {
                match op {
                    Op::Add(p, v) => {
                        let path = format!("f{}", p);
                        index.record_add(&path, id(&format!("v{}", v)), current.get(&path).copied());
                    }
                    Op::Remove(p) => {
                        let path = format!("f{}", p);
                        let _ = index.record_remove(&path, current.get(&path).copied());
                    }
                }
                for path in index.staged_additions().keys() {
                    prop_assert!(!index.is_staged_for_removal(path));
                }
            }

            let mut expected = current.clone();
            for path in index.staged_removals().keys() {
                expected.remove(path);
            }
            for (path, hash) in index.staged_additions() {
                expected.insert(path.clone(), *hash);
            }
            prop_assert_eq!(index.apply_to(&current), expected);
        }
    }
}
