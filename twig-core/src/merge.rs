//! Three-way merge planning
//!
//! Each path in the union of the split, current and given snapshots gets one
//! [`MergeAction`]. Planning is pure; `Repository::merge` carries the plan
//! out against the working tree and the index.

use crate::object::{ObjectId, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// What a merge does to one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Leave the current version (or absence) as it is
    Keep,
    /// Check out the given branch's version and stage it
    TakeGiven(ObjectId),
    /// Delete the file and stage its removal
    Remove,
    /// Both sides changed the path differently
    Conflict {
        current: Option<ObjectId>,
        given: Option<ObjectId>,
    },
}

/// Decide a single path from its version at the split point and on each side
pub fn resolve_path(
    split: Option<ObjectId>,
    current: Option<ObjectId>,
    given: Option<ObjectId>,
) -> MergeAction {
    if current == given {
        return MergeAction::Keep;
    }
    if split == current {
        return match given {
            Some(id) => MergeAction::TakeGiven(id),
            None => MergeAction::Remove,
        };
    }
    if split == given {
        return MergeAction::Keep;
    }
    MergeAction::Conflict { current, given }
}

/// Actions for every path a merge touches. Paths left as they are do not
/// appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    actions: BTreeMap<String, MergeAction>,
}

impl MergePlan {
    pub fn actions(&self) -> &BTreeMap<String, MergeAction> {
        &self.actions
    }

    pub fn get(&self, path: &str) -> Option<MergeAction> {
        self.actions.get(path).copied()
    }

    /// Conflicted paths, sorted
    pub fn conflicts(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter(|(_, action)| matches!(action, MergeAction::Conflict { .. }))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Plan a merge of `given` into `current` from their split point
pub fn plan_merge(split: &Snapshot, current: &Snapshot, given: &Snapshot) -> MergePlan {
    let paths: BTreeSet<&String> = split.keys().chain(current.keys()).chain(given.keys()).collect();
    let mut actions = BTreeMap::new();
    for path in paths {
        let action = resolve_path(
            split.get(path).copied(),
            current.get(path).copied(),
            given.get(path).copied(),
        );
        tracing::debug!(path = path.as_str(), ?action, "merge decision");
        if action != MergeAction::Keep {
            actions.insert(path.clone(), action);
        }
    }
    MergePlan { actions }
}

/// File content recording both sides of a conflict
///
/// An absent side renders as nothing. A non-empty side without a final
/// newline gets one so the marker lines stay on lines of their own.
pub fn conflict_markers(current: Option<&[u8]>, given: Option<&[u8]>) -> Vec<u8> {
    fn push_side(out: &mut Vec<u8>, side: Option<&[u8]>) {
        let Some(data) = side else { return };
        out.extend_from_slice(data);
        if !data.is_empty() && !data.ends_with(b"\n") {
            out.push(b'\n');
        }
    }

    let mut out = b"<<<<<<< HEAD\n".to_vec();
    push_side(&mut out, current);
    out.extend_from_slice(b"=======\n");
    push_side(&mut out, given);
    out.extend_from_slice(b">>>>>>>\n");
    out
}

/// How a merge finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The current branch moved to the given commit; no commit was made
    FastForwarded(ObjectId),
    /// The given commit was already in the current history
    AlreadyMerged,
    /// A merge commit was recorded
    Merged {
        commit: ObjectId,
        conflicts: Vec<String>,
    },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(data: &str) -> Option<ObjectId> {
        Some(ObjectId::from_data(data.as_bytes()))
    }

    #[test]
    fn test_resolution_table() {
        let a = id("a");
        let b = id("b");
        let c = id("c");
        let cases = [
            // modified only in given
            (a, a, b, MergeAction::TakeGiven(ObjectId::from_data(b"b"))),
            // modified only in current
            (a, b, a, MergeAction::Keep),
            // modified the same way on both sides
            (a, b, b, MergeAction::Keep),
            // unchanged in current, removed in given
            (a, a, None, MergeAction::Remove),
            // removed in current, unchanged in given
            (a, None, a, MergeAction::Keep),
            // added only in current
            (None, a, None, MergeAction::Keep),
            // added only in given
            (None, None, a, MergeAction::TakeGiven(ObjectId::from_data(b"a"))),
            // removed on both sides
            (a, None, None, MergeAction::Keep),
            // both modified differently
            (a, b, c, MergeAction::Conflict { current: b, given: c }),
            // modified in current, removed in given
            (a, b, None, MergeAction::Conflict { current: b, given: None }),
            // removed in current, modified in given
            (a, None, c, MergeAction::Conflict { current: None, given: c }),
            // added differently on both sides
            (None, b, c, MergeAction::Conflict { current: b, given: c }),
        ];
        for (split, current, given, expected) in cases {
            assert_eq!(
                resolve_path(split, current, given),
                expected,
                "split={:?} current={:?} given={:?}",
                split,
                current,
                given
            );
        }
    }

    #[test]
    fn test_plan_over_union_of_paths() {
        let snap = |entries: &[(&str, &str)]| -> Snapshot {
            entries
                .iter()
                .map(|(p, d)| (p.to_string(), ObjectId::from_data(d.as_bytes())))
                .collect()
        };
        let split = snap(&[("same.txt", "s"), ("theirs.txt", "t1"), ("gone.txt", "g"), ("clash.txt", "A")]);
        let current = snap(&[("same.txt", "s"), ("theirs.txt", "t1"), ("gone.txt", "g"), ("clash.txt", "B"), ("mine.txt", "m")]);
        let given = snap(&[("same.txt", "s"), ("theirs.txt", "t2"), ("clash.txt", "C"), ("new.txt", "n")]);

        let plan = plan_merge(&split, &current, &given);
        assert_eq!(plan.get("same.txt"), None);
        assert_eq!(plan.get("mine.txt"), None);
        assert_eq!(plan.get("theirs.txt"), Some(MergeAction::TakeGiven(ObjectId::from_data(b"t2"))));
        assert_eq!(plan.get("new.txt"), Some(MergeAction::TakeGiven(ObjectId::from_data(b"n"))));
        assert_eq!(plan.get("gone.txt"), Some(MergeAction::Remove));
        assert_eq!(plan.conflicts(), vec!["clash.txt".to_string()]);
        assert_eq!(plan.actions().len(), 4);
    }

    #[test]
    fn test_identical_sides_plan_nothing() {
        let snap: Snapshot = [("f.txt".to_string(), ObjectId::from_data(b"f"))].into();
        assert!(plan_merge(&Snapshot::new(), &snap, &snap).is_empty());
    }

    #[test]
    fn test_conflict_markers() {
        assert_eq!(
            conflict_markers(Some(&b"B\n"[..]), Some(&b"C\n"[..])),
            b"<<<<<<< HEAD\nB\n=======\nC\n>>>>>>>\n".to_vec()
        );
        assert_eq!(
            conflict_markers(Some(&b"B"[..]), Some(&b"C"[..])),
            b"<<<<<<< HEAD\nB\n=======\nC\n>>>>>>>\n".to_vec()
        );
        assert_eq!(
            conflict_markers(Some(&b"B\n"[..]), None),
            b"<<<<<<< HEAD\nB\n=======\n>>>>>>>\n".to_vec()
        );
        assert_eq!(
            conflict_markers(None, Some(&b"C"[..])),
            b"<<<<<<< HEAD\n=======\nC\n>>>>>>>\n".to_vec()
        );
        assert_eq!(
            conflict_markers(Some(&b""[..]), Some(&b"x\n"[..])),
            b"<<<<<<< HEAD\n=======\nx\n>>>>>>>\n".to_vec()
        );
    }

    #[test]
    fn test_outcome_conflicts() {
        let commit = ObjectId::from_data(b"m");
        assert!(!MergeOutcome::AlreadyMerged.has_conflicts());
        assert!(!MergeOutcome::Merged { commit, conflicts: vec![] }.has_conflicts());
        assert!(MergeOutcome::Merged { commit, conflicts: vec!["f".into()] }.has_conflicts());
    }
}
