//! Commit graph navigation
//!
//! Ancestry walks over the commit DAG (zero, one or two parents per commit)
//! and split-point discovery for merges.

use crate::error::{Result, TwigError};
use crate::object::{Commit, ObjectId};
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// How the split point is chosen when histories have diverged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeBaseStrategy {
    /// First ancestor of the current tip, in breadth-first order, that the
    /// given tip also reaches
    #[default]
    FirstCommon,
    /// A common ancestor that no other common ancestor descends from,
    /// breadth-first order from the current tip breaking ties
    Lowest,
}

/// Result of split-point discovery between a given tip and the current tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeBase {
    /// The current tip is an ancestor of the given tip
    FastForward,
    /// The given tip is already reachable from the current tip
    AlreadyMerged,
    /// Histories diverged at this commit
    Split(ObjectId),
}

fn load<S: ObjectStore + ?Sized>(store: &S, id: ObjectId) -> Result<Commit> {
    store.get_commit(id).map_err(|e| match e {
        TwigError::NotFound(missing) => {
            TwigError::corrupt(format!("commit {} is referenced but not stored", missing))
        }
        other => other,
    })
}

/// Every commit reachable from `start` through both parent links, in
/// breadth-first discovery order. `start` comes first.
pub fn breadth_first<S: ObjectStore + ?Sized>(store: &S, start: ObjectId) -> Result<Vec<ObjectId>> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for parent in load(store, id)?.parents() {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(order)
}

/// Ancestor closure of `start`, including `start`
pub fn ancestors<S: ObjectStore + ?Sized>(store: &S, start: ObjectId) -> Result<HashSet<ObjectId>> {
    Ok(breadth_first(store, start)?.into_iter().collect())
}

/// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
pub fn is_ancestor<S: ObjectStore + ?Sized>(
    store: &S,
    ancestor: ObjectId,
    descendant: ObjectId,
) -> Result<bool> {
    Ok(ancestor == descendant || ancestors(store, descendant)?.contains(&ancestor))
}

/// Commits along the first-parent chain, newest first
pub fn first_parent_history<S: ObjectStore + ?Sized>(store: &S, start: ObjectId) -> Result<Vec<Commit>> {
    let mut history = Vec::new();
    let mut next = Some(start);
    while let Some(id) = next {
        let commit = load(store, id)?;
        next = commit.parent1();
        history.push(commit);
    }
    Ok(history)
}

/// Find where `given` and `current` diverged
pub fn merge_base<S: ObjectStore + ?Sized>(
    store: &S,
    given: ObjectId,
    current: ObjectId,
    strategy: MergeBaseStrategy,
) -> Result<MergeBase> {
    if given == current {
        return Ok(MergeBase::AlreadyMerged);
    }
    let given_closure = ancestors(store, given)?;
    if given_closure.contains(&current) {
        return Ok(MergeBase::FastForward);
    }
    let current_order = breadth_first(store, current)?;
    if current_order.contains(&given) {
        return Ok(MergeBase::AlreadyMerged);
    }

    let mut common = current_order.into_iter().filter(|id| given_closure.contains(id));
    let split = match strategy {
        MergeBaseStrategy::FirstCommon => common.next(),
        MergeBaseStrategy::Lowest => {
            let common: Vec<ObjectId> = common.collect();
            let mut dominated = HashSet::new();
            for id in &common {
                if dominated.contains(id) {
                    continue;
                }
                for ancestor in breadth_first(store, *id)?.into_iter().skip(1) {
                    dominated.insert(ancestor);
                }
            }
            common.into_iter().find(|id| !dominated.contains(id))
        }
    };
    tracing::debug!(%given, %current, ?strategy, ?split, "split point search");
    split
        .map(MergeBase::Split)
        .ok_or_else(|| TwigError::corrupt(format!("{} and {} share no history", given, current)))
}
