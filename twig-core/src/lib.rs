//! Twig Core Library
//!
//! Core functionality for twig, a local version-control engine:
//! - Object model (Blob, Commit) with content-addressed ids
//! - Object storage on disk and in memory
//! - Branch refs, with HEAD derived from the current branch
//! - Staging index
//! - Commit graph traversal and split-point discovery
//! - Three-way merge planning with conflict markers
//! - Working tree reconciliation (status, overwrite guard, snapshot switching)
//! - Repository context exposing every command

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod lock;
pub mod merge;
pub mod object;
pub mod reconcile;
pub mod refs;
pub mod report;
pub mod repository;
pub mod storage;
pub mod worktree;

pub use config::RepoConfig;
pub use error::{ErrorKind, Result, TwigError};
pub use graph::{MergeBase, MergeBaseStrategy};
pub use index::{AddOutcome, Index, RemoveOutcome};
pub use merge::{MergeAction, MergeOutcome, MergePlan};
pub use object::{Commit, ObjectId, ObjectKind, Snapshot};
pub use reconcile::Change;
pub use report::{LogEntry, StatusReport};
pub use repository::Repository;
pub use storage::{DiskStore, MemoryStore, ObjectStore};
pub use worktree::{DiskWorkTree, MemoryWorkTree, WorkTree};
