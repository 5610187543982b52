//! Repository operations
//!
//! A [`Repository`] is built once per command, from `init` or `open`. It owns
//! the object store, refs, staging index, working tree, config and the
//! repository lock, and exposes every command as a method. User errors are
//! raised before the first mutation; the index is persisted at the end of
//! each mutating operation.
//!
//! Layout on disk:
//! ```text
//! {root}/.twig/
//!   objects/{hash[0..2]}/{hash[2..]}  — kind-tagged blobs and commits
//!   refs/heads/{branch}               — commit id (hex)
//!   current-branch                    — checked-out branch name
//!   index.json                        — staging index
//!   config.json                       — repository config
//!   lock                              — advisory lock
//! ```

use crate::config::RepoConfig;
use crate::error::{Result, TwigError};
use crate::graph::{self, MergeBase};
use crate::index::{AddOutcome, Index, RemoveOutcome};
use crate::lock::RepoLock;
use crate::merge::{self, MergeAction, MergeOutcome};
use crate::object::{Commit, ObjectId};
use crate::reconcile;
use crate::refs::{self, RefStore};
use crate::report::StatusReport;
use crate::storage::{DiskStore, ObjectStore};
use crate::worktree::{normalize_path, DiskWorkTree, WorkTree, REPO_DIR};
use std::fs;
use std::path::{Path, PathBuf};

const OBJECTS_DIR: &str = "objects";
const INDEX_FILE: &str = "index.json";

pub struct Repository {
    repo_dir: PathBuf,
    config: RepoConfig,
    store: DiskStore,
    refs: RefStore,
    index: Index,
    tree: DiskWorkTree,
    _lock: RepoLock,
}

impl Repository {
    /// Create a repository in `root` with the default config
    pub fn init(root: &Path) -> Result<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Create a repository in `root`: the root commit, one branch pointing
    /// at it, an empty index and the config file
    pub fn init_with_config(root: &Path, config: RepoConfig) -> Result<Self> {
        refs::validate_branch_name(&config.default_branch)?;
        let repo_dir = root.join(REPO_DIR);
        if repo_dir.exists() {
            return Err(TwigError::AlreadyInitialized);
        }
        fs::create_dir_all(&repo_dir)?;
        let lock = RepoLock::acquire(&repo_dir)?;

        config.save(&repo_dir)?;
        let store = DiskStore::open(&repo_dir.join(OBJECTS_DIR), config.commit_cache_size)?;
        let root_commit = Commit::root()?;
        store.put_commit(&root_commit)?;

        let refs = RefStore::new(&repo_dir);
        refs.initialize(&config.default_branch, root_commit.id())?;
        let index = Index::new();
        index.save(&repo_dir.join(INDEX_FILE))?;

        tracing::info!(
            "Initialized repository at {:?} on branch {}",
            repo_dir,
            config.default_branch
        );
        Ok(Self {
            tree: DiskWorkTree::new(root),
            repo_dir,
            config,
            store,
            refs,
            index,
            _lock: lock,
        })
    }

    /// Open the repository whose working tree is `root`
    pub fn open(root: &Path) -> Result<Self> {
        let repo_dir = root.join(REPO_DIR);
        if !repo_dir.is_dir() {
            return Err(TwigError::NotInitialized);
        }
        let lock = RepoLock::acquire(&repo_dir)?;
        let config = RepoConfig::load(&repo_dir)?;
        let store = DiskStore::open(&repo_dir.join(OBJECTS_DIR), config.commit_cache_size)?;
        let refs = RefStore::new(&repo_dir);
        let index = Index::load(&repo_dir.join(INDEX_FILE))?;
        tracing::debug!("opened repository at {:?}", repo_dir);

        Ok(Self {
            tree: DiskWorkTree::new(root),
            repo_dir,
            config,
            store,
            refs,
            index,
            _lock: lock,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn current_branch(&self) -> Result<String> {
        self.refs.current_branch()
    }

    pub fn branches(&self) -> Result<Vec<String>> {
        self.refs.list()
    }

    /// Commit a branch points at, `None` if there is no such branch
    pub fn branch_head(&self, name: &str) -> Result<Option<ObjectId>> {
        self.refs.read(name)
    }

    pub fn head_id(&self) -> Result<ObjectId> {
        self.refs.head()
    }

    pub fn head_commit(&self) -> Result<Commit> {
        let id = self.head_id()?;
        self.load_commit(id)
    }

    fn load_commit(&self, id: ObjectId) -> Result<Commit> {
        self.store.get_commit(id).map_err(|e| match e {
            TwigError::NotFound(missing) => {
                TwigError::corrupt(format!("commit {} is referenced but not stored", missing))
            }
            other => other,
        })
    }

    fn save_index(&self) -> Result<()> {
        self.index.save(&self.repo_dir.join(INDEX_FILE))
    }

    /// Stage the working-tree content of `path`
    pub fn add(&mut self, path: &str) -> Result<AddOutcome> {
        let path = normalize_path(path)?;
        let data = self.tree.read(&path)?.ok_or(TwigError::FileNotFound)?;
        let tracked = self.head_commit()?.blob_for(&path);

        let hash = ObjectId::from_data(&data);
        if tracked != Some(hash) {
            self.store.put_blob(&data)?;
        }
        let outcome = self.index.record_add(&path, hash, tracked);
        self.save_index()?;
        tracing::debug!(path = path.as_str(), ?outcome, "add");
        Ok(outcome)
    }

    /// Record the staged changes as a new commit on the current branch
    pub fn commit(&mut self, message: &str) -> Result<ObjectId> {
        if self.index.is_clean() {
            return Err(TwigError::NothingToCommit);
        }
        if message.trim().is_empty() {
            return Err(TwigError::EmptyMessage);
        }
        let head = self.head_commit()?;
        let snapshot = self.index.apply_to(head.snapshot());
        let commit = Commit::now(message.to_string(), head.id(), None, snapshot)?;
        self.record_commit(&commit)?;
        Ok(commit.id())
    }

    fn record_commit(&mut self, commit: &Commit) -> Result<()> {
        self.store.put_commit(commit)?;
        self.refs.advance_head(commit.id())?;
        self.index.clear();
        self.save_index()?;
        tracing::info!(
            "Committed {} ({} files): {}",
            commit.id().short(),
            commit.snapshot().len(),
            commit.message()
        );
        Ok(())
    }

    /// Unstage `path`, or stage its removal and delete it if it is tracked
    pub fn rm(&mut self, path: &str) -> Result<RemoveOutcome> {
        let path = normalize_path(path)?;
        let tracked = self.head_commit()?.blob_for(&path);
        let outcome = self.index.record_remove(&path, tracked)?;
        if outcome == RemoveOutcome::StagedRemoval {
            self.tree.remove(&path)?;
        }
        self.save_index()?;
        tracing::debug!(path = path.as_str(), ?outcome, "rm");
        Ok(outcome)
    }

    /// First-parent history of the current commit, newest first
    pub fn log(&self) -> Result<Vec<Commit>> {
        graph::first_parent_history(&self.store, self.head_id()?)
    }

    /// Every stored commit, ordered by id
    pub fn global_log(&self) -> Result<Vec<Commit>> {
        self.store
            .list_commits()?
            .into_iter()
            .map(|id| self.store.get_commit(id))
            .collect()
    }

    /// Ids of all commits whose message is exactly `message`
    pub fn find(&self, message: &str) -> Result<Vec<ObjectId>> {
        let found: Vec<ObjectId> = self
            .global_log()?
            .into_iter()
            .filter(|commit| commit.message() == message)
            .map(|commit| commit.id())
            .collect();
        if found.is_empty() {
            return Err(TwigError::NoCommitWithMessage);
        }
        Ok(found)
    }

    pub fn status(&self) -> Result<StatusReport> {
        let head = self.head_commit()?;
        Ok(StatusReport {
            branches: self.refs.list()?,
            current_branch: self.refs.current_branch()?,
            staged: self.index.staged_additions().keys().cloned().collect(),
            removed: self.index.staged_removals().keys().cloned().collect(),
            unstaged: reconcile::unstaged_changes(&self.tree, head.snapshot(), &self.index)?,
            untracked: reconcile::untracked_files(&self.tree, head.snapshot(), &self.index)?,
        })
    }

    /// Restore `path` from the current commit. The index is untouched.
    pub fn checkout_file(&mut self, path: &str) -> Result<()> {
        let head = self.head_id()?;
        self.restore_file(head, path)
    }

    /// Restore `path` from the commit `prefix` names
    pub fn checkout_file_at(&mut self, prefix: &str, path: &str) -> Result<()> {
        let id = self.store.resolve_short_id(prefix)?;
        self.restore_file(id, path)
    }

    fn restore_file(&mut self, commit_id: ObjectId, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let commit = self.load_commit(commit_id)?;
        let blob = commit.blob_for(&path).ok_or(TwigError::FileNotInCommit)?;
        let data = self.store.get_blob(blob)?;
        self.tree.write(&path, &data)?;
        tracing::debug!(path = path.as_str(), commit = %commit_id.short(), "restored file");
        Ok(())
    }

    /// Switch to another branch, replacing the working tree with its snapshot
    pub fn checkout_branch(&mut self, name: &str) -> Result<()> {
        let target_id = self.refs.read(name)?.ok_or(TwigError::NoSuchBranch)?;
        let current = self.refs.current_branch()?;
        if name == current {
            return Err(TwigError::AlreadyOnBranch);
        }
        let target = self.load_commit(target_id)?;
        self.switch_to(&target)?;
        self.refs.set_current_branch(name)?;
        self.index.clear();
        self.save_index()?;
        tracing::info!("Switched from {} to {}", current, name);
        Ok(())
    }

    /// Create a branch at the current commit
    pub fn branch(&mut self, name: &str) -> Result<()> {
        refs::validate_branch_name(name)?;
        if self.refs.exists(name) {
            return Err(TwigError::BranchExists);
        }
        let head = self.head_id()?;
        self.refs.write(name, head)?;
        tracing::info!("Created branch {} at {}", name, head.short());
        Ok(())
    }

    /// Delete a branch pointer; its commits stay in the store
    pub fn rm_branch(&mut self, name: &str) -> Result<()> {
        if name == self.refs.current_branch()? {
            return Err(TwigError::RemoveCurrentBranch);
        }
        if !self.refs.delete(name)? {
            return Err(TwigError::UnknownBranch);
        }
        tracing::info!("Removed branch {}", name);
        Ok(())
    }

    /// Move the current branch to the commit `prefix` names and check it out
    pub fn reset(&mut self, prefix: &str) -> Result<ObjectId> {
        let id = self.store.resolve_short_id(prefix)?;
        let target = self.load_commit(id)?;
        self.switch_to(&target)?;
        self.refs.advance_head(id)?;
        self.index.clear();
        self.save_index()?;
        tracing::info!("Reset {} to {}", self.refs.current_branch()?, id.short());
        Ok(id)
    }

    fn switch_to(&mut self, target: &Commit) -> Result<()> {
        let head = self.head_commit()?;
        reconcile::switch_snapshot(&self.store, &mut self.tree, head.snapshot(), target.snapshot())?;
        Ok(())
    }

    /// Merge the branch `name` into the current branch
    pub fn merge(&mut self, name: &str) -> Result<MergeOutcome> {
        if !self.index.is_clean() {
            return Err(TwigError::DirtyIndex);
        }
        let given_id = self.refs.read(name)?.ok_or(TwigError::UnknownBranch)?;
        let current_branch = self.refs.current_branch()?;
        if name == current_branch {
            return Err(TwigError::SelfMerge);
        }
        let current = self.head_commit()?;
        let given = self.load_commit(given_id)?;
        reconcile::check_overwrite(&self.tree, current.snapshot(), given.snapshot())?;

        let split = match graph::merge_base(&self.store, given_id, current.id(), self.config.merge_base)? {
            MergeBase::AlreadyMerged => {
                tracing::info!("{} is already merged into {}", name, current_branch);
                return Ok(MergeOutcome::AlreadyMerged);
            }
            MergeBase::FastForward => {
                self.switch_to(&given)?;
                self.refs.advance_head(given_id)?;
                self.index.clear();
                self.save_index()?;
                tracing::info!("Fast-forwarded {} to {}", current_branch, given_id.short());
                return Ok(MergeOutcome::FastForwarded(given_id));
            }
            MergeBase::Split(split_id) => self.load_commit(split_id)?,
        };
        tracing::debug!("merging {} into {} from split {}", name, current_branch, split.id().short());

        let plan = merge::plan_merge(split.snapshot(), current.snapshot(), given.snapshot());

        // Read every blob the plan needs before touching the working tree
        let mut writes = Vec::new();
        for (path, action) in plan.actions() {
            match *action {
                MergeAction::TakeGiven(id) => {
                    writes.push((path, *action, self.store.get_blob(id)?));
                }
                MergeAction::Conflict { current: ours, given: theirs } => {
                    let ours = ours.map(|id| self.store.get_blob(id)).transpose()?;
                    let theirs = theirs.map(|id| self.store.get_blob(id)).transpose()?;
                    let content = merge::conflict_markers(ours.as_deref(), theirs.as_deref());
                    writes.push((path, *action, content));
                }
                MergeAction::Remove => writes.push((path, *action, Vec::new())),
                MergeAction::Keep => {}
            }
        }

        let mut applied = Vec::new();
        if let Err(e) = self.apply_merge_writes(&current, writes, &mut applied) {
            tracing::warn!(?applied, "merge stopped after updating {} file(s): {}", applied.len(), e);
            self.save_index()?;
            return Err(e);
        }
        if self.index.is_clean() {
            return Err(TwigError::NothingToCommit);
        }

        let message = format!("Merged {} into {}.", name, current_branch);
        let snapshot = self.index.apply_to(current.snapshot());
        let commit = Commit::now(message, current.id(), Some(given_id), snapshot)?;
        self.record_commit(&commit)?;

        let conflicts = plan.conflicts();
        if !conflicts.is_empty() {
            tracing::warn!("merge left {} conflicted file(s)", conflicts.len());
        }
        Ok(MergeOutcome::Merged {
            commit: commit.id(),
            conflicts,
        })
    }

    /// Write planned merge results to the tree and stage them, recording
    /// each path in `applied` once its file is updated
    fn apply_merge_writes<'p>(
        &mut self,
        current: &Commit,
        writes: Vec<(&'p String, MergeAction, Vec<u8>)>,
        applied: &mut Vec<&'p str>,
    ) -> Result<()> {
        for (path, action, data) in writes {
            let tracked = current.blob_for(path);
            match action {
                MergeAction::Remove => {
                    self.tree.remove(path)?;
                    self.index.record_remove(path, tracked)?;
                }
                MergeAction::TakeGiven(id) => {
                    self.tree.write(path, &data)?;
                    self.index.record_add(path, id, tracked);
                }
                MergeAction::Conflict { .. } => {
                    let id = self.store.put_blob(&data)?;
                    self.tree.write(path, &data)?;
                    self.index.record_add(path, id, tracked);
                }
                MergeAction::Keep => continue,
            }
            applied.push(path.as_str());
        }
        Ok(())
    }
}
