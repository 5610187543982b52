//! Error taxonomy for twig
//!
//! Every variant's `Display` text is the exact message shown to the user.
//! The CLI maps [`ErrorKind`] to a process exit code.

use crate::object::ObjectId;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, TwigError>;

/// Broad classification used by callers to decide how to report a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Business-rule violation; the operation aborted without mutating anything
    User,
    /// An object, commit or short id could not be resolved
    NotFound,
    /// Persisted state is missing or unreadable where it must exist
    Corrupt,
    /// Underlying filesystem failure
    Io,
}

/// Errors that can occur during repository operations
#[derive(Debug, thiserror::Error)]
pub enum TwigError {
    #[error("A twig version-control system already exists in the current directory.")]
    AlreadyInitialized,

    #[error("Not in an initialized twig directory.")]
    NotInitialized,

    #[error("File does not exist.")]
    FileNotFound,

    #[error("No changes added to the commit.")]
    NothingToCommit,

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No reason to remove the file.")]
    NothingToRemove,

    #[error("Found no commit with that message.")]
    NoCommitWithMessage,

    #[error("No commit with that id exists.")]
    NoSuchCommit,

    #[error("Commit id prefix {0} is ambiguous.")]
    AmbiguousCommitId(String),

    #[error("File does not exist in that commit.")]
    FileNotInCommit,

    #[error("No such branch exists.")]
    NoSuchBranch,

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch,

    #[error("A branch with that name already exists.")]
    BranchExists,

    #[error("A branch with that name does not exist.")]
    UnknownBranch,

    #[error("Cannot remove the current branch.")]
    RemoveCurrentBranch,

    #[error("You have uncommitted changes.")]
    DirtyIndex,

    #[error("Cannot merge a branch with itself.")]
    SelfMerge,

    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    WouldOverwriteUntracked { path: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("Repository is locked by another twig process.")]
    Locked,

    #[error("Object {0} not found")]
    NotFound(ObjectId),

    #[error("Corrupt repository: {0}")]
    CorruptStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TwigError {
    /// Classify this error for reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            TwigError::NotFound(_) | TwigError::NoSuchCommit | TwigError::FileNotInCommit => {
                ErrorKind::NotFound
            }
            TwigError::CorruptStore(_) | TwigError::Serialization(_) => ErrorKind::Corrupt,
            TwigError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::User,
        }
    }

    /// Whether the failure should be reported as an ordinary user-facing message
    pub fn is_user_facing(&self) -> bool {
        matches!(self.kind(), ErrorKind::User | ErrorKind::NotFound)
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        TwigError::CorruptStore(msg.into())
    }
}

impl From<bincode::Error> for TwigError {
    fn from(e: bincode::Error) -> Self {
        TwigError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for TwigError {
    fn from(e: serde_json::Error) -> Self {
        TwigError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_verbatim() {
        assert_eq!(
            TwigError::WouldOverwriteUntracked { path: "u.txt".into() }.to_string(),
            "There is an untracked file in the way; delete it, or add and commit it first."
        );
        assert_eq!(TwigError::NothingToCommit.to_string(), "No changes added to the commit.");
        assert_eq!(TwigError::SelfMerge.to_string(), "Cannot merge a branch with itself.");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(TwigError::DirtyIndex.kind(), ErrorKind::User);
        assert_eq!(TwigError::NoSuchCommit.kind(), ErrorKind::NotFound);
        assert_eq!(TwigError::corrupt("missing ref").kind(), ErrorKind::Corrupt);
        assert!(!TwigError::corrupt("x").is_user_facing());
        assert!(TwigError::UnknownBranch.is_user_facing());
    }
}
