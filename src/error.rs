//! Error types for mr-merge

use thiserror::Error;

/// User-facing message for merge failures whose details must not be shown
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while merging";

/// Why a merge attempt was refused or failed
///
/// Every variant renders as the message shown to the person who asked for
/// the merge. Internal details (git stderr, IO failures) are logged instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Actor lacks merge permission
    #[error("You are not allowed to merge this merge request")]
    Unauthorized,

    /// Source branch moved since the diff was reviewed
    #[error("Branch has been updated since the merge was requested. Please review the changes.")]
    StaleSource,

    /// A mergeability policy check failed
    #[error("{0}")]
    NotMergeable(String),

    /// Repository-level merge failure (conflicts, git errors)
    #[error("{GENERIC_ERROR_MESSAGE}")]
    MergeConflict,

    /// Pre-receive hook veto, message is operator-authored
    #[error("{0}")]
    HookRejected(String),
}

/// Error from the repository collaborator
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The `pre-receive` hook refused the ref update
    #[error("{0}")]
    PreReceiveRejected(String),

    /// Content merge produced conflicts
    #[error("merge conflict: {0}")]
    Conflict(String),

    /// Git command failed
    #[error("git error: {0}")]
    Git(String),

    /// Spawning git failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in mr-merge
#[derive(Error, Debug)]
pub enum Error {
    /// Merge refused or failed
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Repository collaborator failed outside the merge step
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Merge request not found in the store
    #[error("merge request not found: {0}")]
    MergeRequestNotFound(u64),

    /// Persistence error
    #[error("store error: {0}")]
    Store(String),

    /// Lease store error
    #[error("lease error: {0}")]
    Lease(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Branch deletion queue error
    #[error("branch deletion error: {0}")]
    BranchDeletion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for mr-merge operations
pub type Result<T> = std::result::Result<T, Error>;
