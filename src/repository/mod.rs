//! Repository collaborator
//!
//! Provides the git primitives the merge pipeline depends on. The merge and
//! fast-forward operations are the only ones that move the target branch.

mod git;

pub use git::GitRepository;

use crate::error::RepositoryError;
use crate::types::{Actor, MergeRequest};
use async_trait::async_trait;

/// Result type for repository operations
pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// Repository service trait for merge operations
#[async_trait]
pub trait Repository: Send + Sync {
    /// Merge `source_sha` into the merge request's target branch
    ///
    /// Creates a merge commit authored by `actor` and returns its id.
    /// Fails with [`RepositoryError::PreReceiveRejected`] if a hook vetoes
    /// the ref update.
    async fn merge(
        &self,
        actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
        message: &str,
    ) -> RepoResult<String>;

    /// Advance the target branch to `source_sha` without a merge commit
    ///
    /// Returns the new target head.
    async fn fast_forward(
        &self,
        actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
    ) -> RepoResult<String>;

    /// Collapse the merge request's commits into one on top of the merge base
    ///
    /// Returns the squashed commit id; no ref is moved.
    async fn squash(&self, actor: &Actor, mr: &MergeRequest, message: &str) -> RepoResult<String>;

    /// Current head of `branch`, `None` if it does not exist
    async fn branch_head(&self, branch: &str) -> RepoResult<Option<String>>;

    /// Whether `ancestor` is reachable from `descendant`
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> RepoResult<bool>;

    /// Delete `branch` if it still points at `expected_sha`
    async fn delete_branch(&self, branch: &str, expected_sha: &str) -> RepoResult<()>;
}
