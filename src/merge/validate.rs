//! Merge preconditions
//!
//! Checks run in a fixed order and stop at the first failure. Nothing here
//! writes to the store or the repository.

use crate::error::{MergeError, Result};
use crate::policy::AccessPolicy;
use crate::repository::Repository;
use crate::types::{Actor, MergeAttemptOptions, MergeRequest, ProjectSettings};
use tracing::debug;

/// Source must be rebased onto the target first
pub const FF_ONLY_MESSAGE: &str =
    "Only fast-forward merge is allowed for your project. Please update your source branch";

/// State or policy forbids merging
pub const NOT_MERGEABLE_MESSAGE: &str = "Merge request is not mergeable";

/// Project requires squash but the merge request does not squash
pub const SQUASH_REQUIRED_MESSAGE: &str =
    "This project requires squashing commits when merge requests are accepted.";

/// Source branch is gone
pub const NO_SOURCE_MESSAGE: &str = "No source for merge";

/// Validation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// All checks passed, go ahead and merge
    Proceed,
    /// Nothing to do, the merge request is already merged
    AlreadyMerged,
}

/// Run all merge preconditions for `actor` merging `mr`
///
/// Refusals come back as [`crate::error::Error::Merge`]; other errors mean
/// a collaborator could not answer.
pub async fn validate(
    mr: &MergeRequest,
    options: &MergeAttemptOptions,
    actor: &Actor,
    settings: &ProjectSettings,
    policy: &dyn AccessPolicy,
    repository: &dyn Repository,
) -> Result<Validation> {
    if !policy.can_merge(actor, mr).await? {
        return Err(MergeError::Unauthorized.into());
    }

    if mr.is_merged() {
        debug!(merge_request = %mr.to_reference(), "already merged");
        return Ok(Validation::AlreadyMerged);
    }

    let Some(source_head) = repository.branch_head(&mr.source_branch).await? else {
        return Err(not_mergeable(NO_SOURCE_MESSAGE));
    };

    if settings.ff_only && !fast_forward_possible(mr, repository).await? {
        return Err(not_mergeable(FF_ONLY_MESSAGE));
    }
    if !mr.is_mergeable(options.skip_discussions_check) {
        return Err(not_mergeable(NOT_MERGEABLE_MESSAGE));
    }
    if settings.squash_always() && !mr.squash {
        return Err(not_mergeable(SQUASH_REQUIRED_MESSAGE));
    }

    let caller_sha_matches = options
        .sha
        .as_deref()
        .is_none_or(|sha| sha == mr.diff_head_sha);
    if !caller_sha_matches || source_head != mr.diff_head_sha {
        debug!(
            merge_request = %mr.to_reference(),
            expected = %mr.diff_head_sha,
            actual = %source_head,
            "source branch moved"
        );
        return Err(MergeError::StaleSource.into());
    }

    Ok(Validation::Proceed)
}

async fn fast_forward_possible(mr: &MergeRequest, repository: &dyn Repository) -> Result<bool> {
    let Some(target_head) = repository.branch_head(&mr.target_branch).await? else {
        return Ok(false);
    };
    Ok(repository
        .is_ancestor(&target_head, &mr.diff_head_sha)
        .await?)
}

fn not_mergeable(message: &str) -> crate::error::Error {
    MergeError::NotMergeable(message.to_string()).into()
}
