//! Merge execution - effectful operations
//!
//! Performs the content merge through the repository and moves the merge
//! request from `locked` to `merged`, or back to `opened` with a recorded
//! error. The in-progress placeholder is cleared on every path.

use crate::error::{Error, GENERIC_ERROR_MESSAGE, MergeError, RepositoryError, Result};
use crate::repository::Repository;
use crate::store::MergeRequestStore;
use crate::types::{
    Actor, ExecutorStrategy, MergeAttemptOptions, MergeRequest, MergeRequestState,
    MergeRequestUpdate,
};
use chrono::Utc;
use tracing::{error, info};

/// Transient context of one merge attempt
#[derive(Debug, Clone)]
pub struct MergeAttempt<'a> {
    /// Merge request as read under the lease
    pub merge_request: MergeRequest,
    /// Caller options
    pub options: &'a MergeAttemptOptions,
    /// User merging
    pub actor: &'a Actor,
    /// How the content merge is performed
    pub strategy: ExecutorStrategy,
}

/// Default merge commit message
pub fn default_commit_message(mr: &MergeRequest) -> String {
    format!(
        "Merge branch '{}' into '{}'\n\n{}\n\nSee merge request {}",
        mr.source_branch,
        mr.target_branch,
        mr.title,
        mr.to_reference()
    )
}

/// Execute the merge (EFFECTFUL)
///
/// # Returns
/// The id of the commit now at the head of the target branch
pub async fn execute_merge(
    attempt: &MergeAttempt<'_>,
    store: &dyn MergeRequestStore,
    repository: &dyn Repository,
) -> Result<String> {
    let mr = &attempt.merge_request;
    let reference = mr.to_reference();

    store
        .update(
            mr.id,
            MergeRequestUpdate {
                state: Some(MergeRequestState::Locked),
                in_progress_merge_commit_sha: Some(Some(mr.diff_head_sha.clone())),
                ..Default::default()
            },
        )
        .await?;
    info!(merge_request = %reference, "Merge request marked in progress");

    let result = commit(attempt, store, repository).await;

    let mut cleanup = MergeRequestUpdate {
        in_progress_merge_commit_sha: Some(None),
        ..Default::default()
    };
    if let Err(ref e) = result {
        let message = match e {
            Error::Merge(merge_error) => merge_error.to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        };
        cleanup.state = Some(MergeRequestState::Opened);
        cleanup.merge_error = Some(Some(message));
    }
    if let Err(e) = store.update(mr.id, cleanup).await {
        error!(merge_request = %reference, error = %e, "failed to clear in-progress merge");
    }

    result
}

async fn commit(
    attempt: &MergeAttempt<'_>,
    store: &dyn MergeRequestStore,
    repository: &dyn Repository,
) -> Result<String> {
    let mr = &attempt.merge_request;
    let reference = mr.to_reference();
    let jid = mr.merge_jid.as_deref().unwrap_or("-");
    info!(merge_request = %reference, jid, strategy = %attempt.strategy, "Git merge started");

    let source = if mr.squash_on_merge() {
        repository
            .squash(attempt.actor, mr, &mr.title)
            .await
            .map_err(|e| merge_failure(mr, e))?
    } else {
        mr.diff_head_sha.clone()
    };

    let merged = match attempt.strategy {
        ExecutorStrategy::Standard => {
            let message = attempt
                .options
                .commit_message
                .clone()
                .unwrap_or_else(|| default_commit_message(mr));
            repository
                .merge(attempt.actor, &source, mr, &message)
                .await
        }
        ExecutorStrategy::FastForwardOnly => {
            repository.fast_forward(attempt.actor, &source, mr).await
        }
    };
    let commit_id = merged.map_err(|e| merge_failure(mr, e))?;
    info!(merge_request = %reference, jid, commit_id = %commit_id, "Git merge finished");

    store
        .update(
            mr.id,
            MergeRequestUpdate {
                state: Some(MergeRequestState::Merged),
                merge_commit_sha: Some(Some(commit_id.clone())),
                squash_commit_sha: mr.squash_on_merge().then(|| Some(source)),
                merge_error: Some(None),
                merged_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await?;

    Ok(commit_id)
}

/// Turn a repository failure into what the user is told
///
/// Hook messages are operator-authored and passed through; everything else
/// is logged in full and reported generically.
fn merge_failure(mr: &MergeRequest, err: RepositoryError) -> Error {
    error!(
        merge_request = %mr.to_reference(),
        merge_status = %mr.merge_status,
        error = %err,
        "MergeService ERROR"
    );
    match err {
        RepositoryError::PreReceiveRejected(message) => MergeError::HookRejected(message).into(),
        _ => MergeError::MergeConflict.into(),
    }
}
