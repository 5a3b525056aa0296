//! Merge orchestration
//!
//! Takes the merge lease, then validates, executes and runs post-merge
//! actions. The lease is cancelled whichever way the attempt ends, including
//! when the caller stops waiting or the merge task panics.

use super::execute::{MergeAttempt, execute_merge};
use super::post_merge::PostMergeCoordinator;
use super::validate::{Validation, validate};
use crate::branch_deletion::BranchDeletionQueue;
use crate::error::{Error, GENERIC_ERROR_MESSAGE, Result};
use crate::lease::{DEFAULT_LEASE_TIMEOUT, ExclusiveLease, LeaseStore, merge_lease_key};
use crate::policy::AccessPolicy;
use crate::repository::Repository;
use crate::store::MergeRequestStore;
use crate::types::{
    Actor, ExecutorStrategy, MergeAttemptOptions, MergeOutcome, MergeRequestState,
    MergeRequestUpdate, ProjectSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// External services the merge pipeline talks to
#[derive(Clone)]
pub struct MergeCollaborators {
    /// Merge request persistence
    pub store: Arc<dyn MergeRequestStore>,
    /// Git primitives
    pub repository: Arc<dyn Repository>,
    /// Permission checks
    pub policy: Arc<dyn AccessPolicy>,
    /// Lease backend
    pub leases: Arc<dyn LeaseStore>,
    /// Source branch deletion
    pub branch_deletion: Arc<dyn BranchDeletionQueue>,
}

/// Merges merge requests, one attempt per call
#[derive(Clone)]
pub struct MergeService {
    collaborators: MergeCollaborators,
    settings: ProjectSettings,
    lease_timeout: Duration,
}

impl MergeService {
    /// Create a service with the default lease timeout
    pub fn new(collaborators: MergeCollaborators, settings: ProjectSettings) -> Self {
        Self {
            collaborators,
            settings,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
        }
    }

    /// Override the lease timeout
    #[must_use]
    pub const fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    /// Merge `merge_request_id` as `actor`
    ///
    /// Long-running: the repository step may take seconds. Contention is not
    /// an error and yields [`MergeOutcome::LockUnavailable`] without touching
    /// the merge request.
    ///
    /// The attempt runs on its own task. Dropping the returned future does
    /// not abort a merge in flight; the attempt finishes and releases its
    /// lease in the background.
    pub async fn execute(
        &self,
        merge_request_id: u64,
        options: &MergeAttemptOptions,
        actor: &Actor,
    ) -> Result<MergeOutcome> {
        let service = self.clone();
        let (options, actor) = (options.clone(), actor.clone());
        tokio::spawn(async move { service.attempt(merge_request_id, options, actor).await })
            .await
            .map_err(|e| Error::Internal(format!("merge task failed: {e}")))?
    }

    /// Lease, run the locked body, then release the lease whatever happened
    async fn attempt(
        self,
        merge_request_id: u64,
        options: MergeAttemptOptions,
        actor: Actor,
    ) -> Result<MergeOutcome> {
        let lease = ExclusiveLease::new(
            Arc::clone(&self.collaborators.leases),
            merge_lease_key(merge_request_id),
            self.lease_timeout,
        );

        if !lease.try_obtain().await? {
            info!(merge_request_id, "merge already in progress, skipping");
            return Ok(MergeOutcome::LockUnavailable);
        }

        let body = {
            let service = self.clone();
            tokio::spawn(async move {
                let strategy = ExecutorStrategy::for_project(&service.settings);
                service
                    .execute_locked(merge_request_id, &options, &actor, strategy)
                    .await
            })
        };
        let result = match body.await {
            Ok(result) => result,
            Err(e) => {
                error!(merge_request_id, error = %e, "merge task aborted");
                self.recover_interrupted(merge_request_id).await;
                Err(Error::Internal(format!("merge task failed: {e}")))
            }
        };
        lease.cancel().await;
        result
    }

    /// Put back a record left mid-merge by an aborted attempt
    async fn recover_interrupted(&self, merge_request_id: u64) {
        let store = &self.collaborators.store;
        let mr = match store.read(merge_request_id).await {
            Ok(mr) => mr,
            Err(e) => {
                warn!(merge_request_id, error = %e, "failed to reload interrupted merge request");
                return;
            }
        };

        let mut update = MergeRequestUpdate::default();
        if mr.in_progress_merge_commit_sha.is_some() {
            update.in_progress_merge_commit_sha = Some(None);
        }
        if mr.state == MergeRequestState::Locked {
            update.state = Some(MergeRequestState::Opened);
            update.merge_error = Some(Some(GENERIC_ERROR_MESSAGE.to_string()));
        }
        if update.is_empty() {
            return;
        }
        if let Err(e) = store.update(merge_request_id, update).await {
            warn!(merge_request_id, error = %e, "failed to reset interrupted merge request");
        }
    }

    async fn execute_locked(
        &self,
        merge_request_id: u64,
        options: &MergeAttemptOptions,
        actor: &Actor,
        strategy: ExecutorStrategy,
    ) -> Result<MergeOutcome> {
        let c = &self.collaborators;
        let mr = c.store.read(merge_request_id).await?;
        let reference = mr.to_reference();
        let jid = mr.merge_jid.clone().unwrap_or_else(|| "-".to_string());

        let validation = validate(
            &mr,
            options,
            actor,
            &self.settings,
            c.policy.as_ref(),
            c.repository.as_ref(),
        )
        .await;
        match validation {
            Ok(Validation::Proceed) => {}
            Ok(Validation::AlreadyMerged) => {
                return Ok(MergeOutcome::AlreadyMerged {
                    commit_id: mr.merge_commit_sha,
                });
            }
            Err(Error::Merge(e)) => {
                warn!(merge_request = %reference, error = %e, "merge refused");
                return Err(e.into());
            }
            Err(e) => return Err(e),
        }

        let attempt = MergeAttempt {
            merge_request: mr,
            options,
            actor,
            strategy,
        };
        let commit_id = execute_merge(&attempt, c.store.as_ref(), c.repository.as_ref()).await?;

        info!(merge_request = %reference, jid = %jid, "Post merge started");
        let coordinator = PostMergeCoordinator {
            store: c.store.as_ref(),
            repository: c.repository.as_ref(),
            policy: c.policy.as_ref(),
            branch_deletion: c.branch_deletion.as_ref(),
        };
        let post_merge = coordinator.on_merged(merge_request_id, actor, options).await;
        info!(merge_request = %reference, jid = %jid, "Post merge finished");

        info!(merge_request = %reference, jid = %jid, commit_id = %commit_id, "Merge process finished");
        Ok(MergeOutcome::Merged {
            commit_id,
            post_merge,
        })
    }
}
