//! Post-merge coordination
//!
//! Runs after the merge commit is persisted. Nothing here can fail the
//! merge: errors are logged and reflected in the returned report only.

use crate::branch_deletion::BranchDeletionQueue;
use crate::error::Result;
use crate::policy::AccessPolicy;
use crate::repository::Repository;
use crate::store::MergeRequestStore;
use crate::types::{
    Actor, BranchDeletionTask, MergeAttemptOptions, MergeRequest, MergeRequestUpdate,
    PostMergeReport,
};
use tracing::{info, warn};

/// Triggers the actions that follow a successful merge
pub struct PostMergeCoordinator<'a> {
    /// Persistence collaborator
    pub store: &'a dyn MergeRequestStore,
    /// Repository collaborator
    pub repository: &'a dyn Repository,
    /// Permission collaborator
    pub policy: &'a dyn AccessPolicy,
    /// Branch-deletion collaborator
    pub branch_deletion: &'a dyn BranchDeletionQueue,
}

impl PostMergeCoordinator<'_> {
    /// Schedule source branch removal and persist the removal preference
    pub async fn on_merged(
        &self,
        merge_request_id: u64,
        actor: &Actor,
        options: &MergeAttemptOptions,
    ) -> PostMergeReport {
        let mut report = PostMergeReport::default();

        let mr = match self.store.read(merge_request_id).await {
            Ok(mr) => mr,
            Err(e) => {
                warn!(merge_request_id, error = %e, "post merge: failed to reload merge request");
                return report;
            }
        };
        let reference = mr.to_reference();

        let deletion_user = if mr.merge_params.force_remove_source_branch {
            mr.author_id
        } else {
            actor.id
        };
        let removal_requested = options
            .should_remove_source_branch
            .unwrap_or(mr.merge_params.force_remove_source_branch);

        let removable = match self.can_remove_source_branch(deletion_user, &mr).await {
            Ok(removable) => removable,
            Err(e) => {
                warn!(merge_request = %reference, error = %e, "post merge: removal check failed");
                false
            }
        };

        if removal_requested && removable {
            let task = BranchDeletionTask {
                merge_request_id: mr.id,
                source_branch: mr.source_branch.clone(),
                source_sha: mr.diff_head_sha.clone(),
                actor_id: deletion_user,
            };
            match self.branch_deletion.enqueue(task).await {
                Ok(()) => {
                    report.branch_deletion_scheduled = true;
                    info!(merge_request = %reference, branch = %mr.source_branch, "source branch deletion scheduled");
                }
                Err(e) => {
                    warn!(merge_request = %reference, error = %e, "post merge: failed to schedule branch deletion");
                }
            }
        }

        if removable && options.should_remove_source_branch.is_some() {
            let update = MergeRequestUpdate {
                should_remove_source_branch: Some(options.should_remove_source_branch),
                ..Default::default()
            };
            match self.store.update(mr.id, update).await {
                Ok(_) => report.merge_params_saved = true,
                Err(e) => {
                    warn!(merge_request = %reference, error = %e, "post merge: failed to save merge params");
                }
            }
        }

        let clear_jid = MergeRequestUpdate {
            merge_jid: Some(None),
            ..Default::default()
        };
        if let Err(e) = self.store.update(mr.id, clear_jid).await {
            warn!(merge_request = %reference, error = %e, "post merge: failed to clear merge jid");
        }

        report
    }

    /// Policy allows it and the branch still points at the merged commit
    async fn can_remove_source_branch(&self, user_id: u64, mr: &MergeRequest) -> Result<bool> {
        if !self.policy.can_remove_source_branch(user_id, mr).await? {
            return Ok(false);
        }
        let head = self.repository.branch_head(&mr.source_branch).await?;
        Ok(head.as_deref() == Some(mr.diff_head_sha.as_str()))
    }
}
