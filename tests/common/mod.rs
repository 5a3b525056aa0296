//! Shared test fixtures

#![allow(dead_code, unused_imports)]

mod mock_services;
mod temp_repo;

pub use mock_services::*;
pub use temp_repo::TempGitRepo;

use mr_merge::lease::MemoryLeaseStore;
use mr_merge::merge::{MergeCollaborators, MergeService};
use mr_merge::types::{
    Actor, MergeParams, MergeRequest, MergeRequestState, MergeStatus, ProjectSettings,
};
use std::sync::Arc;

/// Open, mergeable merge request `id` from `feature` at `abc123` into `main`
pub fn make_mr(id: u64) -> MergeRequest {
    MergeRequest {
        id,
        iid: id,
        project: "group/project".to_string(),
        title: "Add feature".to_string(),
        author_id: 10,
        state: MergeRequestState::Opened,
        merge_status: MergeStatus::CanBeMerged,
        source_branch: "feature".to_string(),
        target_branch: "main".to_string(),
        diff_head_sha: "abc123".to_string(),
        draft: false,
        unresolved_discussions: 0,
        squash: false,
        merge_error: None,
        merge_commit_sha: None,
        in_progress_merge_commit_sha: None,
        squash_commit_sha: None,
        merge_jid: Some("jid-1".to_string()),
        merged_at: None,
        merge_params: MergeParams::default(),
    }
}

/// User merging in tests
pub fn actor() -> Actor {
    Actor {
        id: 20,
        username: "maintainer".to_string(),
        email: "maintainer@example.com".to_string(),
    }
}

/// Merge service wired to mocks, with handles on every collaborator
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub repository: Arc<MockRepository>,
    pub policy: Arc<MockPolicy>,
    pub leases: Arc<MemoryLeaseStore>,
    pub branch_deletion: Arc<RecordingDeletionQueue>,
}

impl Harness {
    pub fn new(records: impl IntoIterator<Item = MergeRequest>) -> Self {
        Self {
            store: Arc::new(RecordingStore::with_records(records)),
            repository: Arc::new(MockRepository::new()),
            policy: Arc::new(MockPolicy::new()),
            leases: Arc::new(MemoryLeaseStore::new()),
            branch_deletion: Arc::new(RecordingDeletionQueue::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<MergeRequest>::new())
    }

    pub fn collaborators(&self) -> MergeCollaborators {
        MergeCollaborators {
            store: self.store.clone(),
            repository: self.repository.clone(),
            policy: self.policy.clone(),
            leases: self.leases.clone(),
            branch_deletion: self.branch_deletion.clone(),
        }
    }

    pub fn service(&self) -> MergeService {
        self.service_with(ProjectSettings::default())
    }

    pub fn service_with(&self, settings: ProjectSettings) -> MergeService {
        MergeService::new(self.collaborators(), settings)
    }
}
