//! Mock collaborators for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use mr_merge::branch_deletion::BranchDeletionQueue;
use mr_merge::error::{Error, RepositoryError, Result};
use mr_merge::policy::AccessPolicy;
use mr_merge::repository::{RepoResult, Repository};
use mr_merge::store::{MemoryStore, MergeRequestStore};
use mr_merge::types::{Actor, BranchDeletionTask, MergeRequest, MergeRequestUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Call record for `merge`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub source_sha: String,
    pub message: String,
    pub actor_id: u64,
}

/// Injected repository failure
#[derive(Debug, Clone)]
pub enum RepoFailure {
    PreReceive(String),
    Conflict(String),
    Git(String),
}

impl RepoFailure {
    fn to_error(&self) -> RepositoryError {
        match self {
            Self::PreReceive(m) => RepositoryError::PreReceiveRejected(m.clone()),
            Self::Conflict(m) => RepositoryError::Conflict(m.clone()),
            Self::Git(m) => RepositoryError::Git(m.clone()),
        }
    }
}

/// Mock repository
///
/// Branch heads are configurable; every branch is considered a descendant
/// of every other unless `set_fast_forward_possible(false)` is called.
pub struct MockRepository {
    heads: Mutex<HashMap<String, String>>,
    fast_forward_possible: AtomicBool,
    panic_on_merge: AtomicBool,
    merge_result: Mutex<String>,
    squash_result: Mutex<String>,
    merge_delay: Mutex<Option<Duration>>,
    // Error injection
    fail_merge: Mutex<Option<RepoFailure>>,
    fail_squash: Mutex<Option<RepoFailure>>,
    // Call tracking
    merge_calls: Mutex<Vec<MergeCall>>,
    fast_forward_calls: Mutex<Vec<String>>,
    squash_calls: Mutex<Vec<u64>>,
    delete_calls: Mutex<Vec<(String, String)>>,
    // Store snapshot taken while the merge runs
    observed_store: Mutex<Option<Arc<dyn MergeRequestStore>>>,
    observed_during_merge: Mutex<Vec<MergeRequest>>,
}

impl MockRepository {
    /// Repository where `feature` is at `abc123` and `main` at `main000`
    pub fn new() -> Self {
        let mut heads = HashMap::new();
        heads.insert("feature".to_string(), "abc123".to_string());
        heads.insert("main".to_string(), "main000".to_string());
        Self {
            heads: Mutex::new(heads),
            fast_forward_possible: AtomicBool::new(true),
            panic_on_merge: AtomicBool::new(false),
            merge_result: Mutex::new("merge_sha_1".to_string()),
            squash_result: Mutex::new("squash_sha_1".to_string()),
            merge_delay: Mutex::new(None),
            fail_merge: Mutex::new(None),
            fail_squash: Mutex::new(None),
            merge_calls: Mutex::new(Vec::new()),
            fast_forward_calls: Mutex::new(Vec::new()),
            squash_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
            observed_store: Mutex::new(None),
            observed_during_merge: Mutex::new(Vec::new()),
        }
    }

    pub fn set_head(&self, branch: &str, sha: &str) {
        self.heads
            .lock()
            .unwrap()
            .insert(branch.to_string(), sha.to_string());
    }

    pub fn remove_branch(&self, branch: &str) {
        self.heads.lock().unwrap().remove(branch);
    }

    pub fn set_fast_forward_possible(&self, possible: bool) {
        self.fast_forward_possible.store(possible, Ordering::SeqCst);
    }

    pub fn set_merge_result(&self, sha: &str) {
        *self.merge_result.lock().unwrap() = sha.to_string();
    }

    pub fn set_merge_delay(&self, delay: Duration) {
        *self.merge_delay.lock().unwrap() = Some(delay);
    }

    /// Make `merge` and `fast_forward` fail
    pub fn fail_merge(&self, failure: RepoFailure) {
        *self.fail_merge.lock().unwrap() = Some(failure);
    }

    /// Make `merge` and `fast_forward` panic, as a crashing backend would
    pub fn panic_on_merge(&self) {
        self.panic_on_merge.store(true, Ordering::SeqCst);
    }

    pub fn stop_panicking(&self) {
        self.panic_on_merge.store(false, Ordering::SeqCst);
    }

    /// Make `squash` fail
    pub fn fail_squash(&self, failure: RepoFailure) {
        *self.fail_squash.lock().unwrap() = Some(failure);
    }

    /// Snapshot merge request records from `store` whenever a merge runs
    pub fn observe_store(&self, store: Arc<dyn MergeRequestStore>) {
        *self.observed_store.lock().unwrap() = Some(store);
    }

    pub fn get_merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    pub fn get_fast_forward_calls(&self) -> Vec<String> {
        self.fast_forward_calls.lock().unwrap().clone()
    }

    pub fn get_squash_calls(&self) -> Vec<u64> {
        self.squash_calls.lock().unwrap().clone()
    }

    pub fn get_delete_calls(&self) -> Vec<(String, String)> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn get_observed_during_merge(&self) -> Vec<MergeRequest> {
        self.observed_during_merge.lock().unwrap().clone()
    }

    /// Number of commit-producing calls (merge + fast-forward)
    pub fn merge_call_count(&self) -> usize {
        self.merge_calls.lock().unwrap().len() + self.fast_forward_calls.lock().unwrap().len()
    }

    async fn before_merge(&self, mr: &MergeRequest) -> RepoResult<()> {
        let store = self.observed_store.lock().unwrap().clone();
        if let Some(store) = store {
            if let Ok(current) = store.read(mr.id).await {
                self.observed_during_merge.lock().unwrap().push(current);
            }
        }

        let delay = *self.merge_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        assert!(
            !self.panic_on_merge.load(Ordering::SeqCst),
            "repository backend crashed"
        );

        if let Some(failure) = self.fail_merge.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn merge(
        &self,
        actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
        message: &str,
    ) -> RepoResult<String> {
        self.merge_calls.lock().unwrap().push(MergeCall {
            source_sha: source_sha.to_string(),
            message: message.to_string(),
            actor_id: actor.id,
        });
        self.before_merge(mr).await?;
        Ok(self.merge_result.lock().unwrap().clone())
    }

    async fn fast_forward(
        &self,
        _actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
    ) -> RepoResult<String> {
        self.fast_forward_calls
            .lock()
            .unwrap()
            .push(source_sha.to_string());
        self.before_merge(mr).await?;
        Ok(source_sha.to_string())
    }

    async fn squash(&self, _actor: &Actor, mr: &MergeRequest, _message: &str) -> RepoResult<String> {
        self.squash_calls.lock().unwrap().push(mr.id);
        if let Some(failure) = self.fail_squash.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        Ok(self.squash_result.lock().unwrap().clone())
    }

    async fn branch_head(&self, branch: &str) -> RepoResult<Option<String>> {
        Ok(self.heads.lock().unwrap().get(branch).cloned())
    }

    async fn is_ancestor(&self, _ancestor: &str, _descendant: &str) -> RepoResult<bool> {
        Ok(self.fast_forward_possible.load(Ordering::SeqCst))
    }

    async fn delete_branch(&self, branch: &str, expected_sha: &str) -> RepoResult<()> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((branch.to_string(), expected_sha.to_string()));
        self.heads.lock().unwrap().remove(branch);
        Ok(())
    }
}

/// Mock access policy with switchable answers
pub struct MockPolicy {
    allow_merge: AtomicBool,
    allow_remove: AtomicBool,
    remove_checks: Mutex<Vec<u64>>,
}

impl MockPolicy {
    /// Policy allowing everything
    pub fn new() -> Self {
        Self {
            allow_merge: AtomicBool::new(true),
            allow_remove: AtomicBool::new(true),
            remove_checks: Mutex::new(Vec::new()),
        }
    }

    pub fn deny_merge(&self) {
        self.allow_merge.store(false, Ordering::SeqCst);
    }

    pub fn deny_remove(&self) {
        self.allow_remove.store(false, Ordering::SeqCst);
    }

    /// User ids `can_remove_source_branch` was asked about
    pub fn get_remove_checks(&self) -> Vec<u64> {
        self.remove_checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessPolicy for MockPolicy {
    async fn can_merge(&self, _actor: &Actor, _mr: &MergeRequest) -> Result<bool> {
        Ok(self.allow_merge.load(Ordering::SeqCst))
    }

    async fn can_remove_source_branch(&self, user_id: u64, _mr: &MergeRequest) -> Result<bool> {
        self.remove_checks.lock().unwrap().push(user_id);
        Ok(self.allow_remove.load(Ordering::SeqCst))
    }
}

/// Store wrapper counting every call
pub struct RecordingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    updates: Mutex<Vec<MergeRequestUpdate>>,
    fail_updates_after: Mutex<Option<usize>>,
}

impl RecordingStore {
    pub fn with_records(records: impl IntoIterator<Item = MergeRequest>) -> Self {
        Self {
            inner: MemoryStore::with_records(records),
            reads: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            fail_updates_after: Mutex::new(None),
        }
    }

    /// Make every update after the first `n` fail
    pub fn fail_updates_after(&self, n: usize) {
        *self.fail_updates_after.lock().unwrap() = Some(n);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn get_updates(&self) -> Vec<MergeRequestUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl MergeRequestStore for RecordingStore {
    async fn read(&self, id: u64) -> Result<MergeRequest> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(id).await
    }

    async fn update(&self, id: u64, update: MergeRequestUpdate) -> Result<MergeRequest> {
        let count = {
            let mut updates = self.updates.lock().unwrap();
            updates.push(update.clone());
            updates.len()
        };
        if let Some(limit) = *self.fail_updates_after.lock().unwrap() {
            if count > limit {
                return Err(Error::Store("injected update failure".to_string()));
            }
        }
        self.inner.update(id, update).await
    }

    async fn insert(&self, mr: MergeRequest) -> Result<()> {
        self.inner.insert(mr).await
    }
}

/// Branch deletion queue recording submitted tasks
pub struct RecordingDeletionQueue {
    tasks: Mutex<Vec<BranchDeletionTask>>,
    fail: AtomicBool,
}

impl RecordingDeletionQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_enqueue(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn get_tasks(&self) -> Vec<BranchDeletionTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BranchDeletionQueue for RecordingDeletionQueue {
    async fn enqueue(&self, task: BranchDeletionTask) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::BranchDeletion("queue unavailable".to_string()));
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}
