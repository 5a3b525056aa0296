//! Asynchronous source branch deletion
//!
//! The merge pipeline only submits tasks; deletion happens on a background
//! task and its failures never reach the merge.

use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::types::BranchDeletionTask;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Pending deletions buffered before `enqueue` waits
const QUEUE_CAPACITY: usize = 64;

/// Branch-deletion collaborator
#[async_trait]
pub trait BranchDeletionQueue: Send + Sync {
    /// Submit a deletion; returns once the task is queued
    async fn enqueue(&self, task: BranchDeletionTask) -> Result<()>;
}

/// Background worker deleting branches through a [`Repository`]
pub struct BranchDeletionWorker {
    sender: Mutex<Option<mpsc::Sender<BranchDeletionTask>>>,
    handle: Mutex<Option<JoinHandle<usize>>>,
}

impl BranchDeletionWorker {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(repository: Arc<dyn Repository>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<BranchDeletionTask>(QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut deleted = 0;
            while let Some(task) = receiver.recv().await {
                match repository
                    .delete_branch(&task.source_branch, &task.source_sha)
                    .await
                {
                    Ok(()) => {
                        deleted += 1;
                        info!(
                            merge_request_id = task.merge_request_id,
                            branch = %task.source_branch,
                            actor_id = task.actor_id,
                            "source branch deleted"
                        );
                    }
                    Err(e) => warn!(
                        merge_request_id = task.merge_request_id,
                        branch = %task.source_branch,
                        error = %e,
                        "source branch deletion failed"
                    ),
                }
            }
            deleted
        });

        Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop accepting tasks, drain the queue and return how many branches
    /// were deleted
    pub async fn shutdown(&self) -> Result<usize> {
        self.sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| Error::BranchDeletion(format!("worker panicked: {e}"))),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl BranchDeletionQueue for BranchDeletionWorker {
    async fn enqueue(&self, task: BranchDeletionTask) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::BranchDeletion("worker is shut down".to_string()))?;
        sender
            .send(task)
            .await
            .map_err(|_| Error::BranchDeletion("worker stopped".to_string()))
    }
}
