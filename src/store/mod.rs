//! Merge request persistence
//!
//! The pipeline reads merge requests and writes them back through
//! [`MergeRequestStore::update`], which applies all fields of one
//! [`MergeRequestUpdate`] together.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{MergeRequest, MergeRequestUpdate};
use async_trait::async_trait;

/// Persistence collaborator for merge requests
#[async_trait]
pub trait MergeRequestStore: Send + Sync {
    /// Read the current record
    async fn read(&self, id: u64) -> Result<MergeRequest>;

    /// Apply an update atomically and return the new record
    async fn update(&self, id: u64, update: MergeRequestUpdate) -> Result<MergeRequest>;

    /// Insert a new record; fails if its id is already taken
    async fn insert(&self, mr: MergeRequest) -> Result<()>;
}
