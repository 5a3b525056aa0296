//! In-memory merge request store

use super::MergeRequestStore;
use crate::error::{Error, Result};
use crate::types::{MergeRequest, MergeRequestUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Store holding records in a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<u64, MergeRequest>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records
    pub fn with_records(records: impl IntoIterator<Item = MergeRequest>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().map(|mr| (mr.id, mr)).collect()),
        }
    }
}

#[async_trait]
impl MergeRequestStore for MemoryStore {
    async fn read(&self, id: u64) -> Result<MergeRequest> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::MergeRequestNotFound(id))
    }

    async fn update(&self, id: u64, update: MergeRequestUpdate) -> Result<MergeRequest> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mr = records.get_mut(&id).ok_or(Error::MergeRequestNotFound(id))?;
        update.apply(mr);
        Ok(mr.clone())
    }

    async fn insert(&self, mr: MergeRequest) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if records.contains_key(&mr.id) {
            return Err(Error::Store(format!("merge request {} already exists", mr.id)));
        }
        records.insert(mr.id, mr);
        Ok(())
    }
}
