//! Process-wide in-memory lease store

use super::LeaseStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    owner: String,
    expires_at: Instant,
}

/// Lease store backed by a mutex-guarded map
///
/// Excludes attempts within one process only.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, Entry>>,
}

impl MemoryLeaseStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired lease exists for `key`
    pub fn is_held(&self, key: &str) -> bool {
        self.leases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn try_obtain(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self
            .leases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if leases.get(key).is_some_and(|e| e.expires_at > now) {
            return Ok(false);
        }

        leases.insert(
            key.to_string(),
            Entry {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn cancel(&self, key: &str, owner: &str) -> Result<()> {
        let mut leases = self
            .leases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if leases.get(key).is_some_and(|e| e.owner == owner) {
            leases.remove(key);
        }
        Ok(())
    }
}
