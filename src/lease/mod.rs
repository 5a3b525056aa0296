//! Exclusive leases keyed by resource identity
//!
//! A lease is a time-bounded claim over a key. Obtaining is non-blocking and
//! atomic; a holder that crashes without cancelling only blocks the key until
//! the timeout passes.

mod file;
mod memory;

pub use file::FileLeaseStore;
pub use memory::MemoryLeaseStore;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lease lifetime (15 minutes)
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Key-value store supporting atomic set-if-absent with expiry
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claim `key` for `owner` for `ttl`
    ///
    /// Returns `false` if an unexpired lease for `key` exists.
    async fn try_obtain(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Drop the lease on `key` if `owner` still holds it
    ///
    /// Cancelling a lease that is not held is a no-op.
    async fn cancel(&self, key: &str, owner: &str) -> Result<()>;
}

/// One attempt's claim over a key
pub struct ExclusiveLease {
    store: Arc<dyn LeaseStore>,
    key: String,
    owner: String,
    timeout: Duration,
}

impl ExclusiveLease {
    /// Create a lease handle with a fresh owner id
    pub fn new(store: Arc<dyn LeaseStore>, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            owner: uuid::Uuid::new_v4().to_string(),
            timeout,
        }
    }

    /// Owner id of this handle
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Try to obtain the lease
    pub async fn try_obtain(&self) -> Result<bool> {
        let obtained = self
            .store
            .try_obtain(&self.key, &self.owner, self.timeout)
            .await?;
        debug!(key = %self.key, owner = %self.owner, obtained, "lease obtain");
        Ok(obtained)
    }

    /// Release the lease, logging failures
    ///
    /// Never fails: an uncancelled lease still expires.
    pub async fn cancel(&self) {
        if let Err(e) = self.store.cancel(&self.key, &self.owner).await {
            warn!(key = %self.key, error = %e, "failed to cancel lease, it will expire");
        } else {
            debug!(key = %self.key, owner = %self.owner, "lease cancelled");
        }
    }
}

/// Lease key for merging a merge request
pub fn merge_lease_key(merge_request_id: u64) -> String {
    format!("merge_requests_merge_service:{merge_request_id}")
}
