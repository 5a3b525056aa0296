//! Directory-backed lease store shared between processes.

use super::LeaseStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct LeaseRecord {
    owner: String,
    expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Lease store keeping one record file per key.
///
/// Every read-check-write of `<key>.lease` happens while holding an
/// exclusive `fs2` lock on `<key>.lock`, so obtain and cancel are atomic
/// across threads and processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FileLeaseStore {
    dir: PathBuf,
}

impl FileLeaseStore {
    /// Create a store rooted at `dir` (created on first use).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn lease_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lease", file_stem(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", file_stem(key)))
    }

    fn obtain_blocking(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::Lease(format!("invalid lease timeout: {e}")))?;
        let _lock = self.lock_key(key)?;

        let path = self.lease_path(key);
        let now = Utc::now();
        if let Some(current) = read_record(&path)? {
            if !current.is_expired(now) {
                return Ok(false);
            }
            debug!(key, stale_owner = %current.owner, "taking over expired lease");
        }

        write_record(
            &path,
            &LeaseRecord {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        )?;
        Ok(true)
    }

    fn cancel_blocking(&self, key: &str, owner: &str) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        let _lock = self.lock_key(key)?;

        let path = self.lease_path(key);
        match read_record(&path)? {
            Some(record) if record.owner == owner => match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(&path, &e)),
            },
            _ => Ok(()),
        }
    }

    /// Block until this process holds the key's lock file.
    fn lock_key(&self, key: &str) -> Result<KeyLock> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, &e))?;
        let path = self.lock_path(key);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_error(&path, &e))?;
        file.lock_exclusive().map_err(|e| io_error(&path, &e))?;
        Ok(KeyLock { file })
    }
}

/// Held `fs2` lock, released on drop.
struct KeyLock {
    file: File,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!(error = %e, "failed to unlock lease key, closing releases it");
        }
    }
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    async fn try_obtain(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let store = self.clone();
        let (key, owner) = (key.to_string(), owner.to_string());
        tokio::task::spawn_blocking(move || store.obtain_blocking(&key, &owner, ttl))
            .await
            .map_err(|e| Error::Lease(format!("lease task failed: {e}")))?
    }

    async fn cancel(&self, key: &str, owner: &str) -> Result<()> {
        let store = self.clone();
        let (key, owner) = (key.to_string(), owner.to_string());
        tokio::task::spawn_blocking(move || store.cancel_blocking(&key, &owner))
            .await
            .map_err(|e| Error::Lease(format!("lease task failed: {e}")))?
    }
}

fn read_record(path: &Path) -> Result<Option<LeaseRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, &e)),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Lease(format!("failed to parse {}: {e}", path.display())))
}

/// Replace the record through a temp file so readers never see it half written.
fn write_record(path: &Path, record: &LeaseRecord) -> Result<()> {
    let content = toml::to_string(record)
        .map_err(|e| Error::Lease(format!("failed to serialize lease: {e}")))?;
    let tmp = path.with_extension("lease.tmp");
    fs::write(&tmp, content).map_err(|e| io_error(&tmp, &e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, &e))
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn io_error(path: &Path, e: &std::io::Error) -> Error {
    Error::Lease(format!("{}: {e}", path.display()))
}
