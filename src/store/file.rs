//! Persistence for merge requests in `<state_dir>/merge_requests/`.

use super::MergeRequestStore;
use crate::error::{Error, Result};
use crate::types::{MergeRequest, MergeRequestUpdate};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for merge request records within the state dir.
const RECORDS_DIR: &str = "merge_requests";

/// Lock file guarding writes to the records directory.
const LOCK_FILE: &str = ".lock";

/// Store keeping one TOML file per merge request.
///
/// Writes go to a temporary file which is then renamed over the record, so
/// readers see either the old or the new version. Every write holds an
/// exclusive `fs2` lock on the records directory, which serializes
/// read-modify-write cycles and id allocation across processes.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store under `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join(RECORDS_DIR),
        }
    }

    /// Get path to a record file.
    pub fn record_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.toml"))
    }

    /// Next unused id (one past the largest stored id).
    ///
    /// Only a hint outside the write lock; use [`FileStore::create`] to
    /// allocate an id.
    pub fn next_id(&self) -> Result<u64> {
        if !self.dir.exists() {
            return Ok(1);
        }
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::Store(format!("failed to read {}: {e}", self.dir.display())))?;

        let max = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?.strip_suffix(".toml")?.parse::<u64>().ok()
            })
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Allocate the next id and insert the record `build` makes for it.
    pub async fn create<F>(&self, build: F) -> Result<MergeRequest>
    where
        F: FnOnce(u64) -> MergeRequest + Send + 'static,
    {
        self.blocking(move |store| {
            let _lock = store.lock_records()?;
            let mr = build(store.next_id()?);
            store.save(&mr)?;
            Ok(mr)
        })
        .await
    }

    /// Run sync file I/O off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }

    fn lock_records(&self) -> Result<RecordsLock> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Store(format!("failed to create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Store(format!("failed to open {}: {e}", path.display())))?;
        file.lock_exclusive()
            .map_err(|e| Error::Store(format!("failed to lock {}: {e}", path.display())))?;
        Ok(RecordsLock { file })
    }

    fn load(&self, id: u64) -> Result<MergeRequest> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(Error::MergeRequestNotFound(id));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Store(format!("failed to read {}: {e}", path.display())))?;

        toml::from_str(&content)
            .map_err(|e| Error::Store(format!("failed to parse {}: {e}", path.display())))
    }

    fn save(&self, mr: &MergeRequest) -> Result<()> {
        let content = toml::to_string_pretty(mr)
            .map_err(|e| Error::Store(format!("failed to serialize merge request: {e}")))?;
        let content_with_header = format!(
            "# mr-merge merge request {}\n# Auto-generated - manual edits may be overwritten\n\n{content}",
            mr.to_reference()
        );

        let path = self.record_path(mr.id);
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, content_with_header)
            .map_err(|e| Error::Store(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Store(format!("failed to replace {}: {e}", path.display())))?;

        Ok(())
    }
}

/// Held `fs2` lock on the records directory, released on drop.
struct RecordsLock {
    file: File,
}

impl Drop for RecordsLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!(error = %e, "failed to unlock records, closing releases it");
        }
    }
}

#[async_trait]
impl MergeRequestStore for FileStore {
    async fn read(&self, id: u64) -> Result<MergeRequest> {
        self.blocking(move |store| store.load(id)).await
    }

    async fn update(&self, id: u64, update: MergeRequestUpdate) -> Result<MergeRequest> {
        self.blocking(move |store| {
            let _lock = store.lock_records()?;
            let mut mr = store.load(id)?;
            update.apply(&mut mr);
            store.save(&mr)?;
            Ok(mr)
        })
        .await
    }

    async fn insert(&self, mr: MergeRequest) -> Result<()> {
        self.blocking(move |store| {
            let _lock = store.lock_records()?;
            if store.record_path(mr.id).exists() {
                return Err(Error::Store(format!(
                    "merge request {} already exists",
                    mr.id
                )));
            }
            store.save(&mr)
        })
        .await
    }
}
