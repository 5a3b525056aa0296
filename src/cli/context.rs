//! Shared command context for CLI commands
//!
//! Extracts common setup code shared by create, merge, and show.

use mr_merge::config::Config;
use mr_merge::error::{Error, Result};
use mr_merge::lease::FileLeaseStore;
use mr_merge::policy::LocalPolicy;
use mr_merge::repository::GitRepository;
use mr_merge::store::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Directory name for lease files within the state dir
const LEASES_DIR: &str = "leases";

/// Shared context for CLI commands
///
/// Holds the loaded config plus file-backed collaborators rooted at the
/// configured state directory. The branch deletion worker is not part of
/// the context: it needs a running runtime and is spawned by `merge`.
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Git repository
    pub repository: Arc<GitRepository>,
    /// Merge request records
    pub store: Arc<FileStore>,
    /// Merge leases
    pub leases: Arc<FileLeaseStore>,
    /// Access rules
    pub policy: Arc<LocalPolicy>,
}

impl CommandContext {
    /// Create a new command context
    pub fn new(repo: &Path, config_path: Option<&Path>) -> Result<Self> {
        if !repo.is_dir() {
            return Err(Error::Config(format!(
                "repository path does not exist: {}",
                repo.display()
            )));
        }

        let config = Config::load_or_default(config_path)?;
        let policy = LocalPolicy::from_config(&config.access)?;

        Ok(Self {
            repository: Arc::new(GitRepository::new(repo)),
            store: Arc::new(FileStore::new(&config.state_dir)),
            leases: Arc::new(FileLeaseStore::new(config.state_dir.join(LEASES_DIR))),
            policy: Arc::new(policy),
            config,
        })
    }
}
