//! Configuration loaded from `config.toml`

use crate::error::{Error, Result};
use crate::types::{Actor, ProjectSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "mr-merge";

/// Config file name
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where merge requests and leases are stored
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Merge lease lifetime in seconds
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Project merge settings
    #[serde(default)]
    pub project: ProjectSettings,

    /// Access rules
    #[serde(default)]
    pub access: AccessConfig,

    /// Known users (`[[users]]` tables)
    #[serde(default)]
    pub users: Vec<Actor>,
}

/// `[access]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Usernames allowed to merge (empty = everyone)
    #[serde(default)]
    pub allowed_mergers: Vec<String>,

    /// Branch patterns that are never deleted after merge
    #[serde(default = "default_protected_branches")]
    pub protected_branches: Vec<String>,
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

const fn default_lease_timeout_secs() -> u64 {
    15 * 60
}

fn default_protected_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_mergers: Vec::new(),
            protected_branches: default_protected_branches(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            lease_timeout_secs: default_lease_timeout_secs(),
            project: ProjectSettings::default(),
            access: AccessConfig::default(),
            users: Vec::new(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load config from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Load from an explicit path, else the default location, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Look up a configured user by username
    pub fn find_user(&self, username: &str) -> Result<&Actor> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| {
                Error::Config(format!("unknown user '{username}', add it under [[users]]"))
            })
    }

    /// Look up a configured user by id
    pub fn user_by_id(&self, id: u64) -> Option<&Actor> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Lease lifetime
    pub const fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }
}
