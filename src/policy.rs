//! Access checks consulted by the merge pipeline

use crate::config::AccessConfig;
use crate::error::{Error, Result};
use crate::types::{Actor, MergeRequest};
use async_trait::async_trait;
use regex::Regex;

/// Permission collaborator
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Whether `actor` may merge `mr`
    async fn can_merge(&self, actor: &Actor, mr: &MergeRequest) -> Result<bool>;

    /// Whether user `user_id` may remove the source branch of `mr` now
    async fn can_remove_source_branch(&self, user_id: u64, mr: &MergeRequest) -> Result<bool>;
}

/// Policy driven by the `[access]` config section
#[derive(Debug, Clone)]
pub struct LocalPolicy {
    allowed_mergers: Vec<String>,
    protected: Vec<Regex>,
}

impl LocalPolicy {
    /// Build from config; `*` in a protected branch pattern matches any run
    /// of characters
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        let protected = config
            .protected_branches
            .iter()
            .map(|pattern| {
                let escaped = regex::escape(pattern).replace(r"\*", ".*");
                Regex::new(&format!("^{escaped}$")).map_err(|e| {
                    Error::Config(format!("invalid protected branch pattern '{pattern}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            allowed_mergers: config.allowed_mergers.clone(),
            protected,
        })
    }

    /// Whether `branch` matches a protected pattern
    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected.iter().any(|re| re.is_match(branch))
    }
}

#[async_trait]
impl AccessPolicy for LocalPolicy {
    async fn can_merge(&self, actor: &Actor, _mr: &MergeRequest) -> Result<bool> {
        Ok(self.allowed_mergers.is_empty() || self.allowed_mergers.contains(&actor.username))
    }

    async fn can_remove_source_branch(&self, _user_id: u64, mr: &MergeRequest) -> Result<bool> {
        Ok(mr.source_branch != mr.target_branch && !self.is_protected(&mr.source_branch))
    }
}
