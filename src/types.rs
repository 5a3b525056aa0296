//! Core types for mr-merge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Merge request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestState {
    /// Open and accepting changes
    Opened,
    /// A merge is in progress
    Locked,
    /// Merged into the target branch
    Merged,
    /// Closed without merging
    Closed,
}

impl std::fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Locked => write!(f, "locked"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Result of the last mergeability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Not checked since the last push
    Unchecked,
    /// Check running
    Checking,
    /// No conflicts
    CanBeMerged,
    /// Conflicts with the target branch
    CannotBeMerged,
}

impl MergeStatus {
    /// Whether this status rules out merging
    ///
    /// `Unchecked` is allowed through: the merge itself is the final word on
    /// conflicts.
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Checking | Self::CannotBeMerged)
    }
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchecked => write!(f, "unchecked"),
            Self::Checking => write!(f, "checking"),
            Self::CanBeMerged => write!(f, "can_be_merged"),
            Self::CannotBeMerged => write!(f, "cannot_be_merged"),
        }
    }
}

/// Merge parameters remembered on the merge request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Removal preference from the last merge attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_remove_source_branch: Option<bool>,
    /// Author asked for the source branch to be removed on merge
    #[serde(default)]
    pub force_remove_source_branch: bool,
}

/// A merge request as seen by the merge pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Global identity, also the lease key
    pub id: u64,
    /// Project-scoped number
    pub iid: u64,
    /// Full project path (e.g. "group/project")
    pub project: String,
    /// Title
    pub title: String,
    /// Author user id
    pub author_id: u64,
    /// Lifecycle state
    pub state: MergeRequestState,
    /// Last mergeability check result
    pub merge_status: MergeStatus,
    /// Branch being merged
    pub source_branch: String,
    /// Branch merged into
    pub target_branch: String,
    /// Source commit the diff was computed for
    pub diff_head_sha: String,
    /// Whether the merge request is a draft
    #[serde(default)]
    pub draft: bool,
    /// Number of unresolved discussions
    #[serde(default)]
    pub unresolved_discussions: u32,
    /// Squash source commits on merge
    #[serde(default)]
    pub squash: bool,
    /// Diagnostic from the last failed merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
    /// Resulting merge commit, set iff merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_commit_sha: Option<String>,
    /// Placeholder visible while a merge is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_merge_commit_sha: Option<String>,
    /// Squash result recorded on merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash_commit_sha: Option<String>,
    /// Background job running the merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_jid: Option<String>,
    /// When the merge completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    /// Remembered merge parameters (kept last: serialized as a TOML table)
    #[serde(default)]
    pub merge_params: MergeParams,
}

impl MergeRequest {
    /// Full reference, e.g. `group/project!12`
    pub fn to_reference(&self) -> String {
        format!("{}!{}", self.project, self.iid)
    }

    /// Whether the merge request has been merged
    pub fn is_merged(&self) -> bool {
        self.state == MergeRequestState::Merged
    }

    /// Whether squash-on-merge applies
    pub const fn squash_on_merge(&self) -> bool {
        self.squash
    }

    /// State and policy part of mergeability
    ///
    /// Repository conditions (fast-forward possible, source present) are
    /// checked by the validator.
    pub fn is_mergeable(&self, skip_discussions_check: bool) -> bool {
        self.state == MergeRequestState::Opened
            && !self.draft
            && !self.merge_status.is_blocking()
            && (skip_discussions_check || self.unresolved_discussions == 0)
    }
}

/// Atomic multi-field update of a merge request
///
/// `None` leaves a field untouched. Nullable fields take `Some(None)` to
/// clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequestUpdate {
    /// New state
    pub state: Option<MergeRequestState>,
    /// New merge error
    pub merge_error: Option<Option<String>>,
    /// New merge commit
    pub merge_commit_sha: Option<Option<String>>,
    /// New in-progress placeholder
    pub in_progress_merge_commit_sha: Option<Option<String>>,
    /// New squash commit
    pub squash_commit_sha: Option<Option<String>>,
    /// New merge job id
    pub merge_jid: Option<Option<String>>,
    /// New removal preference
    pub should_remove_source_branch: Option<Option<bool>>,
    /// New merge time
    pub merged_at: Option<Option<DateTime<Utc>>>,
}

impl MergeRequestUpdate {
    /// Apply this update to a record
    pub fn apply(&self, mr: &mut MergeRequest) {
        if let Some(state) = self.state {
            mr.state = state;
        }
        if let Some(ref v) = self.merge_error {
            mr.merge_error.clone_from(v);
        }
        if let Some(ref v) = self.merge_commit_sha {
            mr.merge_commit_sha.clone_from(v);
        }
        if let Some(ref v) = self.in_progress_merge_commit_sha {
            mr.in_progress_merge_commit_sha.clone_from(v);
        }
        if let Some(ref v) = self.squash_commit_sha {
            mr.squash_commit_sha.clone_from(v);
        }
        if let Some(ref v) = self.merge_jid {
            mr.merge_jid.clone_from(v);
        }
        if let Some(v) = self.should_remove_source_branch {
            mr.merge_params.should_remove_source_branch = v;
        }
        if let Some(v) = self.merged_at {
            mr.merged_at = v;
        }
    }

    /// Whether the update touches nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// User performing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id
    pub id: u64,
    /// Username
    pub username: String,
    /// Commit email
    pub email: String,
}

/// Caller-supplied options for one merge attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeAttemptOptions {
    /// Source commit the caller reviewed
    pub sha: Option<String>,
    /// Commit message override
    pub commit_message: Option<String>,
    /// Remove the source branch after merge (`None` = use the MR's default)
    pub should_remove_source_branch: Option<bool>,
    /// Ignore unresolved discussions
    pub skip_discussions_check: bool,
}

/// Project squash policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquashOption {
    /// Squash is never allowed
    Never,
    /// Squash is required
    Always,
    /// Squash is on by default
    DefaultOn,
    /// Squash is off by default
    #[default]
    DefaultOff,
}

/// Project merge settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Only fast-forward merges are allowed
    #[serde(default)]
    pub ff_only: bool,
    /// Squash policy
    #[serde(default)]
    pub squash_option: SquashOption,
}

impl ProjectSettings {
    /// Whether every merge must be squashed
    pub const fn squash_always(&self) -> bool {
        matches!(self.squash_option, SquashOption::Always)
    }
}

/// How the content merge is performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStrategy {
    /// Create a merge commit
    Standard,
    /// Advance the target branch pointer
    FastForwardOnly,
}

impl ExecutorStrategy {
    /// Strategy mandated by project settings
    pub const fn for_project(settings: &ProjectSettings) -> Self {
        if settings.ff_only {
            Self::FastForwardOnly
        } else {
            Self::Standard
        }
    }
}

impl std::fmt::Display for ExecutorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "merge"),
            Self::FastForwardOnly => write!(f, "fast-forward"),
        }
    }
}

/// Source branch deletion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDeletionTask {
    /// Merge request the branch belonged to
    pub merge_request_id: u64,
    /// Branch to delete
    pub source_branch: String,
    /// Branch head at merge time; deletion is skipped if it moved
    pub source_sha: String,
    /// User the deletion is performed as
    pub actor_id: u64,
}

/// What the post-merge coordinator did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMergeReport {
    /// A branch deletion task was submitted
    pub branch_deletion_scheduled: bool,
    /// The removal preference was persisted
    pub merge_params_saved: bool,
}

/// Outcome of a merge attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merged by this attempt
    Merged {
        /// Resulting commit
        commit_id: String,
        /// Post-merge actions taken
        post_merge: PostMergeReport,
    },
    /// Already merged before this attempt
    AlreadyMerged {
        /// Existing merge commit
        commit_id: Option<String>,
    },
    /// Another attempt holds the lease
    LockUnavailable,
}

impl MergeOutcome {
    /// Commit id of the merge, if there is one
    pub fn commit_id(&self) -> Option<&str> {
        match self {
            Self::Merged { commit_id, .. } => Some(commit_id),
            Self::AlreadyMerged { commit_id } => commit_id.as_deref(),
            Self::LockUnavailable => None,
        }
    }
}
