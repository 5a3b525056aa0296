//! Merge pipeline for a single merge request
//!
//! Stages, run under the merge lease:
//! 1. Validate - read-only precondition checks
//! 2. Execute - content merge and atomic state transition
//! 3. Post-merge - branch deletion scheduling, merge params (best effort)

mod execute;
mod post_merge;
mod service;
mod validate;

pub use execute::{MergeAttempt, default_commit_message, execute_merge};
pub use post_merge::PostMergeCoordinator;
pub use service::{MergeCollaborators, MergeService};
pub use validate::{
    FF_ONLY_MESSAGE, NO_SOURCE_MESSAGE, NOT_MERGEABLE_MESSAGE, SQUASH_REQUIRED_MESSAGE, Validation,
    validate,
};
