//! mr-merge: lease-guarded merge request merging
//!
//! The merge pipeline takes an exclusive lease on a merge request, checks
//! every precondition, merges through a [`repository::Repository`], records
//! the result atomically and then schedules post-merge work such as source
//! branch deletion.

pub mod branch_deletion;
pub mod config;
pub mod error;
pub mod lease;
pub mod merge;
pub mod policy;
pub mod repository;
pub mod store;
pub mod types;
