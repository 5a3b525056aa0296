//! CLI commands

mod context;
mod create;
mod merge;
mod show;
pub mod style;

pub use context::CommandContext;
pub use create::{CreateOptions, run_create};
pub use merge::{MergeOptions, run_merge};
pub use show::run_show;
