//! Create command - record a merge request for a source branch

use crate::cli::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use mr_merge::error::{Error, Result};
use mr_merge::repository::Repository;
use mr_merge::types::{MergeParams, MergeRequest, MergeRequestState, MergeStatus};

/// Options for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Source branch
    pub source: String,
    /// Target branch
    pub target: String,
    /// Title
    pub title: String,
    /// Author username
    pub author: String,
    /// Project path
    pub project: String,
    /// Squash on merge
    pub squash: bool,
    /// Draft
    pub draft: bool,
    /// Remove source branch on merge
    pub remove_source_branch: bool,
}

/// Run the create command
pub async fn run_create(ctx: &CommandContext, options: CreateOptions) -> Result<()> {
    let author = ctx.config.find_user(&options.author)?;

    let diff_head_sha = ctx
        .repository
        .branch_head(&options.source)
        .await?
        .ok_or_else(|| Error::Config(format!("source branch '{}' not found", options.source)))?;
    if ctx.repository.branch_head(&options.target).await?.is_none() {
        return Err(Error::Config(format!(
            "target branch '{}' not found",
            options.target
        )));
    }

    let author_id = author.id;
    let mr = ctx
        .store
        .create(move |id| MergeRequest {
            id,
            iid: id,
            project: options.project,
            title: options.title,
            author_id,
            state: MergeRequestState::Opened,
            merge_status: MergeStatus::Unchecked,
            source_branch: options.source,
            target_branch: options.target,
            diff_head_sha,
            draft: options.draft,
            unresolved_discussions: 0,
            squash: options.squash,
            merge_error: None,
            merge_commit_sha: None,
            in_progress_merge_commit_sha: None,
            squash_commit_sha: None,
            merge_jid: None,
            merged_at: None,
            merge_params: MergeParams {
                should_remove_source_branch: None,
                force_remove_source_branch: options.remove_source_branch,
            },
        })
        .await?;

    println!(
        "{} Created {} (id {})",
        check(),
        mr.to_reference().emphasis(),
        mr.id.to_string().accent()
    );
    Ok(())
}
