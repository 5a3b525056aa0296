//! Show command - print a stored merge request

use crate::cli::CommandContext;
use crate::cli::style::Stylize;
use anstream::println;
use mr_merge::error::{Error, Result};
use mr_merge::store::MergeRequestStore;

/// Run the show command
pub async fn run_show(ctx: &CommandContext, id: u64, json: bool) -> Result<()> {
    let mr = ctx.store.read(id).await?;

    if json {
        let out = serde_json::to_string_pretty(&mr)
            .map_err(|e| Error::Internal(format!("failed to serialize merge request: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let author = ctx
        .config
        .user_by_id(mr.author_id)
        .map_or_else(|| format!("user #{}", mr.author_id), |u| u.username.clone());

    println!("{} {}", mr.to_reference().emphasis(), mr.title);
    println!("   State:  {} ({})", mr.state.to_string().accent(), mr.merge_status);
    println!("   Author: {author}");
    println!(
        "   Branch: {} → {}",
        mr.source_branch.accent(),
        mr.target_branch.accent()
    );
    println!("   Head:   {}", mr.diff_head_sha.muted());
    if let Some(ref sha) = mr.merge_commit_sha {
        println!("   Merged: {}", sha.accent());
    }
    if let Some(ref sha) = mr.squash_commit_sha {
        println!("   Squash: {}", sha.muted());
    }
    if let Some(ref sha) = mr.in_progress_merge_commit_sha {
        println!("   {} {}", "In progress:".warn(), sha.muted());
    }
    if let Some(ref error) = mr.merge_error {
        println!("   {} {}", "Error:".warn(), error);
    }
    Ok(())
}
