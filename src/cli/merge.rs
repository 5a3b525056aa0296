//! Merge command - merge a merge request into its target branch

use crate::cli::CommandContext;
use crate::cli::style::{Stylize, check, spinner_style};
use anstream::println;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use mr_merge::branch_deletion::BranchDeletionWorker;
use mr_merge::error::{Error, Result};
use mr_merge::merge::{MergeCollaborators, MergeService};
use mr_merge::store::MergeRequestStore;
use mr_merge::types::{ExecutorStrategy, MergeAttemptOptions, MergeOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Options for the merge command
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Username performing the merge
    pub actor: String,
    /// Source commit the user reviewed
    pub sha: Option<String>,
    /// Commit message override
    pub message: Option<String>,
    /// Remove the source branch after merging
    pub remove_source_branch: Option<bool>,
    /// Ignore unresolved discussions
    pub skip_discussions_check: bool,
    /// Preview and prompt for confirmation before merging
    pub confirm: bool,
}

/// Run the merge command
pub async fn run_merge(ctx: &CommandContext, id: u64, options: MergeOptions) -> Result<()> {
    let actor = ctx.config.find_user(&options.actor)?.clone();
    let mr = ctx.store.read(id).await?;
    let strategy = ExecutorStrategy::for_project(&ctx.config.project);

    if options.confirm {
        println!(
            "{} {} into {} ({strategy})",
            "Merge".emphasis(),
            mr.source_branch.accent(),
            mr.target_branch.accent()
        );
        println!("   {}", mr.title.muted());
        if !Confirm::new()
            .with_prompt("Proceed with merge?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
    }

    let worker = Arc::new(BranchDeletionWorker::spawn(ctx.repository.clone()));
    let service = MergeService::new(
        MergeCollaborators {
            store: ctx.store.clone(),
            repository: ctx.repository.clone(),
            policy: ctx.policy.clone(),
            leases: ctx.leases.clone(),
            branch_deletion: worker.clone(),
        },
        ctx.config.project.clone(),
    )
    .with_lease_timeout(ctx.config.lease_timeout());

    let attempt = MergeAttemptOptions {
        sha: options.sha,
        commit_message: options.message,
        should_remove_source_branch: options.remove_source_branch,
        skip_discussions_check: options.skip_discussions_check,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Merging {}...", mr.to_reference().emphasis()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let outcome = service.execute(id, &attempt, &actor).await;
    spinner.finish_and_clear();
    let deleted = worker.shutdown().await?;

    match outcome {
        Ok(MergeOutcome::Merged { commit_id, .. }) => {
            println!(
                "{} Merged {} as {}",
                check(),
                mr.to_reference().emphasis(),
                commit_id.accent()
            );
            if deleted > 0 {
                println!("   Deleted branch {}", mr.source_branch.accent());
            }
        }
        Ok(MergeOutcome::AlreadyMerged { commit_id }) => {
            println!(
                "{} already merged{}",
                mr.to_reference().emphasis(),
                commit_id.map(|c| format!(" as {}", c.accent())).unwrap_or_default()
            );
        }
        Ok(MergeOutcome::LockUnavailable) => {
            println!(
                "{}",
                "Another merge of this merge request is in progress.".muted()
            );
        }
        Err(e) => {
            println!("{} {}", "Merge failed:".warn(), e);
            return Err(e);
        }
    }

    Ok(())
}
