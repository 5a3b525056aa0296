//! mrm - merge merge requests against a local git repository

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::{CreateOptions, MergeOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mrm", version, about = "Lease-guarded merge request merging")]
struct Cli {
    /// Path to the git repository
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file (default: <config dir>/mr-merge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new merge request for a source branch
    Create {
        /// Branch to merge
        #[arg(long)]
        source: String,
        /// Branch to merge into
        #[arg(long, default_value = "main")]
        target: String,
        /// Title
        #[arg(long)]
        title: String,
        /// Author username
        #[arg(long)]
        author: String,
        /// Project path used in references
        #[arg(long, default_value = "local/project")]
        project: String,
        /// Squash commits on merge
        #[arg(long)]
        squash: bool,
        /// Mark as draft
        #[arg(long)]
        draft: bool,
        /// Remove the source branch when merged
        #[arg(long)]
        remove_source_branch: bool,
    },
    /// Merge a merge request
    Merge {
        /// Merge request id
        id: u64,
        /// Username performing the merge
        #[arg(long = "as")]
        actor: String,
        /// Source commit you reviewed
        #[arg(long)]
        sha: Option<String>,
        /// Merge commit message
        #[arg(long)]
        message: Option<String>,
        /// Remove the source branch after merging
        #[arg(long)]
        remove_source_branch: Option<bool>,
        /// Merge even with unresolved discussions
        #[arg(long)]
        skip_discussions_check: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show a merge request
    Show {
        /// Merge request id
        id: u64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli::CommandContext::new(&cli.repo, cli.config.as_deref())?;

    match cli.command {
        Commands::Create {
            source,
            target,
            title,
            author,
            project,
            squash,
            draft,
            remove_source_branch,
        } => {
            cli::run_create(
                &ctx,
                CreateOptions {
                    source,
                    target,
                    title,
                    author,
                    project,
                    squash,
                    draft,
                    remove_source_branch,
                },
            )
            .await?;
        }
        Commands::Merge {
            id,
            actor,
            sha,
            message,
            remove_source_branch,
            skip_discussions_check,
            yes,
        } => {
            cli::run_merge(
                &ctx,
                id,
                MergeOptions {
                    actor,
                    sha,
                    message,
                    remove_source_branch,
                    skip_discussions_check,
                    confirm: !yes,
                },
            )
            .await?;
        }
        Commands::Show { id, json } => {
            cli::run_show(&ctx, id, json).await?;
        }
    }

    Ok(())
}
