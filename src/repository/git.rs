//! Git repository service using the git CLI
//!
//! Merges are computed without a worktree (`git merge-tree --write-tree`,
//! git 2.38+) and published with a compare-and-swap `update-ref`, after the
//! repository's `pre-receive` hook has accepted the update.

use super::{RepoResult, Repository};
use crate::error::RepositoryError;
use crate::types::{Actor, MergeRequest};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Message used when a hook rejects without printing anything
const DEFAULT_HOOK_MESSAGE: &str = "pre-receive hook declined";

/// Repository backed by a local (bare or non-bare) git repository
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Open the repository at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn output(&self, args: &[&str], actor: Option<&Actor>) -> RepoResult<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.path);
        if let Some(actor) = actor {
            cmd.env("GIT_AUTHOR_NAME", &actor.username)
                .env("GIT_AUTHOR_EMAIL", &actor.email)
                .env("GIT_COMMITTER_NAME", &actor.username)
                .env("GIT_COMMITTER_EMAIL", &actor.email);
        }
        Ok(cmd.output().await?)
    }

    async fn run(&self, args: &[&str], actor: Option<&Actor>) -> RepoResult<String> {
        let output = self.output(args, actor).await?;
        if !output.status.success() {
            return Err(RepositoryError::Git(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn require_head(&self, branch: &str) -> RepoResult<String> {
        self.branch_head(branch)
            .await?
            .ok_or_else(|| RepositoryError::Git(format!("branch '{branch}' does not exist")))
    }

    async fn git_dir(&self) -> RepoResult<PathBuf> {
        self.run(&["rev-parse", "--absolute-git-dir"], None)
            .await
            .map(PathBuf::from)
    }

    /// Run `hooks/pre-receive` for a single ref update, if the hook exists
    async fn run_pre_receive(&self, old: &str, new: &str, refname: &str) -> RepoResult<()> {
        let hook = self.git_dir().await?.join("hooks").join("pre-receive");
        if !hook.exists() {
            return Ok(());
        }

        let mut child = match Command::new(&hook)
            .current_dir(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            // git ignores hooks that are not executable
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if let Some(mut stdin) = child.stdin.take() {
            match stdin
                .write_all(format!("{old} {new} {refname}\n").as_bytes())
                .await
            {
                Ok(()) => {}
                // hook exited without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }
        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(());
        }

        let mut message = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(stderr.trim());
        }
        if message.is_empty() {
            message = DEFAULT_HOOK_MESSAGE.to_string();
        }
        Err(RepositoryError::PreReceiveRejected(message))
    }

    /// Move `branch` from `old` to `new`, failing if it moved meanwhile
    async fn update_branch(&self, branch: &str, new: &str, old: &str, reason: &str) -> RepoResult<()> {
        let refname = format!("refs/heads/{branch}");
        self.run_pre_receive(old, new, &refname).await?;
        self.run(&["update-ref", "-m", reason, &refname, new, old], None)
            .await?;
        debug!(branch, old, new, "updated branch");
        Ok(())
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn merge(
        &self,
        actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
        message: &str,
    ) -> RepoResult<String> {
        let target_head = self.require_head(&mr.target_branch).await?;

        let merge_tree = self
            .output(&["merge-tree", "--write-tree", &target_head, source_sha], None)
            .await?;
        let stdout = String::from_utf8_lossy(&merge_tree.stdout).to_string();
        match merge_tree.status.code() {
            Some(0) => {}
            Some(1) => {
                let conflicts: Vec<&str> = stdout.lines().skip(1).filter(|l| !l.is_empty()).collect();
                return Err(RepositoryError::Conflict(conflicts.join("; ")));
            }
            _ => {
                return Err(RepositoryError::Git(format!(
                    "git merge-tree failed: {}",
                    String::from_utf8_lossy(&merge_tree.stderr).trim()
                )));
            }
        }
        let tree = stdout
            .lines()
            .next()
            .ok_or_else(|| RepositoryError::Git("git merge-tree printed no tree".to_string()))?
            .trim()
            .to_string();

        let commit = self
            .run(
                &[
                    "commit-tree", &tree, "-p", &target_head, "-p", source_sha, "-m", message,
                ],
                Some(actor),
            )
            .await?;

        self.update_branch(
            &mr.target_branch,
            &commit,
            &target_head,
            &format!("merge {}", mr.to_reference()),
        )
        .await?;
        info!(target = %mr.target_branch, commit = %commit, "created merge commit");
        Ok(commit)
    }

    async fn fast_forward(
        &self,
        _actor: &Actor,
        source_sha: &str,
        mr: &MergeRequest,
    ) -> RepoResult<String> {
        let target_head = self.require_head(&mr.target_branch).await?;
        if !self.is_ancestor(&target_head, source_sha).await? {
            return Err(RepositoryError::Git(format!(
                "{source_sha} is not a fast-forward of {}",
                mr.target_branch
            )));
        }

        self.update_branch(
            &mr.target_branch,
            source_sha,
            &target_head,
            &format!("fast-forward {}", mr.to_reference()),
        )
        .await?;
        info!(target = %mr.target_branch, commit = %source_sha, "fast-forwarded");
        Ok(source_sha.to_string())
    }

    async fn squash(&self, actor: &Actor, mr: &MergeRequest, message: &str) -> RepoResult<String> {
        let target_head = self.require_head(&mr.target_branch).await?;
        let base = self
            .run(&["merge-base", &target_head, &mr.diff_head_sha], None)
            .await?;
        let tree = self
            .run(&["rev-parse", &format!("{}^{{tree}}", mr.diff_head_sha)], None)
            .await?;
        self.run(&["commit-tree", &tree, "-p", &base, "-m", message], Some(actor))
            .await
    }

    async fn branch_head(&self, branch: &str) -> RepoResult<Option<String>> {
        let output = self
            .output(
                &[
                    "rev-parse",
                    "--verify",
                    "--quiet",
                    &format!("refs/heads/{branch}^{{commit}}"),
                ],
                None,
            )
            .await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> RepoResult<bool> {
        let output = self
            .output(&["merge-base", "--is-ancestor", ancestor, descendant], None)
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(RepositoryError::Git(format!(
                "git merge-base failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn delete_branch(&self, branch: &str, expected_sha: &str) -> RepoResult<()> {
        self.run(
            &["update-ref", "-d", &format!("refs/heads/{branch}"), expected_sha],
            None,
        )
        .await?;
        info!(branch, "deleted branch");
        Ok(())
    }
}
