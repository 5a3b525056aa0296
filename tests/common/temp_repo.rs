//! Temporary git repositories for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A throwaway git repository with one commit on `main`
pub struct TempGitRepo {
    dir: TempDir,
}

impl TempGitRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let repo = Self { dir };
        repo.git(&["init", "-q", "-b", "main"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.commit_file("README.md", "# project\n", "Initial commit");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git and return trimmed stdout, panicking on failure
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Write `path`, commit it on the current branch and return the commit
    pub fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        fs::write(self.path().join(path), content).expect("write file");
        self.git(&["add", path]);
        self.git(&["commit", "-q", "-m", message]);
        self.head("HEAD")
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "-q", branch]);
    }

    /// Create `branch` at the current commit and switch to it
    pub fn checkout_new(&self, branch: &str) {
        self.git(&["checkout", "-q", "-b", branch]);
    }

    pub fn head(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev])
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(self.path())
            .output()
            .expect("run git")
            .status
            .success()
    }

    /// `feature` branch one commit ahead of `main`, with `main` moved on
    /// independently. Leaves `main` checked out.
    pub fn diverged_feature(&self) -> String {
        self.checkout_new("feature");
        let feature = self.commit_file("feature.txt", "feature\n", "Add feature");
        self.checkout("main");
        self.commit_file("main.txt", "main\n", "Work on main");
        feature
    }

    /// Install an executable `pre-receive` hook with `script` as its body
    pub fn install_pre_receive(&self, script: &str) -> PathBuf {
        let hook = self.path().join(".git").join("hooks").join("pre-receive");
        fs::create_dir_all(hook.parent().expect("hooks dir")).expect("create hooks dir");
        fs::write(&hook, format!("#!/bin/sh\ncat >/dev/null\n{script}\n")).expect("write hook");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).expect("chmod hook");
        }
        hook
    }
}
