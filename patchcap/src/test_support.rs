//! Test-only helpers for throwaway git repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

/// A git repository in a temp dir, removed on drop.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Fresh repository with a single empty commit, so `HEAD` resolves.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo dir")?;
        let repo = Self { dir };
        repo.git(&["init", "-q"])?;
        repo.git(&["config", "core.autocrlf", "false"])?;
        repo.commit_all("chore: empty root")?;
        Ok(repo)
    }

    /// Repository whose `HEAD` contains exactly `files`.
    pub fn with_files(files: &[(&str, &str)]) -> Result<Self> {
        let repo = Self::new()?;
        for (path, contents) in files {
            repo.write(path, contents)?;
        }
        repo.commit_all("chore: seed files")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the repo root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Like [`TestRepo::write`], for content that is not UTF-8.
    pub fn write_bytes(&self, rel: &str, contents: &[u8]) -> Result<()> {
        let path = self.path().join(rel);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Set a repository-local git config value.
    pub fn config(&self, key: &str, value: &str) -> Result<()> {
        self.git(&["config", key, value])
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.path().join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Stage everything and commit (allowing an empty commit).
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&[
            "-c",
            "user.name=patchcap",
            "-c",
            "user.email=patchcap@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-q",
            "--allow-empty",
            "-m",
            message,
        ])
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(())
    }
}
