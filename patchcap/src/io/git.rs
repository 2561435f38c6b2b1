//! Git adapter for capture and apply checks.
//!
//! Every invocation runs with an explicit `current_dir`, under a deadline, and
//! with its output bounded. Nothing here touches the process-wide working
//! directory, so adapters for different repositories can be used from
//! different threads at the same time.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::error::PatchError;
use crate::io::process::{CommandOutput, run_with_timeout};

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, output_limit_bytes: usize) -> Self {
        self.output_limit_bytes = output_limit_bytes;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Register untracked files in the index without staging their content
    /// (`git add --intent-to-add .`), so they show up in a later diff.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn intent_to_add_all(&self) -> Result<(), PatchError> {
        self.run_checked(&["add", "--intent-to-add", "."])?;
        debug!("untracked files registered");
        Ok(())
    }

    /// Plain-text diff of the working tree against `reference`.
    ///
    /// Color, external diff drivers, textconv filters and prefix overrides from
    /// user config are all disabled, so the output depends only on repository
    /// content. Output that is not UTF-8 is an error rather than a lossy diff.
    #[instrument(skip_all, fields(workdir = %self.workdir.display(), reference))]
    pub fn diff_against(&self, reference: &str) -> Result<String, PatchError> {
        let output = self.run_checked(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--no-textconv",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            reference,
            "--",
        ])?;
        if output.stdout_truncated > 0 {
            warn!(
                limit = self.output_limit_bytes,
                dropped = output.stdout_truncated,
                "diff exceeds output limit"
            );
            return Err(PatchError::CaptureFailed(format!(
                "git diff output exceeds {} bytes",
                self.output_limit_bytes
            )));
        }
        let diff = String::from_utf8(output.stdout).map_err(|err| {
            PatchError::CaptureFailed(format!(
                "git diff output is not valid UTF-8 (first bad byte at offset {})",
                err.utf8_error().valid_up_to()
            ))
        })?;
        debug!(bytes = diff.len(), "diff captured");
        Ok(diff)
    }

    /// `git apply --check <patch_file>`: verify the patch applies without
    /// touching the working tree or index.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn apply_check(&self, patch_file: &Path) -> Result<(), PatchError> {
        let patch_arg = patch_file.to_string_lossy();
        let args = ["apply", "--check", patch_arg.as_ref()];
        let output = self
            .run(&args)
            .map_err(|err| PatchError::ApplyCheckFailed(format!("{err:#}")))?;
        if output.timed_out {
            return Err(PatchError::timeout(describe(&args), self.timeout));
        }
        if !output.status.success() {
            debug!(exit_code = ?output.status.code(), "apply check rejected patch");
            return Err(PatchError::ApplyCheckFailed(output.stderr_text()));
        }
        Ok(())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, PatchError> {
        let command = describe(args);
        let output = self
            .run(args)
            .map_err(|err| PatchError::CaptureFailed(format!("{command}: {err:#}")))?;
        if output.timed_out {
            return Err(PatchError::timeout(command, self.timeout));
        }
        if !output.status.success() {
            return Err(PatchError::CaptureFailed(format!(
                "{command} failed: {}",
                output.stderr_text()
            )));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        run_with_timeout(cmd, self.timeout, self.output_limit_bytes)
    }
}

fn describe(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}
