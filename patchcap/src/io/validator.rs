//! Patch checks run before a diff is trusted.
//!
//! Two independent checks: structure (does it parse into at least one file
//! entry?) and applicability (does `git apply --check` accept it against a
//! concrete tree?). Neither fails with an error; both report a result value.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::core::patch::parse_document;
use crate::core::types::{ApplicabilityResult, ValidationResult};
use crate::error::PatchError;
use crate::io::git::{DEFAULT_GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES, Git};

pub const APPLIES_CLEANLY: &str = "Patch can be applied cleanly";

/// Structural check. Pure; see [`PatchValidator::validate_structure`].
pub fn validate_structure(diff: &str) -> ValidationResult {
    if diff.trim().is_empty() {
        return ValidationResult::invalid("Empty patch");
    }
    match parse_document(diff) {
        Ok(doc) if doc.is_empty() => ValidationResult::invalid("Patch contains no file changes"),
        Ok(_) => ValidationResult::valid(),
        Err(PatchError::MalformedDiff(detail)) => {
            ValidationResult::invalid(format!("Invalid patch format: {detail}"))
        }
        Err(err) => ValidationResult::invalid(format!("Invalid patch format: {err}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchValidator {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Default for PatchValidator {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

impl PatchValidator {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }

    /// Is `diff` a well-formed patch with at least one file entry?
    pub fn validate_structure(&self, diff: &str) -> ValidationResult {
        validate_structure(diff)
    }

    /// Dry-run `diff` against the tree at `repo`.
    ///
    /// The diff is written to a temp file that is removed on every exit path.
    /// Any failure along the way (temp file, spawn, timeout) is reported as
    /// not applicable with the error text as detail.
    #[instrument(skip_all, fields(repo = %repo.display(), bytes = diff.len()))]
    pub fn test_applicability(&self, diff: &str, repo: &Path) -> ApplicabilityResult {
        let patch_file = match write_patch_file(diff) {
            Ok(file) => file,
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(err = %detail, "could not stage patch file");
                return ApplicabilityResult::rejected(format!("Error testing patch: {detail}"));
            }
        };

        let git = Git::new(repo)
            .with_timeout(self.timeout)
            .with_output_limit(self.output_limit_bytes);
        match git.apply_check(patch_file.path()) {
            Ok(()) => {
                debug!("patch applies cleanly");
                ApplicabilityResult::applicable(APPLIES_CLEANLY)
            }
            Err(PatchError::ApplyCheckFailed(stderr)) => {
                debug!("patch does not apply");
                ApplicabilityResult::rejected(format!("Patch application failed: {stderr}"))
            }
            Err(err) => {
                warn!(err = %err, "apply check did not complete");
                ApplicabilityResult::rejected(format!("Error testing patch: {err}"))
            }
        }
    }
}

fn write_patch_file(diff: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("patchcap-")
        .suffix(".patch")
        .tempfile()
        .context("create temp patch file")?;
    file.write_all(diff.as_bytes())
        .context("write temp patch file")?;
    file.flush().context("flush temp patch file")?;
    Ok(file)
}
