//! Error taxonomy for capture and validation.

use std::time::Duration;

/// Failures surfaced by the patch pipeline.
///
/// Structural and applicability checks never return these directly; they are
/// folded into [`crate::core::types::ValidationResult`] and
/// [`crate::core::types::ApplicabilityResult`] so callers can branch on a flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// Diff text is empty or structurally invalid.
    #[error("malformed diff: {0}")]
    MalformedDiff(String),

    /// The version-control tool could not be run or exited nonzero.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// `git apply --check` rejected the patch.
    #[error("apply check failed: {0}")]
    ApplyCheckFailed(String),

    /// An external command exceeded its deadline and was killed.
    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
}

impl PatchError {
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            secs: timeout.as_secs(),
        }
    }
}
