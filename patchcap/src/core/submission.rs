//! Benchmark submission records.

use serde::{Deserialize, Serialize};

/// Model name recorded when the caller does not supply one.
pub const DEFAULT_MODEL_NAME: &str = "claude-code";

/// Persisted prediction shape: `{"instance_id", "model", "prediction"}`.
///
/// `prediction` is the raw diff text, never a structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub instance_id: String,
    pub model: String,
    pub prediction: String,
}

/// Package a diff for submission. Performs no validation.
pub fn format_submission(diff: &str, instance_id: &str, model: Option<&str>) -> SubmissionRecord {
    SubmissionRecord {
        instance_id: instance_id.to_string(),
        model: model.unwrap_or(DEFAULT_MODEL_NAME).to_string(),
        prediction: diff.to_string(),
    }
}
