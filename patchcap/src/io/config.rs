//! Configuration stored in `patchcap.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::snapshot::{DEFAULT_CONTEXT_LINES, SnapshotDiffer};
use crate::core::submission::DEFAULT_MODEL_NAME;
use crate::io::capture::{DEFAULT_REFERENCE, RepoDiffCapturer};
use crate::io::git::{DEFAULT_GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES};
use crate::io::validator::PatchValidator;

pub const DEFAULT_CONFIG_FILE: &str = "patchcap.toml";

/// Capture/validation configuration (TOML).
///
/// Missing fields default to the values used when no file exists at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Commit the working tree is compared against.
    pub reference: String,

    /// Model name recorded in submissions when none is given.
    pub model_name: String,

    /// Deadline for each git invocation, in seconds.
    pub git_timeout_secs: u64,

    /// Upper bound on captured stdout/stderr per git invocation.
    pub output_limit_bytes: usize,

    /// Context lines around snapshot diff hunks.
    pub context_lines: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            reference: DEFAULT_REFERENCE.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            git_timeout_secs: DEFAULT_GIT_TIMEOUT.as_secs(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reference.trim().is_empty() {
            return Err(anyhow!("reference must be non-empty"));
        }
        if self.model_name.trim().is_empty() {
            return Err(anyhow!("model_name must be non-empty"));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn capturer(&self) -> RepoDiffCapturer {
        RepoDiffCapturer::new(self.git_timeout(), self.output_limit_bytes)
    }

    pub fn validator(&self) -> PatchValidator {
        PatchValidator::new(self.git_timeout(), self.output_limit_bytes)
    }

    pub fn snapshot_differ(&self) -> SnapshotDiffer {
        SnapshotDiffer::new(self.context_lines)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CaptureConfig::default()`.
pub fn load_config(path: &Path) -> Result<CaptureConfig> {
    if !path.exists() {
        let cfg = CaptureConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CaptureConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Render config as TOML, as `load_config` would read it back.
pub fn render_config(cfg: &CaptureConfig) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config toml")
}
