//! Shared value types for capture and validation results.
//!
//! All of these are created per request and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Repository-relative path -> full file text.
///
/// A `BTreeMap` keeps iteration in lexicographic path order, which is the order
/// snapshot diffs are emitted in.
pub type ContentSnapshot = BTreeMap<String, String>;

/// Which kind of evidence a [`FileChange`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    DiffBlock,
    FileMention,
}

/// One unit of evidence extracted from free-form agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileChange {
    /// Body of a fenced ```` ```diff ```` block.
    DiffBlock { content: String },
    /// Path announced by a "Creating/Editing/Modifying/Writing to file:" line.
    FileMention { path: String },
}

impl FileChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            FileChange::DiffBlock { .. } => ChangeKind::DiffBlock,
            FileChange::FileMention { .. } => ChangeKind::FileMention,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            FileChange::FileMention { path } => Some(path),
            FileChange::DiffBlock { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            FileChange::DiffBlock { content } => Some(content),
            FileChange::FileMention { .. } => None,
        }
    }
}

/// Outcome of the structural check. `ok == false` always carries a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of a dry-run apply against a concrete tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicabilityResult {
    pub applicable: bool,
    pub detail: String,
}

impl ApplicabilityResult {
    pub fn applicable(detail: impl Into<String>) -> Self {
        Self {
            applicable: true,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            applicable: false,
            detail: detail.into(),
        }
    }
}
