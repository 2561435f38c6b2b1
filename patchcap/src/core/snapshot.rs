//! Unified diffs synthesized from before/after file snapshots.
//!
//! Line diffs come from `similar` and are assembled straight into
//! [`PatchDocument`] structures, so snapshot output is rendered by the same
//! code that renders parsed diffs and always re-parses.

use std::collections::BTreeSet;
use std::ops::Range;

use similar::{ChangeTag, TextDiff};
use tracing::debug;

use crate::core::patch::{DEV_NULL, FileHeader, FilePatch, Hunk, HunkLine, LineKind, PatchDocument};
use crate::core::types::ContentSnapshot;

pub const DEFAULT_CONTEXT_LINES: usize = 3;

const REGULAR_FILE_MODE: &str = "100644";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotDiffer {
    context_lines: usize,
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LINES)
    }
}

impl SnapshotDiffer {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    /// Unified diff text from `before` to `after`; empty when nothing differs.
    pub fn diff(&self, before: &ContentSnapshot, after: &ContentSnapshot) -> String {
        self.diff_document(before, after).render()
    }

    /// One entry per differing path, in lexicographic path order.
    ///
    /// A path present on only one side always differs, even if its content is
    /// empty.
    pub fn diff_document(&self, before: &ContentSnapshot, after: &ContentSnapshot) -> PatchDocument {
        let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        let files: Vec<FilePatch> = paths
            .into_iter()
            .filter_map(|path| self.file_patch(path, before.get(path), after.get(path)))
            .collect();
        debug!(
            before = before.len(),
            after = after.len(),
            changed = files.len(),
            "snapshot diff computed"
        );
        PatchDocument::new(files)
    }

    fn file_patch(&self, path: &str, old: Option<&String>, new: Option<&String>) -> Option<FilePatch> {
        if old == new {
            return None;
        }

        let mut git_header = vec![format!("diff --git a/{path} b/{path}")];
        match (old, new) {
            (None, Some(_)) => git_header.push(format!("new file mode {REGULAR_FILE_MODE}")),
            (Some(_), None) => git_header.push(format!("deleted file mode {REGULAR_FILE_MODE}")),
            _ => {}
        }

        let hunks = self.hunks(
            old.map_or("", String::as_str),
            new.map_or("", String::as_str),
        );
        // Creating or deleting an empty file has no content to show; git
        // expresses it with the mode line alone.
        let header = (!hunks.is_empty()).then(|| FileHeader {
            source: match old {
                Some(_) => format!("a/{path}"),
                None => DEV_NULL.to_string(),
            },
            target: match new {
                Some(_) => format!("b/{path}"),
                None => DEV_NULL.to_string(),
            },
        });

        Some(FilePatch {
            git_header,
            header,
            hunks,
        })
    }

    fn hunks(&self, old: &str, new: &str) -> Vec<Hunk> {
        // Lines end at '\n' only, as git and `git apply` count them; a bare
        // '\r' stays inside its line.
        let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
        let new_lines: Vec<&str> = new.split_inclusive('\n').collect();
        let diff =
            TextDiff::configure().diff_slices(old_lines.as_slice(), new_lines.as_slice());
        let groups = diff.grouped_ops(self.context_lines);
        groups
            .iter()
            .filter_map(|group| {
                let (first, last) = (group.first()?, group.last()?);
                let old_range = first.old_range().start..last.old_range().end;
                let new_range = first.new_range().start..last.new_range().end;
                let lines = group
                    .iter()
                    .flat_map(|op| diff.iter_changes(op))
                    .map(|change| {
                        let kind = match change.tag() {
                            ChangeTag::Equal => LineKind::Context,
                            ChangeTag::Delete => LineKind::Removed,
                            ChangeTag::Insert => LineKind::Added,
                        };
                        let value = change.value();
                        let content = value.strip_suffix('\n');
                        HunkLine {
                            kind,
                            content: content.unwrap_or(value).to_string(),
                            no_newline: content.is_none(),
                        }
                    })
                    .collect();
                Some(Hunk {
                    old_start: hunk_start(&old_range),
                    old_len: old_range.len(),
                    new_start: hunk_start(&new_range),
                    new_len: new_range.len(),
                    section: String::new(),
                    lines,
                })
            })
            .collect()
    }
}

/// 1-based start line; an empty range names the line before it.
fn hunk_start(range: &Range<usize>) -> usize {
    if range.is_empty() {
        range.start
    } else {
        range.start + 1
    }
}
