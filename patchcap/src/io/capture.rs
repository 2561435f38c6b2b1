//! Working-tree capture: what did the agent change in this repository?

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::PatchError;
use crate::io::git::{DEFAULT_GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES, Git};

pub const DEFAULT_REFERENCE: &str = "HEAD";

/// Captures the working-tree delta of a repository, new files included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoDiffCapturer {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Default for RepoDiffCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

impl RepoDiffCapturer {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }

    /// Diff of `repo` against `reference`, including untracked files.
    ///
    /// Untracked files are first registered with intent-to-add; that step is
    /// best-effort and its failure is only logged. The index gains the new
    /// entries (without content); the working tree is left as it was. Returns
    /// an empty string when nothing changed.
    #[instrument(skip_all, fields(repo = %repo.display(), reference))]
    pub fn capture(&self, repo: &Path, reference: &str) -> Result<String, PatchError> {
        let git = Git::new(repo)
            .with_timeout(self.timeout)
            .with_output_limit(self.output_limit_bytes);

        if let Err(err) = git.intent_to_add_all() {
            warn!(err = %err, "could not register untracked files, continuing");
        }

        match git.diff_against(reference) {
            Ok(diff) => {
                debug!(bytes = diff.len(), "capture complete");
                Ok(diff)
            }
            Err(err) => {
                info!(err = %err, "capture failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::patch::PatchDocument;
    use crate::test_support::TestRepo;

    #[test]
    fn clean_tree_captures_nothing() {
        let repo = TestRepo::with_files(&[("a.txt", "x\n")]).expect("repo");
        let diff = RepoDiffCapturer::default()
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect("capture");
        assert_eq!(diff, "");
    }

    #[test]
    fn untracked_files_appear_in_capture() {
        let repo = TestRepo::with_files(&[("a.txt", "x\n")]).expect("repo");
        repo.write("a.txt", "y\n").expect("edit");
        repo.write("src/new.py", "print('hi')\n").expect("new file");

        let diff = RepoDiffCapturer::default()
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect("capture");
        let doc = PatchDocument::parse(&diff).expect("parse");
        assert_eq!(doc.paths(), vec!["a.txt", "src/new.py"]);
        assert!(doc.files()[1].is_creation());
    }

    #[test]
    fn working_tree_content_is_untouched() {
        let repo = TestRepo::with_files(&[("a.txt", "x\n")]).expect("repo");
        repo.write("b.txt", "new\n").expect("new file");
        RepoDiffCapturer::default()
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect("capture");
        assert_eq!(repo.read("b.txt").expect("read"), "new\n");
        assert_eq!(repo.read("a.txt").expect("read"), "x\n");
    }

    #[test]
    fn textconv_filters_do_not_leak_into_capture() {
        let repo = TestRepo::with_files(&[
            (".gitattributes", "*.dat diff=upper\n"),
            ("data.dat", "x\n"),
        ])
        .expect("repo");
        repo.config("diff.upper.textconv", "tr a-z A-Z <")
            .expect("config");
        repo.write("data.dat", "y\n").expect("edit");

        let diff = RepoDiffCapturer::default()
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect("capture");
        assert!(diff.ends_with("@@ -1 +1 @@\n-x\n+y\n"), "{diff}");
    }

    #[test]
    fn non_utf8_content_fails_instead_of_being_replaced() {
        let repo = TestRepo::with_files(&[("a.txt", "x\n")]).expect("repo");
        repo.write_bytes("latin.txt", b"caf\xe9\n").expect("latin-1 file");

        let err = RepoDiffCapturer::default()
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect_err("not utf-8");
        match err {
            PatchError::CaptureFailed(msg) => assert!(msg.contains("not valid UTF-8"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn deadline_overrun_is_timeout_error() {
        let repo = TestRepo::with_files(&[("a.txt", "x\n")]).expect("repo");
        repo.write("a.txt", "y\n").expect("edit");
        let err = RepoDiffCapturer::new(Duration::ZERO, DEFAULT_OUTPUT_LIMIT_BYTES)
            .capture(repo.path(), DEFAULT_REFERENCE)
            .expect_err("timeout");
        assert!(matches!(err, PatchError::Timeout { .. }), "{err:?}");
    }

    #[test]
    fn non_repository_is_capture_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = RepoDiffCapturer::default()
            .capture(temp.path(), DEFAULT_REFERENCE)
            .expect_err("not a repo");
        assert!(matches!(err, PatchError::CaptureFailed(_)), "{err:?}");
    }
}
