//! Predictions files: one submission record per line (JSON Lines).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::submission::SubmissionRecord;

/// Append `record` as a single JSON line, creating the file and its parent
/// directories if needed.
pub fn append_prediction(path: &Path, record: &SubmissionRecord) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create predictions dir {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(record).context("serialize prediction")?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append to {}", path.display()))?;
    debug!(instance_id = %record.instance_id, path = %path.display(), "prediction appended");
    Ok(())
}

/// Read every record back; blank lines are skipped.
pub fn read_predictions(path: &Path) -> Result<Vec<SubmissionRecord>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission::format_submission;

    #[test]
    fn appends_one_line_per_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out/predictions.jsonl");
        let first = format_submission("--- a/x\n+++ b/x\n", "repo__1", Some("m"));
        let second = format_submission("", "repo__2", None);

        append_prediction(&path, &first).expect("append");
        append_prediction(&path, &second).expect("append");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw.lines().count(), 2);
        assert_eq!(read_predictions(&path).expect("read back"), vec![first, second]);
    }

    #[test]
    fn reports_line_of_bad_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("predictions.jsonl");
        fs::write(
            &path,
            "{\"instance_id\":\"a\",\"model\":\"m\",\"prediction\":\"\"}\n\nnot json\n",
        )
        .expect("write");
        let err = read_predictions(&path).expect_err("bad line");
        assert!(format!("{err:#}").contains("line 3"), "{err:#}");
    }
}
