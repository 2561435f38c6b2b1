//! Evidence extraction from free-form agent responses.
//!
//! Two independent patterns are matched: fenced ```` ```diff ```` blocks and
//! "file operation" announcements such as `Editing file: src/app.py`. Results
//! come out in order of appearance. Nothing is validated or deduplicated here.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::FileChange;

static DIFF_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```diff\r?\n(.*?)```").expect("diff block regex"));

static FILE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:Creating|Editing|Modifying|Writing to) file: (.*?)$")
        .expect("file mention regex")
});

/// Scan `text` for evidence. See [`Scan`].
pub fn scan(text: &str) -> Scan<'_> {
    Scan {
        text,
        blocks: Pending::new(&DIFF_BLOCK),
        mentions: Pending::new(&FILE_MENTION),
    }
}

/// Lazy iterator over the [`FileChange`]s in a response.
///
/// Cloning yields an independent iterator from the same position, so a caller
/// can restart a scan without re-reading the input.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    text: &'a str,
    blocks: Pending<'a>,
    mentions: Pending<'a>,
}

impl Iterator for Scan<'_> {
    type Item = FileChange;

    fn next(&mut self) -> Option<FileChange> {
        let block = self.blocks.peek(self.text).map(|found| found.start);
        let mention = self.mentions.peek(self.text).map(|found| found.start);

        let take_block = match (block, mention) {
            (Some(b), Some(m)) => b <= m,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_block {
            let block = self.blocks.take()?;
            Some(FileChange::DiffBlock {
                content: block.capture.to_string(),
            })
        } else {
            let mention = self.mentions.take()?;
            Some(FileChange::FileMention {
                path: mention.capture.trim().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct Found<'a> {
    start: usize,
    end: usize,
    capture: &'a str,
}

/// One pattern's position in the text, with its next match held until used.
#[derive(Debug, Clone)]
struct Pending<'a> {
    pattern: &'static LazyLock<Regex>,
    cursor: usize,
    /// `None` until searched; `Some(None)` once the pattern is exhausted.
    next: Option<Option<Found<'a>>>,
}

impl<'a> Pending<'a> {
    fn new(pattern: &'static LazyLock<Regex>) -> Self {
        Self {
            pattern,
            cursor: 0,
            next: None,
        }
    }

    fn peek(&mut self, text: &'a str) -> Option<&Found<'a>> {
        let (pattern, cursor) = (self.pattern, self.cursor);
        self.next
            .get_or_insert_with(|| find(pattern, text, cursor))
            .as_ref()
    }

    fn take(&mut self) -> Option<Found<'a>> {
        let found = self.next.take().flatten()?;
        self.cursor = found.end;
        Some(found)
    }
}

fn find<'a>(pattern: &Regex, text: &'a str, cursor: usize) -> Option<Found<'a>> {
    let caps = pattern.captures_at(text, cursor)?;
    let whole = caps.get(0)?;
    Some(Found {
        start: whole.start(),
        end: whole.end(),
        capture: caps.get(1).map_or("", |m| m.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ChangeKind;

    const RESPONSE: &str = "\
I'll fix the import.

Editing file: foo.py

```diff
--- a/foo.py
+++ b/foo.py
@@ -1 +1 @@
-import sys
+import os
```

Editing file: foo.py
Done.
";

    #[test]
    fn extracts_blocks_and_mentions_in_order() {
        let changes: Vec<FileChange> = scan(RESPONSE).collect();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].kind(), ChangeKind::FileMention);
        assert_eq!(changes[1].kind(), ChangeKind::DiffBlock);
        assert_eq!(changes[2].kind(), ChangeKind::FileMention);
        assert_eq!(changes[0].path(), Some("foo.py"));
        assert_eq!(changes[2].path(), Some("foo.py"));
        assert_eq!(
            changes[1].content(),
            Some("--- a/foo.py\n+++ b/foo.py\n@@ -1 +1 @@\n-import sys\n+import os\n")
        );
    }

    #[test]
    fn recognizes_every_announcement_verb() {
        let text = "Creating file: a.rs\nModifying file: b.rs\nWriting to file:   c.rs  \n";
        let paths: Vec<String> = scan(text)
            .filter_map(|change| change.path().map(str::to_string))
            .collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn clone_restarts_scan() {
        let first = scan(RESPONSE);
        let again = first.clone();
        assert_eq!(first.collect::<Vec<_>>(), again.collect::<Vec<_>>());
    }

    #[test]
    fn long_run_of_mentions_after_last_block() {
        let mut text = String::from("```diff\n-a\n+b\n```\n");
        for n in 0..50 {
            text.push_str(&format!("Editing file: f{n}.py\n"));
        }
        let mut changes = scan(&text);
        assert_eq!(changes.next().map(|c| c.kind()), Some(ChangeKind::DiffBlock));
        let paths: Vec<String> = changes
            .by_ref()
            .filter_map(|change| change.path().map(str::to_string))
            .collect();
        assert_eq!(paths.len(), 50);
        assert_eq!(paths[49], "f49.py");
        assert!(changes.next().is_none());
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert_eq!(scan("All tests pass, no changes needed.").count(), 0);
    }

    #[test]
    fn untagged_fence_is_ignored() {
        let text = "```\n--- a/x\n+++ b/x\n```\n```python\nprint()\n```\n";
        assert_eq!(scan(text).count(), 0);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let text = "Editing file: win.txt\r\n```diff\r\n-a\r\n+b\r\n```\r\n";
        let changes: Vec<FileChange> = scan(text).collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path(), Some("win.txt"));
        assert_eq!(changes[1].content(), Some("-a\r\n+b\r\n"));
    }
}
