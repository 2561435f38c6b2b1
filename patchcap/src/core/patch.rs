//! Unified diff model: parsing, structural validation and rendering.
//!
//! Accepts plain unified diffs (`---`/`+++` pairs) as well as the git flavour
//! (`diff --git` plus extended header lines). Hunk bodies are consumed by the
//! counts declared in their `@@` header, which is what makes an unbalanced hunk
//! detectable. Text outside file sections is skipped, so diffs embedded in agent
//! commentary still parse.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PatchError;

pub const DEV_NULL: &str = "/dev/null";
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$").expect("hunk header regex")
});

/// Lines that may follow `diff --git` before the `---`/`+++` pair.
const EXTENDED_HEADER_PREFIXES: &[&str] = &[
    "old mode ",
    "new mode ",
    "deleted file mode ",
    "new file mode ",
    "copy from ",
    "copy to ",
    "rename from ",
    "rename to ",
    "similarity index ",
    "dissimilarity index ",
    "index ",
    "Binary files ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

impl LineKind {
    pub fn prefix(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        }
    }
}

/// One body line of a hunk, without its prefix or line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    pub content: String,
    /// Followed by `\ No newline at end of file`.
    pub no_newline: bool,
}

impl HunkLine {
    pub fn new(kind: LineKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            no_newline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    /// Verbatim text after the closing `@@` (often a function signature).
    pub section: String,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// `(added, removed)` line counts.
    pub fn stats(&self) -> (usize, usize) {
        self.lines.iter().fold((0, 0), |(added, removed), line| match line.kind {
            LineKind::Added => (added + 1, removed),
            LineKind::Removed => (added, removed + 1),
            LineKind::Context => (added, removed),
        })
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!(
            "@@ -{} +{} @@{}\n",
            format_range(self.old_start, self.old_len),
            format_range(self.new_start, self.new_len),
            self.section
        ));
        for line in &self.lines {
            out.push(line.kind.prefix());
            out.push_str(&line.content);
            out.push('\n');
            if line.no_newline {
                out.push_str(NO_NEWLINE_MARKER);
                out.push('\n');
            }
        }
    }
}

/// `---`/`+++` labels, verbatim (e.g. `a/src/lib.rs`, `/dev/null`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub source: String,
    pub target: String,
}

/// All changes to a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePatch {
    /// `diff --git` line followed by extended header lines. Empty for plain
    /// unified diffs.
    pub git_header: Vec<String>,
    /// Absent only for git entries without content hunks (empty files, mode
    /// changes, binary changes).
    pub header: Option<FileHeader>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Path before the change; `None` when the file is created.
    pub fn old_path(&self) -> Option<String> {
        match &self.header {
            Some(header) => label_path(&header.source, "a/"),
            None if self.has_git_line("new file mode ") => None,
            None => self.git_header_paths().map(|(old, _)| old),
        }
    }

    /// Path after the change; `None` when the file is deleted.
    pub fn new_path(&self) -> Option<String> {
        match &self.header {
            Some(header) => label_path(&header.target, "b/"),
            None if self.has_git_line("deleted file mode ") => None,
            None => self.git_header_paths().map(|(_, new)| new),
        }
    }

    /// The path this entry is about: the new path, or the old one for deletions.
    pub fn path(&self) -> Option<String> {
        self.new_path().or_else(|| self.old_path())
    }

    pub fn is_creation(&self) -> bool {
        self.old_path().is_none()
    }

    pub fn is_deletion(&self) -> bool {
        self.new_path().is_none()
    }

    /// `(added, removed)` line counts across all hunks.
    pub fn stats(&self) -> (usize, usize) {
        self.hunks.iter().fold((0, 0), |(added, removed), hunk| {
            let (a, r) = hunk.stats();
            (added + a, removed + r)
        })
    }

    fn has_git_line(&self, prefix: &str) -> bool {
        self.git_header.iter().any(|line| line.starts_with(prefix))
    }

    fn git_header_paths(&self) -> Option<(String, String)> {
        let rest = self.git_header.first()?.strip_prefix("diff --git ")?;
        let (old, new) = rest.rsplit_once(" b/")?;
        let old = old.strip_prefix("a/").unwrap_or(old);
        Some((old.to_string(), new.to_string()))
    }

    fn render_into(&self, out: &mut String) {
        for line in &self.git_header {
            out.push_str(line);
            out.push('\n');
        }
        if let Some(header) = &self.header {
            out.push_str(&format!("--- {}\n+++ {}\n", header.source, header.target));
        }
        for hunk in &self.hunks {
            hunk.render_into(out);
        }
    }
}

/// Structured form of a unified diff: file entries in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchDocument {
    files: Vec<FilePatch>,
}

impl PatchDocument {
    pub fn new(files: Vec<FilePatch>) -> Self {
        Self { files }
    }

    /// Parse diff text, rejecting empty input and documents without file entries.
    ///
    /// "No changes" is not a patch: a document that parses to zero entries is
    /// reported as [`PatchError::MalformedDiff`], the same as a syntax error.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        if text.trim().is_empty() {
            return Err(PatchError::MalformedDiff("diff text is empty".to_string()));
        }
        let document = parse_document(text)?;
        if document.is_empty() {
            return Err(PatchError::MalformedDiff(
                "no file headers found".to_string(),
            ));
        }
        Ok(document)
    }

    pub fn files(&self) -> &[FilePatch] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths touched by the document, in entry order.
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().filter_map(FilePatch::path).collect()
    }

    /// `(added, removed)` line counts across all files.
    pub fn stats(&self) -> (usize, usize) {
        self.files.iter().fold((0, 0), |(added, removed), file| {
            let (a, r) = file.stats();
            (added + a, removed + r)
        })
    }

    /// Re-serialize to unified diff text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            file.render_into(&mut out);
        }
        out
    }
}

impl fmt::Display for PatchDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Parse diff text without the "at least one file" policy.
///
/// Returns an empty document for text with no file sections; fails only on
/// structural errors inside a section.
pub fn parse_document(text: &str) -> Result<PatchDocument, PatchError> {
    Parser {
        lines: text.split_terminator('\n').collect(),
        pos: 0,
    }
    .run()
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<PatchDocument, PatchError> {
        let mut files = Vec::new();
        while let Some(line) = self.peek() {
            if line.starts_with("diff --git ") {
                files.push(self.git_file()?);
            } else if line.starts_with("--- ") {
                files.push(self.plain_file()?);
            } else if line.starts_with("@@ ") {
                return Err(self.malformed("hunk header outside of a file section"));
            } else {
                self.pos += 1;
            }
        }
        Ok(PatchDocument { files })
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn malformed(&self, message: impl fmt::Display) -> PatchError {
        self.malformed_at(self.pos, message)
    }

    fn malformed_at(&self, pos: usize, message: impl fmt::Display) -> PatchError {
        PatchError::MalformedDiff(format!("line {}: {message}", pos + 1))
    }

    fn git_file(&mut self) -> Result<FilePatch, PatchError> {
        let start = self.pos;
        let mut file = FilePatch::default();
        while let Some(line) = self.peek() {
            let is_header = if self.pos == start {
                true
            } else {
                EXTENDED_HEADER_PREFIXES
                    .iter()
                    .any(|prefix| line.starts_with(prefix))
            };
            if !is_header {
                break;
            }
            file.git_header.push(line.to_string());
            self.pos += 1;
        }
        if self.peek().is_some_and(|line| line.starts_with("--- ")) {
            let labels_at = self.pos;
            file.header = Some(self.file_header()?);
            self.hunks(&mut file)?;
            if file.hunks.is_empty() {
                return Err(self.malformed_at(labels_at, "file header without hunks"));
            }
        }
        Ok(file)
    }

    fn plain_file(&mut self) -> Result<FilePatch, PatchError> {
        let start = self.pos;
        let mut file = FilePatch {
            header: Some(self.file_header()?),
            ..FilePatch::default()
        };
        self.hunks(&mut file)?;
        if file.hunks.is_empty() {
            return Err(self.malformed_at(start, "file header without hunks"));
        }
        Ok(file)
    }

    fn file_header(&mut self) -> Result<FileHeader, PatchError> {
        let source = self
            .peek()
            .and_then(|line| line.strip_prefix("--- "))
            .ok_or_else(|| self.malformed("expected '---' header"))?;
        self.pos += 1;
        let target = self
            .peek()
            .and_then(|line| line.strip_prefix("+++ "))
            .ok_or_else(|| self.malformed("expected '+++' header after '---'"))?;
        self.pos += 1;
        Ok(FileHeader {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    fn hunks(&mut self, file: &mut FilePatch) -> Result<(), PatchError> {
        while let Some(line) = self.peek() {
            if !line.starts_with("@@") {
                break;
            }
            file.hunks.push(self.hunk(line)?);
        }
        Ok(())
    }

    fn hunk(&mut self, header: &str) -> Result<Hunk, PatchError> {
        let caps = HUNK_HEADER
            .captures(header)
            .ok_or_else(|| self.malformed(format!("invalid hunk header '{header}'")))?;
        let number = |idx: usize| -> Result<usize, PatchError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| self.malformed(format!("line number out of range in '{header}'"))),
                None => Ok(1),
            }
        };
        let mut hunk = Hunk {
            old_start: number(1)?,
            old_len: number(2)?,
            new_start: number(3)?,
            new_len: number(4)?,
            section: caps.get(5).map_or("", |m| m.as_str()).to_string(),
            lines: Vec::new(),
        };
        self.pos += 1;

        let (mut old_left, mut new_left) = (hunk.old_len, hunk.new_len);
        while old_left > 0 || new_left > 0 {
            let Some(line) = self.peek() else {
                return Err(self.malformed(format!(
                    "hunk ends early: expected {old_left} more old and {new_left} more new lines"
                )));
            };
            let (kind, content) = match line.as_bytes().first() {
                None => (LineKind::Context, ""),
                Some(b' ') => (LineKind::Context, &line[1..]),
                Some(b'-') => (LineKind::Removed, &line[1..]),
                Some(b'+') => (LineKind::Added, &line[1..]),
                Some(b'\\') => {
                    self.mark_no_newline(&mut hunk)?;
                    continue;
                }
                Some(_) => {
                    return Err(self.malformed(format!(
                        "hunk ends early: expected {old_left} more old and {new_left} more new lines"
                    )));
                }
            };
            match kind {
                LineKind::Context if old_left > 0 && new_left > 0 => {
                    old_left -= 1;
                    new_left -= 1;
                }
                LineKind::Removed if old_left > 0 => old_left -= 1,
                LineKind::Added if new_left > 0 => new_left -= 1,
                _ => return Err(self.malformed("hunk body exceeds its header's line counts")),
            }
            hunk.lines.push(HunkLine::new(kind, content));
            self.pos += 1;
        }

        if self.peek().is_some_and(|line| line.starts_with('\\')) {
            self.mark_no_newline(&mut hunk)?;
        }
        if self.peek().is_some_and(is_stray_body_line) {
            return Err(self.malformed("hunk body exceeds its header's line counts"));
        }
        Ok(hunk)
    }

    fn mark_no_newline(&mut self, hunk: &mut Hunk) -> Result<(), PatchError> {
        let Some(last) = hunk.lines.last_mut() else {
            return Err(self.malformed("'\\' marker before any hunk line"));
        };
        last.no_newline = true;
        self.pos += 1;
        Ok(())
    }
}

fn is_stray_body_line(line: &str) -> bool {
    (line.starts_with('+') && !line.starts_with("+++ "))
        || (line.starts_with('-') && !line.starts_with("--- "))
        || line.starts_with(' ')
}

/// Strip timestamp suffix and `a/`/`b/` prefix; `/dev/null` means "no file".
fn label_path(label: &str, prefix: &str) -> Option<String> {
    let label = match label.split_once('\t') {
        Some((path, _)) => path,
        None => label,
    }
    .trim_end();
    if label == DEV_NULL {
        return None;
    }
    Some(label.strip_prefix(prefix).unwrap_or(label).to_string())
}

/// `start,len`, with `,1` omitted the way git and GNU diff do.
fn format_range(start: usize, len: usize) -> String {
    if len == 1 {
        start.to_string()
    } else {
        format!("{start},{len}")
    }
}
