//! Property tests for the pure diff layer.

use std::collections::BTreeMap;

use proptest::prelude::*;

use patchcap::core::patch::PatchDocument;
use patchcap::core::scanner::scan;
use patchcap::core::snapshot::SnapshotDiffer;
use patchcap::core::types::ContentSnapshot;
use patchcap::io::validator::validate_structure;

/// File contents built from short lines over a tiny alphabet, so diffs have
/// plenty of shared context. The last line may lack its newline.
fn contents() -> impl Strategy<Value = String> {
    (prop::collection::vec("[abc]{0,3}", 0..8), any::<bool>()).prop_map(|(lines, trailing)| {
        let mut text = lines.join("\n");
        if trailing && !text.is_empty() {
            text.push('\n');
        }
        text
    })
}

fn snapshot() -> impl Strategy<Value = ContentSnapshot> {
    prop::collection::btree_map("[a-e]\\.txt|dir/[a-c]\\.py", contents(), 0..5)
}

proptest! {
    #[test]
    fn identical_snapshots_produce_empty_diff(before in snapshot()) {
        prop_assert_eq!(SnapshotDiffer::default().diff(&before, &before), "");
    }

    #[test]
    fn one_entry_per_differing_path(before in snapshot(), after in snapshot()) {
        let differing = before
            .keys()
            .chain(after.keys())
            .filter(|path| before.get(*path) != after.get(*path))
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        let diff = SnapshotDiffer::default().diff(&before, &after);
        if differing == 0 {
            prop_assert_eq!(diff, "");
        } else {
            let doc = PatchDocument::parse(&diff).expect("snapshot diff parses");
            prop_assert_eq!(doc.len(), differing);
            prop_assert!(validate_structure(&diff).ok);
        }
    }

    #[test]
    fn snapshot_diff_renders_back_byte_identical(
        before in snapshot(),
        after in snapshot(),
        context in 0usize..4,
    ) {
        let diff = SnapshotDiffer::new(context).diff(&before, &after);
        prop_assume!(!diff.is_empty());
        let doc = PatchDocument::parse(&diff).expect("snapshot diff parses");
        prop_assert_eq!(doc.render(), diff);
    }

    #[test]
    fn scan_finds_every_embedded_block(paths in prop::collection::vec("[a-z]{1,6}\\.py", 0..4)) {
        let mut response = String::from("Here is the plan.\n");
        for path in &paths {
            response.push_str(&format!("Editing file: {path}\n"));
            response.push_str(&format!("```diff\n--- a/{path}\n+++ b/{path}\n```\n"));
        }
        let changes: Vec<_> = scan(&response).collect();
        prop_assert_eq!(changes.len(), paths.len() * 2);

        let mentioned: Vec<&str> = changes.iter().filter_map(|c| c.path()).collect();
        let expected: Vec<&str> = paths.iter().map(String::as_str).collect();
        prop_assert_eq!(mentioned, expected);
    }
}

#[test]
fn single_file_snapshot_change_has_one_entry() {
    let before: ContentSnapshot = BTreeMap::from([("a.txt".to_string(), "x\n".to_string())]);
    let after: ContentSnapshot = BTreeMap::from([("a.txt".to_string(), "y\n".to_string())]);
    let doc = SnapshotDiffer::default().diff_document(&before, &after);
    assert_eq!(doc.paths(), vec!["a.txt"]);
    assert_eq!(doc.stats(), (1, 1));
}

#[test]
fn response_with_one_block_and_two_mentions_yields_three_entries() {
    let response = "Editing file: foo.py\n\
                    ```diff\n--- a/foo.py\n+++ b/foo.py\n```\n\
                    Editing file: foo.py\n";
    let changes: Vec<_> = scan(response).collect();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].path(), Some("foo.py"));
    assert_eq!(changes[2].path(), Some("foo.py"));
}
