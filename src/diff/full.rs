use similar::{ChangeTag, TextDiff};

use super::{DiffHunk, DiffLine, DiffModel, LineKind};

/// Line diff of two complete file versions, keeping every unchanged line.
/// The result is one hunk spanning both files.
pub fn full_diff(path: &str, original: &str, modified: &str) -> DiffModel {
    let diff = TextDiff::from_lines(original, modified);
    let mut lines = Vec::new();
    let (mut adds, mut dels) = (0, 0);

    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => LineKind::Context,
            ChangeTag::Insert => {
                adds += 1;
                LineKind::Add
            }
            ChangeTag::Delete => {
                dels += 1;
                LineKind::Remove
            }
        };
        lines.push(DiffLine {
            kind,
            text: change.value().trim_end_matches(['\n', '\r']).to_string(),
            old_line: change.old_index().map(|i| i + 1),
            new_line: change.new_index().map(|i| i + 1),
        });
    }

    let old_count = original.lines().count();
    let new_count = modified.lines().count();
    let hunks = if lines.is_empty() {
        Vec::new()
    } else {
        vec![DiffHunk {
            header: format!("@@ -1,{} +1,{} @@", old_count, new_count),
            old_start: 1,
            old_count,
            new_start: 1,
            new_count,
            lines,
        }]
    };

    DiffModel {
        path: path.to_string(),
        hunks,
        adds,
        dels,
    }
}
