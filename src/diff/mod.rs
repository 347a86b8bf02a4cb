//! Diff models shown by the editor: parsed from the server's unified diff,
//! or computed locally from two full file versions.

mod full;
mod unified;

pub use full::full_diff;
pub use unified::parse_unified;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Remove,
}

/// One line of a hunk with its position on each side
#[derive(Debug, Clone, PartialEq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
    /// 1-based line in the base version, absent for additions
    pub old_line: Option<usize>,
    /// 1-based line in the target version, absent for removals
    pub new_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// Two-sided diff of one file, ready for display
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffModel {
    pub path: String,
    pub hunks: Vec<DiffHunk>,
    pub adds: usize,
    pub dels: usize,
}

impl DiffModel {
    pub fn has_changes(&self) -> bool {
        self.adds + self.dels > 0
    }
}
