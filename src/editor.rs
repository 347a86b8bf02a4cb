use crate::diff::{DiffModel, LineKind};

/// What an editor surface is asked to show
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayModel {
    /// Placeholder message (nothing loaded, no changes, ...)
    Empty(String),
    Content { path: String, text: String },
    Diff(DiffModel),
    FullDiff(DiffModel),
    Error(String),
}

impl Default for DisplayModel {
    fn default() -> Self {
        DisplayModel::Empty(String::new())
    }
}

/// Cursor and scroll position, saved per file and mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub scroll: u16,
    pub h_scroll: u16,
    pub cursor: Option<usize>,
}

/// The editor capability a FileView displays itself into
pub trait RenderTarget {
    fn set_model(&mut self, model: DisplayModel);
    fn save_view_state(&self) -> ViewState;
    fn restore_view_state(&mut self, state: &ViewState);
    fn layout(&mut self, width: u16, height: u16);
    /// Decorate the row showing `line` (1-based, new side) and scroll to it.
    /// Returns false if no row shows that line.
    fn highlight_line(&mut self, line: usize) -> bool;
    fn clear_decorations(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    FileHeader,
    HunkHeader,
    Diff(LineKind),
    Text,
    Info,
    Error,
}

/// One displayed row of the current model
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
    pub text: String,
}

impl Row {
    fn plain(kind: RowKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            old_line: None,
            new_line: None,
            text: text.into(),
        }
    }
}

/// Terminal editor surface: flattened rows plus cursor, scroll and decorations
#[derive(Debug, Default)]
pub struct EditorPane {
    model: DisplayModel,
    rows: Vec<Row>,
    pub scroll: u16,
    pub h_scroll: u16,
    cursor: Option<usize>,
    highlighted: Option<usize>,
    width: u16,
    height: u16,
}

impl EditorPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &DisplayModel {
        &self.model
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// Rows visible at once, as last laid out
    pub fn viewport_height(&self) -> u16 {
        self.height
    }

    /// Path used for syntax detection, when the model has one
    pub fn path(&self) -> Option<&str> {
        match &self.model {
            DisplayModel::Content { path, .. } => Some(path),
            DisplayModel::Diff(d) | DisplayModel::FullDiff(d) => Some(&d.path),
            _ => None,
        }
    }

    // ── Navigation ──

    pub fn cursor_down(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let next = match self.cursor {
            None => 0,
            Some(row) => (row + 1).min(self.rows.len() - 1),
        };
        self.cursor = Some(next);
        self.ensure_visible(next);
    }

    pub fn cursor_up(&mut self) {
        if let Some(row) = self.cursor {
            let prev = row.saturating_sub(1);
            self.cursor = Some(prev);
            self.ensure_visible(prev);
        }
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(amount).min(max);
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_sub(amount);
    }

    pub fn scroll_right(&mut self, amount: u16) {
        // Stop once the longest row is half off-screen
        let longest = self.rows.iter().map(|r| r.text.chars().count()).max().unwrap_or(0);
        let max = longest.saturating_sub(usize::from(self.width / 2));
        let max = u16::try_from(max).unwrap_or(u16::MAX);
        self.h_scroll = self.h_scroll.saturating_add(amount).min(max);
    }

    pub fn scroll_left(&mut self, amount: u16) {
        self.h_scroll = self.h_scroll.saturating_sub(amount);
    }

    fn max_scroll(&self) -> u16 {
        u16::try_from(self.rows.len().saturating_sub(1)).unwrap_or(u16::MAX)
    }

    fn ensure_visible(&mut self, row: usize) {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        let height = self.height.max(1);
        if row < self.scroll {
            self.scroll = row;
        } else if row >= self.scroll.saturating_add(height) {
            self.scroll = row.saturating_sub(height - 1);
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows = match &self.model {
            DisplayModel::Empty(msg) => vec![Row::plain(RowKind::Info, msg.clone())],
            DisplayModel::Error(msg) => msg
                .lines()
                .map(|l| Row::plain(RowKind::Error, l))
                .collect(),
            DisplayModel::Content { text, .. } => text
                .lines()
                .enumerate()
                .map(|(i, l)| Row {
                    kind: RowKind::Text,
                    old_line: None,
                    new_line: Some(i + 1),
                    text: l.to_string(),
                })
                .collect(),
            DisplayModel::Diff(diff) | DisplayModel::FullDiff(diff) => diff_rows(diff),
        };
    }
}

fn diff_rows(diff: &DiffModel) -> Vec<Row> {
    let mut rows = vec![Row::plain(
        RowKind::FileHeader,
        format!("{}  +{} -{}", diff.path, diff.adds, diff.dels),
    )];
    for hunk in &diff.hunks {
        rows.push(Row::plain(RowKind::HunkHeader, hunk.header.clone()));
        rows.extend(hunk.lines.iter().map(|line| Row {
            kind: RowKind::Diff(line.kind),
            old_line: line.old_line,
            new_line: line.new_line,
            text: line.text.clone(),
        }));
    }
    rows
}

impl RenderTarget for EditorPane {
    fn set_model(&mut self, model: DisplayModel) {
        self.model = model;
        self.rebuild_rows();
        self.scroll = 0;
        self.h_scroll = 0;
        self.cursor = None;
        self.highlighted = None;
    }

    fn save_view_state(&self) -> ViewState {
        ViewState {
            scroll: self.scroll,
            h_scroll: self.h_scroll,
            cursor: self.cursor,
        }
    }

    fn restore_view_state(&mut self, state: &ViewState) {
        self.scroll = state.scroll.min(self.max_scroll());
        self.h_scroll = state.h_scroll;
        self.cursor = state.cursor.filter(|&row| row < self.rows.len());
    }

    fn layout(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    fn highlight_line(&mut self, line: usize) -> bool {
        let Some(row) = self.rows.iter().position(|r| r.new_line == Some(line)) else {
            return false;
        };
        self.highlighted = Some(row);
        self.cursor = Some(row);
        // Park the line a third of the way down the viewport
        let offset = usize::from(self.height / 3);
        self.scroll = u16::try_from(row.saturating_sub(offset)).unwrap_or(u16::MAX);
        true
    }

    fn clear_decorations(&mut self) {
        self.highlighted = None;
    }
}
