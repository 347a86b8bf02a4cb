use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::highlight::Highlighter;
use super::styles;
use super::utils::expand_tabs;
use crate::config::DisplayConfig;
use crate::diff::LineKind;
use crate::editor::{EditorPane, Row, RowKind};

/// Render the visible slice of an editor's rows
pub fn render(f: &mut Frame, area: Rect, editor: &EditorPane, display: &DisplayConfig, hl: &Highlighter) {
    let path = editor.path().unwrap_or("");
    let start = usize::from(editor.scroll);
    let height = usize::from(area.height);

    let lines: Vec<Line> = editor
        .rows()
        .iter()
        .enumerate()
        .skip(start)
        .take(height)
        .map(|(i, row)| {
            let decoration = if editor.highlighted() == Some(i) {
                Some(styles::HIGHLIGHT_BG)
            } else if editor.cursor() == Some(i) {
                Some(styles::CURSOR_BG)
            } else {
                None
            };
            render_row(row, path, display, hl, decoration)
        })
        .collect();

    let block = Block::default()
        .borders(Borders::NONE)
        .style(styles::default_style());

    // Rows are pre-sliced, so only the horizontal offset applies
    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((0, editor.h_scroll));

    f.render_widget(paragraph, area);
}

fn render_row(
    row: &Row,
    path: &str,
    display: &DisplayConfig,
    hl: &Highlighter,
    decoration: Option<ratatui::style::Color>,
) -> Line<'static> {
    let text = expand_tabs(&row.text, display.tab_width);
    let decorate = |style: Style| match decoration {
        Some(bg) => style.bg(bg),
        None => style,
    };

    match row.kind {
        RowKind::Info => Line::from(Span::styled(
            format!("  {}", text),
            Style::default().fg(styles::MUTED),
        )),
        RowKind::Error => Line::from(vec![
            Span::styled("  ✗ ", styles::error_style()),
            Span::styled(text, styles::error_style()),
        ]),
        RowKind::FileHeader => Line::from(Span::styled(format!(" {}", text), styles::file_header_style())),
        RowKind::HunkHeader => {
            Line::from(Span::styled(format!(" {}", text), styles::hunk_header_style()))
                .style(styles::hunk_header_style())
        }
        RowKind::Text => {
            let base = decorate(styles::default_style());
            let mut spans = Vec::new();
            if display.line_numbers {
                spans.push(Span::styled(format!("{:>5} │ ", num(row.new_line)), decorate(styles::dim_style())));
            }
            spans.extend(hl.highlight_line(&text, path, base));
            Line::from(spans).style(base)
        }
        RowKind::Diff(kind) => {
            let (prefix, base, gutter) = match kind {
                LineKind::Add => ("+", styles::add_style(), styles::dim_style().bg(styles::ADD_BG)),
                LineKind::Remove => ("-", styles::del_style(), styles::dim_style().bg(styles::DEL_BG)),
                LineKind::Context => (" ", styles::default_style(), styles::dim_style()),
            };
            let base = decorate(base);
            let mut spans = Vec::new();
            if display.line_numbers {
                spans.push(Span::styled(
                    format!("{:>4} {:>4} │", num(row.old_line), num(row.new_line)),
                    decorate(gutter),
                ));
            }
            spans.push(Span::styled(prefix, base));
            if !text.is_empty() {
                spans.extend(hl.highlight_line(&text, path, base));
            }
            Line::from(spans).style(base)
        }
    }
}

fn num(n: Option<usize>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}
