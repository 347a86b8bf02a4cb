use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::editor_view;
use super::highlight::Highlighter;
use super::styles;
use super::utils::truncate;
use crate::app::TabbedPanel;
use crate::config::DisplayConfig;

/// Longest tab label before it is cut
const MAX_TAB_LABEL: usize = 32;

/// Render one panel: tab strip on top, editor below
pub fn render(
    f: &mut Frame,
    area: Rect,
    panel: &TabbedPanel,
    focused: bool,
    display: &DisplayConfig,
    hl: &Highlighter,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    render_tab_strip(f, chunks[0], panel, focused);
    editor_view::render(f, chunks[1], panel.editor(), display, hl);
}

fn render_tab_strip(f: &mut Frame, area: Rect, panel: &TabbedPanel, focused: bool) {
    let mut spans: Vec<Span> = vec![Span::styled(
        format!(" {} ", panel.index()),
        if focused {
            Style::default().fg(styles::BLUE)
        } else {
            styles::dim_style()
        },
    )];

    let active = panel.active_index();
    let labels = panel.tab_labels();
    for (i, label) in labels.iter().enumerate() {
        let label = format!(" {} ", truncate(label, MAX_TAB_LABEL));
        if Some(i) == active {
            spans.push(Span::styled(label, styles::active_tab_style(focused)));
        } else {
            spans.push(Span::styled(label, Style::default().fg(styles::MUTED)));
        }
        if i + 1 < labels.len() {
            spans.push(Span::styled("│", Style::default().fg(styles::BORDER)));
        }
    }

    if let Some(view) = panel.active_view() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!(" {} ", view.mode().label()), styles::mode_badge_style()));
    }

    let strip = Paragraph::new(Line::from(spans)).style(styles::bar_style());
    f.render_widget(strip, area);
}
