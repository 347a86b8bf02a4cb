mod editor_view;
pub mod highlight;
mod panel;
mod status_bar;
mod styles;
mod utils;

use crate::app::{App, PaneLayout};
use highlight::Highlighter;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Render the entire UI. `App::layout` must have been called for this size.
pub fn draw(f: &mut Frame, app: &App, hl: &Highlighter) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // top bar
            Constraint::Min(1),    // panels
            Constraint::Length(1), // bottom bar
        ])
        .split(f.area());

    status_bar::render_top_bar(f, outer[0], app);

    let layout = app.pane_layout();
    if layout == PaneLayout::Hidden {
        render_placeholder(f, outer[1]);
    } else {
        let [left, right] = layout.widths(outer[1].width);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(left), Constraint::Length(right)])
            .split(outer[1]);
        for (i, column) in columns.iter().enumerate() {
            if column.width == 0 {
                continue;
            }
            if let Some(p) = app.panel(i) {
                panel::render(f, *column, p, app.focused == i, &app.config.display, hl);
            }
        }
    }

    status_bar::render_bottom_bar(f, outer[2], app);

    if let Some(ref msg) = app.notification {
        status_bar::render_notification(f, f.area(), msg);
    }
}

/// Shown while no panel has a file open
fn render_placeholder(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            "  No files open",
            ratatui::style::Style::default().fg(styles::MUTED),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  :open <path> [panel] [prev] [curr]",
            styles::dim_style(),
        )),
    ])
    .style(styles::default_style());

    f.render_widget(text, area);
}
