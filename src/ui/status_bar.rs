use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::styles;
use super::utils::truncate;
use crate::app::{App, InputMode};
use crate::connection::ConnectionStatus;

/// Compute the display width of a list of spans
fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.content.chars().count()).sum()
}

/// Connection indicator for the top bar
fn connection_spans(app: &App) -> Vec<Span<'static>> {
    let status = app.connection_status();
    let (dot, label) = match status {
        ConnectionStatus::Connected => ("● ", "connected".to_string()),
        ConnectionStatus::Connecting => ("◌ ", "connecting…".to_string()),
        ConnectionStatus::Disconnected => match app.reconnect_in() {
            Some(wait) => ("○ ", format!("disconnected, retry in {}s", wait.as_secs() + 1)),
            None => ("○ ", "disconnected".to_string()),
        },
    };
    let style = styles::connection_style(status);
    vec![
        Span::styled(dot, style),
        Span::styled(label, style.remove_modifier(ratatui::style::Modifier::BOLD)),
    ]
}

/// Render the top status bar
///
///   lv · server-url                     a.txt (main..HEAD) · DIFF   ● connected
pub fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let bar_width = usize::from(area.width);

    let mut left: Vec<Span> = vec![
        Span::styled(
            " lv",
            Style::default()
                .fg(styles::CYAN)
                .add_modifier(ratatui::style::Modifier::BOLD),
        ),
        Span::styled(" · ", Style::default().fg(styles::BORDER)),
        Span::styled(app.config.server.url.clone(), styles::dim_style()),
    ];

    let mut right: Vec<Span> = Vec::new();
    if let Some(view) = app.focused_panel().active_view() {
        right.push(Span::styled(
            view.identity().label(),
            Style::default().fg(styles::BRIGHT),
        ));
        right.push(Span::styled(" · ", Style::default().fg(styles::BORDER)));
        right.push(Span::styled(view.mode().label(), Style::default().fg(styles::CYAN)));
        right.push(Span::raw("   "));
    }
    right.extend(connection_spans(app));
    right.push(Span::raw(" "));

    let used = spans_width(&left) + spans_width(&right);
    if used < bar_width {
        left.push(Span::raw(" ".repeat(bar_width - used)));
    }
    left.extend(right);

    let bar = Paragraph::new(Line::from(left)).style(styles::bar_style());
    f.render_widget(bar, area);
}

struct Hint {
    key: &'static str,
    label: &'static str,
}

impl Hint {
    const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }

    fn width(&self) -> usize {
        self.key.chars().count() + self.label.chars().count()
    }
}

const HINTS: &[Hint] = &[
    Hint::new(":", " command "),
    Hint::new("Tab", " next tab "),
    Hint::new("h/l", " panel "),
    Hint::new("m", " mode "),
    Hint::new("j/k", " move "),
    Hint::new("^d/^u", " scroll "),
    Hint::new("x", " close "),
    Hint::new("X", " close all "),
    Hint::new("r/R", " refresh all/file "),
    Hint::new("q", " quit "),
];

/// Hints that fit in one row of `width`
fn hint_line(width: usize) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = vec![Span::raw(" ")];
    let mut used = 1;
    for hint in HINTS {
        if used + hint.width() > width {
            break;
        }
        spans.push(Span::styled(hint.key, styles::key_hint_style()));
        spans.push(Span::styled(hint.label, styles::dim_style()));
        used += hint.width();
    }
    Line::from(spans)
}

/// Render the bottom bar: key hints, or the command prompt while typing
pub fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let line = match app.input_mode {
        InputMode::Command => Line::from(vec![
            Span::styled(
                " : ",
                Style::default()
                    .fg(styles::BG)
                    .bg(styles::BLUE)
                    .add_modifier(ratatui::style::Modifier::BOLD),
            ),
            Span::styled(format!(" {}", app.command_input), Style::default().fg(styles::TEXT)),
            Span::styled("█", Style::default().fg(styles::BLUE)),
            Span::styled("  ", Style::default()),
            Span::styled("Enter", styles::key_hint_style()),
            Span::styled(" run  ", styles::dim_style()),
            Span::styled("Esc", styles::key_hint_style()),
            Span::styled(" cancel", styles::dim_style()),
        ]),
        InputMode::Normal => hint_line(usize::from(area.width)),
    };
    let bar = Paragraph::new(line).style(styles::bar_style());
    f.render_widget(bar, area);
}

/// Transient notification in the top-right corner, below the top bar
pub fn render_notification(f: &mut Frame, area: Rect, message: &str) {
    let max = usize::from(area.width.saturating_sub(8));
    let message = truncate(message, max);
    let width = u16::try_from(message.chars().count() + 4).unwrap_or(area.width);

    let notif_area = Rect {
        x: area.x + area.width.saturating_sub(width + 2),
        y: area.y + 1,
        width: width.min(area.width),
        height: 1,
    };

    let notif = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(styles::GREEN)),
        Span::styled(message, Style::default().fg(styles::TEXT)),
        Span::raw(" "),
    ]))
    .style(Style::default().bg(styles::PANEL).fg(styles::TEXT));

    f.render_widget(notif, notif_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_line_fits_width() {
        for width in [0, 10, 40, 200] {
            let line = hint_line(width);
            assert!(spans_width(&line.spans) <= width.max(1));
        }
    }
}
