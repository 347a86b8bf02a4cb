use ratatui::style::{Color, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

const THEME: &str = "base16-ocean.dark";

/// Syntax set and theme, loaded once and shared by every editor
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    pub fn new() -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set.themes.remove(THEME).unwrap_or_default();
        Highlighter {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    fn syntax_for(&self, path: &str) -> &SyntaxReference {
        self.syntax_set
            .find_syntax_for_file(path)
            .ok()
            .flatten()
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }

    /// Highlight one line of `path`, layering syntax colors on `base_style`
    /// so add/delete backgrounds survive.
    ///
    /// Lines are highlighted independently: only visible rows are drawn, so
    /// multi-line constructs (block comments, strings) may be coloured from
    /// their first visible line.
    pub fn highlight_line(&self, line: &str, path: &str, base_style: Style) -> Vec<Span<'static>> {
        let mut highlighter = HighlightLines::new(self.syntax_for(path), &self.theme);

        // syntect needs a trailing newline
        let input = format!("{}\n", line);

        match highlighter.highlight_line(&input, &self.syntax_set) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|(syn_style, text)| {
                    let fg = Color::Rgb(
                        syn_style.foreground.r,
                        syn_style.foreground.g,
                        syn_style.foreground.b,
                    );
                    Span::styled(text.trim_end_matches('\n').to_string(), base_style.fg(fg))
                })
                .filter(|span| !span.content.is_empty())
                .collect(),
            Err(e) => {
                tracing::debug!(path, error = %e, "highlight failed");
                vec![Span::styled(line.to_string(), base_style)]
            }
        }
    }
}
