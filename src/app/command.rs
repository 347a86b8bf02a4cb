use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no panel {index} (valid: 0..{count})")]
    InvalidPanel { index: usize, count: usize },
    #[error("{0}")]
    Parse(String),
}

/// Operations an embedder (the `:` prompt, the CLI) drives the viewer with
pub trait CommandSurface {
    fn open(
        &mut self,
        filepath: &str,
        panel: usize,
        prev: Option<&str>,
        curr: Option<&str>,
    ) -> Result<(), CommandError>;

    /// Remove the file from every panel holding it
    fn close(&mut self, filepath: &str, prev: Option<&str>, curr: Option<&str>);

    fn close_all(&mut self);

    /// Focus the file and mark `line`. False when the file is not open anywhere.
    fn highlight(&mut self, filepath: &str, line: usize, prev: Option<&str>, curr: Option<&str>)
        -> bool;

    /// Ask the server to re-push every watched file
    fn refresh(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        path: String,
        panel: usize,
        prev: Option<String>,
        curr: Option<String>,
    },
    Close {
        path: String,
        prev: Option<String>,
        curr: Option<String>,
    },
    CloseAll,
    Highlight {
        path: String,
        line: usize,
        prev: Option<String>,
        curr: Option<String>,
    },
    Refresh,
    Quit,
}

impl Command {
    /// Parse a prompt line such as `open src/main.rs 1 main HEAD`.
    /// Revisions may be `-` for none; paths with spaces go in double quotes.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let words = tokenize(input)?;
        let Some((name, args)) = words.split_first() else {
            return Err(CommandError::Parse("empty command".to_string()));
        };

        match name.as_str() {
            "open" | "o" => {
                expect_args(name, args, 1, 4)?;
                let panel = match args.get(1) {
                    Some(raw) => raw.parse().map_err(|_| {
                        CommandError::Parse(format!("invalid panel index '{}'", raw))
                    })?,
                    None => 0,
                };
                Ok(Command::Open {
                    path: args[0].clone(),
                    panel,
                    prev: revision(args.get(2)),
                    curr: revision(args.get(3)),
                })
            }
            "close" | "c" => {
                expect_args(name, args, 1, 3)?;
                Ok(Command::Close {
                    path: args[0].clone(),
                    prev: revision(args.get(1)),
                    curr: revision(args.get(2)),
                })
            }
            "closeall" => {
                expect_args(name, args, 0, 0)?;
                Ok(Command::CloseAll)
            }
            "highlight" | "hl" => {
                expect_args(name, args, 2, 4)?;
                let line = args[1]
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| CommandError::Parse(format!("invalid line number '{}'", args[1])))?;
                Ok(Command::Highlight {
                    path: args[0].clone(),
                    line,
                    prev: revision(args.get(2)),
                    curr: revision(args.get(3)),
                })
            }
            "refresh" => {
                expect_args(name, args, 0, 0)?;
                Ok(Command::Refresh)
            }
            "quit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Parse(format!("unknown command '{}'", other))),
        }
    }

    /// Make relative paths absolute against `base`. The server addresses
    /// files by absolute path, so relative ones would never be matched.
    pub fn resolve(self, base: &Path) -> Self {
        match self {
            Command::Open { path, panel, prev, curr } => Command::Open {
                path: absolute(base, &path),
                panel,
                prev,
                curr,
            },
            Command::Close { path, prev, curr } => Command::Close {
                path: absolute(base, &path),
                prev,
                curr,
            },
            Command::Highlight { path, line, prev, curr } => Command::Highlight {
                path: absolute(base, &path),
                line,
                prev,
                curr,
            },
            other => other,
        }
    }

    /// Run the command against `surface`. `Quit` is left to the caller.
    pub fn apply(self, surface: &mut dyn CommandSurface) -> Result<(), CommandError> {
        match self {
            Command::Open {
                path,
                panel,
                prev,
                curr,
            } => surface.open(&path, panel, prev.as_deref(), curr.as_deref()),
            Command::Close { path, prev, curr } => {
                surface.close(&path, prev.as_deref(), curr.as_deref());
                Ok(())
            }
            Command::CloseAll => {
                surface.close_all();
                Ok(())
            }
            Command::Highlight {
                path,
                line,
                prev,
                curr,
            } => {
                surface.highlight(&path, line, prev.as_deref(), curr.as_deref());
                Ok(())
            }
            Command::Refresh => {
                surface.refresh();
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }
}

/// `path` joined onto `base` unless it is already absolute
pub fn absolute(base: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        base.join(p).to_string_lossy().into_owned()
    }
}

fn expect_args(name: &str, args: &[String], min: usize, max: usize) -> Result<(), CommandError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{}-{}", min, max)
        };
        return Err(CommandError::Parse(format!(
            "'{}' takes {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn revision(arg: Option<&String>) -> Option<String> {
    arg.filter(|s| s.as_str() != "-").cloned()
}

fn tokenize(input: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if in_quotes {
        return Err(CommandError::Parse("unterminated quote".to_string()));
    }
    if has_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_open_defaults() {
        assert_eq!(
            Command::parse("open /a.txt").unwrap(),
            Command::Open {
                path: "/a.txt".to_string(),
                panel: 0,
                prev: None,
                curr: None
            }
        );
    }

    #[test]
    fn parse_open_with_panel_and_revisions() {
        assert_eq!(
            Command::parse("open /a.txt 1 - HEAD").unwrap(),
            Command::Open {
                path: "/a.txt".to_string(),
                panel: 1,
                prev: None,
                curr: Some("HEAD".to_string())
            }
        );
    }

    #[test]
    fn parse_quoted_path() {
        match Command::parse(r#"close "/my docs/notes.md" main"#).unwrap() {
            Command::Close { path, prev, curr } => {
                assert_eq!(path, "/my docs/notes.md");
                assert_eq!(prev.as_deref(), Some("main"));
                assert_eq!(curr, None);
            }
            other => panic!("Expected Close, got {:?}", other),
        }
    }

    #[test]
    fn parse_highlight() {
        assert_eq!(
            Command::parse("hl /a.txt 42").unwrap(),
            Command::Highlight {
                path: "/a.txt".to_string(),
                line: 42,
                prev: None,
                curr: None
            }
        );
        assert!(matches!(Command::parse("highlight /a.txt 0"), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse("highlight /a.txt x"), Err(CommandError::Parse(_))));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(Command::parse(""), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse("frobnicate"), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse("open"), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse("open /a x"), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse("closeall now"), Err(CommandError::Parse(_))));
        assert!(matches!(Command::parse(r#"open "/a"#), Err(CommandError::Parse(_))));
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(Command::parse("closeall").unwrap(), Command::CloseAll);
        assert_eq!(Command::parse("  refresh ").unwrap(), Command::Refresh);
        assert_eq!(Command::parse("q").unwrap(), Command::Quit);
    }

    #[test]
    fn invalid_panel_message() {
        let err = CommandError::InvalidPanel { index: 5, count: 2 };
        assert_eq!(err.to_string(), "no panel 5 (valid: 0..2)");
    }

    #[test]
    fn absolute_resolves_relative_paths() {
        let base = Path::new("/work");
        assert_eq!(absolute(base, "src/main.rs"), "/work/src/main.rs");
        assert_eq!(absolute(base, "/etc/hosts"), "/etc/hosts");
    }

    #[test]
    fn resolve_makes_command_paths_absolute() {
        let base = Path::new("/work");
        let open = Command::parse("open src/main.rs 1 main").unwrap().resolve(base);
        assert_eq!(
            open,
            Command::Open {
                path: "/work/src/main.rs".to_string(),
                panel: 1,
                prev: Some("main".to_string()),
                curr: None
            }
        );
        let hl = Command::parse("hl lib.rs 3").unwrap().resolve(base);
        assert!(matches!(hl, Command::Highlight { path, line: 3, .. } if path == "/work/lib.rs"));
        let close = Command::parse("close /abs.rs").unwrap().resolve(base);
        assert!(matches!(close, Command::Close { path, .. } if path == "/abs.rs"));
        assert_eq!(Command::parse("refresh").unwrap().resolve(base), Command::Refresh);
    }

    #[derive(Default)]
    struct Recording {
        calls: Vec<String>,
    }

    impl CommandSurface for Recording {
        fn open(
            &mut self,
            filepath: &str,
            panel: usize,
            prev: Option<&str>,
            curr: Option<&str>,
        ) -> Result<(), CommandError> {
            self.calls.push(format!("open {} {} {:?} {:?}", filepath, panel, prev, curr));
            if panel > 1 {
                return Err(CommandError::InvalidPanel { index: panel, count: 2 });
            }
            Ok(())
        }
        fn close(&mut self, filepath: &str, _prev: Option<&str>, _curr: Option<&str>) {
            self.calls.push(format!("close {}", filepath));
        }
        fn close_all(&mut self) {
            self.calls.push("closeall".to_string());
        }
        fn highlight(&mut self, filepath: &str, line: usize, _p: Option<&str>, _c: Option<&str>) -> bool {
            self.calls.push(format!("highlight {} {}", filepath, line));
            true
        }
        fn refresh(&mut self) {
            self.calls.push("refresh".to_string());
        }
    }

    #[test]
    fn apply_forwards_to_surface() {
        let mut surface = Recording::default();
        Command::parse("open /a 1 main").unwrap().apply(&mut surface).unwrap();
        Command::parse("hl /a 3").unwrap().apply(&mut surface).unwrap();
        Command::parse("refresh").unwrap().apply(&mut surface).unwrap();
        Command::parse("quit").unwrap().apply(&mut surface).unwrap();
        assert_eq!(
            surface.calls,
            vec![
                r#"open /a 1 Some("main") None"#.to_string(),
                "highlight /a 3".to_string(),
                "refresh".to_string(),
            ]
        );
        let err = Command::parse("open /a 4").unwrap().apply(&mut surface);
        assert_eq!(err, Err(CommandError::InvalidPanel { index: 4, count: 2 }));
    }
}
