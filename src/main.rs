mod app;
mod config;
mod connection;
mod diff;
mod editor;
mod identity;
mod listeners;
mod protocol;
mod ui;
mod view;

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{mpsc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::{absolute, App, CommandSurface, InputMode};
use clap::Parser;
use connection::{ConnectionManager, TransportEvent, WsTransport};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

/// Live file viewer: contents and diffs kept in sync with a watch server
#[derive(Parser)]
#[command(name = "lv", version, about)]
struct Cli {
    /// Files to open in the left panel
    files: Vec<String>,

    /// Files to open in the right panel
    #[arg(long = "right", value_name = "FILE")]
    right: Vec<String>,

    /// Base revision for every file opened from the command line
    #[arg(long)]
    prev: Option<String>,

    /// Target revision for every file opened from the command line
    #[arg(long)]
    curr: Option<String>,

    /// Watch server URL (overrides [server] url in config)
    #[arg(long)]
    url: Option<String>,
}

type Term = Terminal<CrosstermBackend<io::Stdout>>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;

    let mut config = config::load_config(&cwd);
    if let Some(url) = &cli.url {
        config.server.url = url.clone();
    }
    if let Err(e) = init_logging(&config.log) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }
    tracing::info!(url = %config.server.url, "starting");

    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>();
    let transport = WsTransport::new(config.server.url.clone(), event_tx)?;
    let manager = ConnectionManager::new(Box::new(transport), config.reconnect.policy());
    let mut app = App::new(manager, config, cwd.clone());

    // Subscribe before connecting so the first open carries every watch
    for (panel, paths) in [(0, &cli.files), (1, &cli.right)] {
        for path in paths {
            let path = absolute(&cwd, path);
            app.open(&path, panel, cli.prev.as_deref(), cli.curr.as_deref())?;
        }
    }
    app.connect();

    // Load syntax highlighting (once, reused for all files)
    let highlighter = ui::highlight::Highlighter::new();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let result = run_app(&mut terminal, &mut app, &highlighter, &event_rx);

    app.shutdown();

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!(error = %err, "event loop failed");
        eprintln!("Error: {:?}", err);
    }
    Ok(())
}

/// Log to a file so the terminal stays clean. `LV_LOG` overrides the level.
fn init_logging(config: &config::LogConfig) -> Result<()> {
    let path = config.path().context("No cache directory for the log file")?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Cannot open {}", path.display()))?;

    let filter = EnvFilter::try_from_env("LV_LOG")
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

fn run_app(
    terminal: &mut Term,
    app: &mut App,
    hl: &ui::highlight::Highlighter,
    events: &mpsc::Receiver<TransportEvent>,
) -> Result<()> {
    loop {
        // Layout follows terminal size and which panels have files
        let size = terminal.size()?;
        app.layout(size.width, size.height);
        terminal.draw(|f| ui::draw(f, app, hl))?;

        // Poll for input with a timeout (lets us process transport events too)
        if event::poll(Duration::from_millis(100))? {
            // Resize needs nothing here: the next iteration re-runs layout
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.input_mode {
                        InputMode::Command => handle_command_input(app, key),
                        InputMode::Normal => handle_normal_input(app, key),
                    }
                }
            }
        }

        // One transport event at a time, each handled completely
        while let Ok(event) = events.try_recv() {
            app.handle_transport_event(event);
        }

        app.poll_timers(Instant::now());

        // Expire notifications
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_normal_input(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let half_page = (app.focused_panel().editor().viewport_height() / 2).max(1);

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Char(':') => app.start_command(),

        // Tabs and panels
        KeyCode::Tab => app.next_tab(),
        KeyCode::BackTab => app.prev_tab(),
        KeyCode::Char('h') => app.focus_left(),
        KeyCode::Char('l') => app.focus_right(),

        KeyCode::Char('m') => app.toggle_mode(),
        KeyCode::Char('x') => app.close_active_tab(),
        KeyCode::Char('X') => app.close_all(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('R') => app.refresh_active(),

        // Navigation
        KeyCode::Char('d') if ctrl => app.scroll_down(half_page),
        KeyCode::Char('u') if ctrl => app.scroll_up(half_page),
        KeyCode::PageDown => app.scroll_down(half_page),
        KeyCode::PageUp => app.scroll_up(half_page),
        KeyCode::Char('j') | KeyCode::Down => app.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => app.cursor_up(),
        KeyCode::Right => app.scroll_right(4),
        KeyCode::Left => app.scroll_left(4),
        KeyCode::Esc => app.clear_highlight(),
        _ => {}
    }
}

fn handle_command_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_command(),
        KeyCode::Esc => app.cancel_command(),
        KeyCode::Backspace => {
            if app.command_input.pop().is_none() {
                app.cancel_command();
            }
        }
        KeyCode::Char(c) => app.command_input.push(c),
        _ => {}
    }
}
