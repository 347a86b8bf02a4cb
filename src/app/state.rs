use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use super::command::{Command, CommandError, CommandSurface};
use super::panel::TabbedPanel;
use crate::config::LvConfig;
use crate::connection::{ConnectionManager, ConnectionStatus, FileEvent, TransportEvent};
use crate::editor::RenderTarget;
use crate::identity::FileIdentity;
use crate::listeners::ListenerHandle;
use crate::view::{FileView, ViewEvent, ViewId};

/// Left and right
pub const PANEL_COUNT: usize = 2;

/// Rows taken by the top bar, the bottom bar and a panel's tab strip
const CHROME_ROWS: u16 = 3;

/// Ticks a notification stays on screen (the loop ticks every ~100ms)
const NOTIFICATION_TICKS: u32 = 30;

// ── Enums ──

/// Work queued by manager and view callbacks, handled on the next drain
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    File { view: ViewId, event: FileEvent },
    View { panel: usize, event: ViewEvent },
    Connection(bool),
}

/// Whether keys navigate or go into the `:` prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Command,
}

/// Which panes are visible, decided from the panels' contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneLayout {
    /// Nothing open: a single placeholder pane
    Hidden,
    LeftOnly,
    RightOnly,
    Split,
}

impl PaneLayout {
    pub fn decide(left: bool, right: bool) -> Self {
        match (left, right) {
            (false, false) => PaneLayout::Hidden,
            (true, false) => PaneLayout::LeftOnly,
            (false, true) => PaneLayout::RightOnly,
            (true, true) => PaneLayout::Split,
        }
    }

    /// Column widths of the left and right pane in a body `width` wide
    pub fn widths(self, width: u16) -> [u16; 2] {
        match self {
            PaneLayout::Hidden => [0, 0],
            PaneLayout::LeftOnly => [width, 0],
            PaneLayout::RightOnly => [0, width],
            PaneLayout::Split => {
                let left = width / 2;
                [left, width - left]
            }
        }
    }
}

// ── App ──

pub struct App {
    manager: ConnectionManager,
    panels: Vec<TabbedPanel>,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
    next_view_id: u64,
    connection_listener: Option<ListenerHandle>,
    /// Base for relative paths typed at the prompt
    cwd: PathBuf,

    pub config: LvConfig,

    /// Panel receiving navigation keys
    pub focused: usize,

    /// Last connected flag reported by the manager
    pub connected: bool,

    pub input_mode: InputMode,

    /// Text typed at the `:` prompt
    pub command_input: String,

    /// Transient message shown in the top-right corner
    pub notification: Option<String>,
    notification_ticks: u32,

    pub should_quit: bool,
}

impl App {
    pub fn new(manager: ConnectionManager, config: LvConfig, cwd: PathBuf) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let tx = events_tx.clone();
        let connection_listener = manager.add_connection_listener(move |connected| {
            let _ = tx.send(AppEvent::Connection(*connected));
        });
        let connected = manager.is_connected();

        App {
            manager,
            panels: (0..PANEL_COUNT).map(TabbedPanel::new).collect(),
            events_tx,
            events_rx,
            next_view_id: 0,
            connection_listener: Some(connection_listener),
            cwd,
            config,
            focused: 0,
            connected,
            input_mode: InputMode::Normal,
            command_input: String::new(),
            notification: None,
            notification_ticks: 0,
            should_quit: false,
        }
    }

    // ── Accessors ──

    pub fn panels(&self) -> &[TabbedPanel] {
        &self.panels
    }

    pub fn panel(&self, index: usize) -> Option<&TabbedPanel> {
        self.panels.get(index)
    }

    pub fn focused_panel(&self) -> &TabbedPanel {
        &self.panels[self.focused]
    }

    fn focused_panel_mut(&mut self) -> &mut TabbedPanel {
        &mut self.panels[self.focused]
    }

    pub fn pane_layout(&self) -> PaneLayout {
        PaneLayout::decide(self.panels[0].has_content(), self.panels[1].has_content())
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn reconnect_in(&self) -> Option<Duration> {
        self.manager.reconnect_in(Instant::now())
    }

    // ── Event plumbing ──

    /// Start connecting; queued watches go out once the socket opens
    pub fn connect(&mut self) {
        self.manager.connect();
        self.process_events();
    }

    /// Feed one transport event to the manager and fully handle its fallout
    /// before returning.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        self.manager.handle_event(event);
        self.process_events();
    }

    /// Fire due timers (reconnect)
    pub fn poll_timers(&mut self, now: Instant) {
        self.manager.poll_timers(now);
        self.process_events();
    }

    /// Drain queued app events, including ones queued while draining
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_app_event(event);
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::File { view, event } => {
                let target = self.panels.iter_mut().find_map(|p| p.view_mut(view));
                match target {
                    Some(file_view) => file_view.apply(&event),
                    None => tracing::debug!(?view, "event for closed view"),
                }
            }
            AppEvent::View { panel, event } => {
                let message = self.panels.get_mut(panel).and_then(|p| p.on_view_event(event));
                if let Some(message) = message {
                    self.notify(&message);
                    self.fix_focus();
                }
            }
            AppEvent::Connection(connected) => {
                if connected != self.connected {
                    self.notify(if connected { "Connected" } else { "Connection lost" });
                }
                self.connected = connected;
            }
        }
    }

    fn open_identity(&mut self, identity: FileIdentity, panel: usize) {
        let id = ViewId(self.next_view_id);
        self.next_view_id += 1;
        let manager = self.manager.clone();
        let tx = self.events_tx.clone();
        self.panels[panel].add_file(identity, move |identity| {
            let file_tx = tx.clone();
            let mut view = FileView::open(id, identity, &manager, move |event| {
                let _ = file_tx.send(AppEvent::File {
                    view: id,
                    event: event.clone(),
                });
            });
            view.add_listener(move |event| {
                let _ = tx.send(AppEvent::View {
                    panel,
                    event: *event,
                });
            });
            view
        });
        self.focused = panel;
    }

    /// Keep focus on a panel with tabs when there is one
    fn fix_focus(&mut self) {
        if self.focused_panel().has_content() {
            return;
        }
        if let Some(p) = self.panels.iter().find(|p| p.has_content()) {
            self.focused = p.index();
        }
    }

    // ── Layout ──

    /// Size every panel's editor for a terminal `width` x `height`
    pub fn layout(&mut self, width: u16, height: u16) {
        let body = height.saturating_sub(CHROME_ROWS);
        let widths = self.pane_layout().widths(width);
        for (panel, w) in self.panels.iter_mut().zip(widths) {
            panel.editor_mut().layout(w, body);
        }
    }

    // ── Navigation ──

    pub fn focus_left(&mut self) {
        if self.focused > 0 {
            self.focused -= 1;
        }
    }

    pub fn focus_right(&mut self) {
        if self.focused + 1 < self.panels.len() {
            self.focused += 1;
        }
    }

    pub fn next_tab(&mut self) {
        self.focused_panel_mut().next_tab();
    }

    pub fn prev_tab(&mut self) {
        self.focused_panel_mut().prev_tab();
    }

    pub fn toggle_mode(&mut self) {
        if let Some(mode) = self.focused_panel_mut().toggle_active_mode() {
            self.notify(mode.label());
        }
    }

    /// Re-request only the file in the focused tab
    pub fn refresh_active(&mut self) {
        let connected = self.manager.is_connected();
        let message = match self.focused_panel().active_view() {
            Some(view) if connected => {
                view.refresh();
                format!("Refreshing {}", view.identity().label())
            }
            Some(_) => "Not connected".to_string(),
            None => return,
        };
        self.notify(&message);
    }

    pub fn close_active_tab(&mut self) {
        if self.focused_panel_mut().remove_active().is_some() {
            self.fix_focus();
        }
    }

    pub fn cursor_down(&mut self) {
        self.focused_panel_mut().editor_mut().cursor_down();
    }

    pub fn cursor_up(&mut self) {
        self.focused_panel_mut().editor_mut().cursor_up();
    }

    pub fn scroll_down(&mut self, amount: u16) {
        self.focused_panel_mut().editor_mut().scroll_down(amount);
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.focused_panel_mut().editor_mut().scroll_up(amount);
    }

    pub fn scroll_right(&mut self, amount: u16) {
        self.focused_panel_mut().editor_mut().scroll_right(amount);
    }

    pub fn scroll_left(&mut self, amount: u16) {
        self.focused_panel_mut().editor_mut().scroll_left(amount);
    }

    pub fn clear_highlight(&mut self) {
        self.focused_panel_mut().editor_mut().clear_decorations();
    }

    // ── Command prompt ──

    pub fn start_command(&mut self) {
        self.input_mode = InputMode::Command;
        self.command_input.clear();
    }

    pub fn cancel_command(&mut self) {
        self.input_mode = InputMode::Normal;
        self.command_input.clear();
    }

    pub fn submit_command(&mut self) {
        let input = std::mem::take(&mut self.command_input);
        self.input_mode = InputMode::Normal;
        if !input.trim().is_empty() {
            self.run_command(&input);
        }
    }

    /// Parse and run one command line, reporting failures as notifications
    pub fn run_command(&mut self, input: &str) {
        let result = match Command::parse(input) {
            Ok(Command::Quit) => {
                self.should_quit = true;
                Ok(())
            }
            Ok(command) => {
                let command = command.resolve(&self.cwd);
                command.apply(self)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(input, error = %e, "command failed");
            self.notify(&e.to_string());
        }
    }

    // ── Lifecycle ──

    /// Unwatch everything and close the connection for good
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.connection_listener.take() {
            self.manager.remove_connection_listener(handle);
        }
        self.close_all();
        self.manager.disconnect();
    }

    // ── Notifications ──

    pub fn notify(&mut self, msg: &str) {
        self.notification = Some(msg.to_string());
        self.notification_ticks = 0;
    }

    /// Called on every event loop iteration; clears stale notifications
    pub fn tick(&mut self) {
        if self.notification.is_some() {
            self.notification_ticks += 1;
            if self.notification_ticks > NOTIFICATION_TICKS {
                self.notification = None;
                self.notification_ticks = 0;
            }
        }
    }
}

fn identity_of(filepath: &str, prev: Option<&str>, curr: Option<&str>) -> FileIdentity {
    FileIdentity::new(filepath, prev.map(String::from), curr.map(String::from))
}

impl CommandSurface for App {
    fn open(
        &mut self,
        filepath: &str,
        panel: usize,
        prev: Option<&str>,
        curr: Option<&str>,
    ) -> Result<(), CommandError> {
        if panel >= self.panels.len() {
            return Err(CommandError::InvalidPanel {
                index: panel,
                count: self.panels.len(),
            });
        }
        self.open_identity(identity_of(filepath, prev, curr), panel);
        Ok(())
    }

    fn close(&mut self, filepath: &str, prev: Option<&str>, curr: Option<&str>) {
        let identity = identity_of(filepath, prev, curr);
        let mut removed = false;
        for panel in &mut self.panels {
            removed |= panel.remove_file(&identity);
        }
        if removed {
            self.fix_focus();
        } else {
            tracing::debug!(path = filepath, "close: not open");
        }
    }

    fn close_all(&mut self) {
        for panel in &mut self.panels {
            panel.clear();
        }
        self.focused = 0;
    }

    fn highlight(
        &mut self,
        filepath: &str,
        line: usize,
        prev: Option<&str>,
        curr: Option<&str>,
    ) -> bool {
        let identity = identity_of(filepath, prev, curr);
        match self.panels.iter().position(|p| p.find(&identity).is_some()) {
            Some(index) => {
                self.focused = index;
                self.panels[index].highlight(&identity, line)
            }
            None => {
                tracing::warn!(path = filepath, line, "highlight: file is not open");
                self.notify(&format!("{} is not open", identity.label()));
                false
            }
        }
    }

    fn refresh(&mut self) {
        if self.manager.is_connected() {
            self.manager.refresh();
            self.notify("Refreshing");
        } else {
            self.notify("Not connected");
        }
    }
}
