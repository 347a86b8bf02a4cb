mod command;
mod panel;
mod state;

pub use command::{absolute, CommandSurface};
pub use panel::TabbedPanel;
pub use state::{App, InputMode, PaneLayout};
