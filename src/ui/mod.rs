//! Terminal user interface built on [ratatui](https://github.com/ratatui-org/ratatui).
//!
//! The UI is organized into these parts:
//!
//! - **[`app`]**: the blocking event loop and key-to-action mapping
//! - **[`panes`]**: stateless render functions for each visible pane (scripts,
//!   stacks, verdict banner, header and status bar)
//! - **[`theme`]**: centralized color palette used by all panes
//! - **[`terminal`]**: raw mode and alternate screen setup, always undone
//!
//! The entry point for consumers is [`App`]: construct it with an
//! [`ExecutionSession`] and call [`App::run`] to start the event loop.
//!
//! [`ExecutionSession`]: crate::session::ExecutionSession
//! [`App::run`]: app::App::run

pub mod app;
pub mod panes;
pub mod terminal;
pub mod theme;

pub use app::{action_for, Action, App, InputSummary};
pub use terminal::with_terminal;
