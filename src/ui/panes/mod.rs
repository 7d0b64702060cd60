//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`script`]: one pane per script segment with the current token and
//!   skipped-branch tokens highlighted, plus the next instruction panel
//! - [`stack`]: main and alternate stack contents, top first
//! - [`status`]: header, verdict banner and status bar with keybindings
//!
//! Each pane module exports stateless `render_*` functions that read from a
//! session [`View`](crate::session::View).

pub mod script;
pub mod stack;
pub mod status;

pub use script::{render_next_instruction, render_script_pane};
pub use stack::render_stack_pane;
pub use status::{render_header, render_status_bar, render_verdict};
