//! Terminal setup and teardown around the event loop

use crate::error::DebuggerError;
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};

pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Run `body` on the alternate screen in raw mode.
///
/// Once raw mode is on, the terminal is restored however the rest ends,
/// including a failure to enter the alternate screen.
pub fn with_terminal<R>(
    body: impl FnOnce(&mut TuiTerminal) -> Result<R, DebuggerError>,
) -> Result<R, DebuggerError> {
    enable_raw_mode()?;
    guarded(enter, body, restore)
}

fn enter() -> Result<TuiTerminal, DebuggerError> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore() -> Result<(), DebuggerError> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)?;
    Ok(())
}

/// Run `setup` and `body`, then `teardown` no matter which of them failed.
/// The earliest error is the one reported.
fn guarded<T, R>(
    setup: impl FnOnce() -> Result<T, DebuggerError>,
    body: impl FnOnce(&mut T) -> Result<R, DebuggerError>,
    teardown: impl FnOnce() -> Result<(), DebuggerError>,
) -> Result<R, DebuggerError> {
    let result = setup().and_then(|mut state| body(&mut state));
    let restored = teardown();
    let value = result?;
    restored?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn failure(message: &str) -> DebuggerError {
        DebuggerError::Io(io::Error::other(message.to_string()))
    }

    #[test]
    fn test_teardown_runs_when_setup_fails() {
        let restored = Cell::new(0);
        let result: Result<(), _> = guarded(
            || Err::<(), _>(failure("no alternate screen")),
            |_| panic!("body must not run"),
            || {
                restored.set(restored.get() + 1);
                Ok(())
            },
        );

        assert_eq!(restored.get(), 1);
        assert_eq!(
            result.unwrap_err().to_string(),
            "terminal error: no alternate screen"
        );
    }

    #[test]
    fn test_teardown_runs_when_body_fails() {
        let restored = Cell::new(false);
        let result: Result<(), _> = guarded(
            || Ok(()),
            |_| Err(failure("draw failed")),
            || {
                restored.set(true);
                Err(failure("restore failed"))
            },
        );

        assert!(restored.get());
        assert_eq!(result.unwrap_err().to_string(), "terminal error: draw failed");
    }

    #[test]
    fn test_body_value_is_returned_after_teardown() {
        let restored = Cell::new(false);
        let result = guarded(
            || Ok(40),
            |state| Ok(*state + 2),
            || {
                restored.set(true);
                Ok(())
            },
        );

        assert!(restored.get());
        assert_eq!(result.unwrap(), 42);
    }
}
