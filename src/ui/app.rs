//! Main TUI application state and logic

use crate::engine::ScriptEngine;
use crate::error::DebuggerError;
use crate::resolver::{ResolvedInput, TokenData};
use crate::session::{ExecutionSession, SessionError, SessionState};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};

/// What a key press asks the session to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StepForward,
    StepBack,
    Quit,
}

/// Map a key to an action. Unbound keys map to `None`.
pub fn action_for(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Right | KeyCode::F(4) | KeyCode::Char('n') => Some(Action::StepForward),
        KeyCode::Left | KeyCode::F(3) | KeyCode::Char('p') => Some(Action::StepBack),
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
        _ => None,
    }
}

/// Details about the input being debugged, shown in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSummary {
    pub txid: String,
    pub input_index: usize,
    pub amount_sats: u64,
    pub token_data: Option<TokenData>,
}

impl InputSummary {
    pub fn from_input(input: &ResolvedInput) -> Self {
        InputSummary {
            txid: input.tx.compute_txid().to_string(),
            input_index: input.input_index,
            amount_sats: input.amount.to_sat(),
            token_data: input.token_data.clone(),
        }
    }
}

/// The main application state
pub struct App<E: ScriptEngine> {
    /// The stepping session
    pub session: ExecutionSession<E>,

    /// Input details for the header
    pub summary: InputSummary,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,
}

impl<E: ScriptEngine> App<E> {
    pub fn new(session: ExecutionSession<E>, summary: InputSummary) -> Self {
        App {
            session,
            summary,
            should_quit: false,
            status_message: String::from("Ready!"),
        }
    }

    /// Run the TUI application.
    ///
    /// Blocks on each key event; nothing changes between key presses.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), DebuggerError> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = action_for(key) {
                        self.apply(action)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Dispatch one action to the session
    pub fn apply(&mut self, action: Action) -> Result<(), SessionError> {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::StepForward => {
                let was_terminal = self.session.state().is_terminal();
                let state = self.session.step_forward()?.state;
                self.status_message = match state {
                    _ if was_terminal => "Execution already finished".to_string(),
                    SessionState::Succeeded => "Execution finished".to_string(),
                    SessionState::Failed(_) => "Execution failed".to_string(),
                    _ => "Stepped forward".to_string(),
                };
            }
            Action::StepBack => {
                let was_ready = self.session.state() == SessionState::Ready;
                self.session.step_back()?;
                self.status_message = if was_ready {
                    "Cannot step backward: at the first instruction".to_string()
                } else {
                    "Stepped backward".to_string()
                };
            }
        }
        Ok(())
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let view = self.session.current_view();
        let size = frame.area();
        let finished = view.state.is_terminal();

        // Header, panes, verdict banner (only once finished), status bar
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(if finished { 3 } else { 0 }),
                Constraint::Length(1),
            ])
            .split(size);

        // Scripts on the left, stacks on the right
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(main_chunks[1]);

        let segment_count = view.segments.len() as u32;
        let mut left_constraints: Vec<Constraint> = view
            .segments
            .iter()
            .map(|_| Constraint::Ratio(1, segment_count))
            .collect();
        left_constraints.push(Constraint::Length(3));
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(left_constraints)
            .split(columns[0]);

        let show_alt_stack = !view.alt_stack.is_empty() && !finished;
        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(if show_alt_stack {
                vec![Constraint::Percentage(60), Constraint::Percentage(40)]
            } else {
                vec![Constraint::Percentage(100)]
            })
            .split(columns[1]);

        super::panes::render_header(frame, main_chunks[0], &self.summary);

        for (segment, area) in view.segments.iter().zip(left_rows.iter()) {
            super::panes::render_script_pane(frame, *area, segment, &view);
        }
        super::panes::render_next_instruction(frame, left_rows[left_rows.len() - 1], &view);

        super::panes::render_stack_pane(frame, right_rows[0], " Stack ", &view.stack);
        if show_alt_stack {
            super::panes::render_stack_pane(frame, right_rows[1], " Alt Stack ", &view.alt_stack);
        }

        if finished {
            super::panes::render_verdict(frame, main_chunks[2], &view.state);
        }

        super::panes::render_status_bar(
            frame,
            main_chunks[3],
            &self.status_message,
            self.session.steps_taken(),
            &view.state,
        );
    }
}
