//! Execution session: forward and backward stepping over a live interpreter
//!
//! The session owns the interpreter, a [`SnapshotHistory`] of its states, the
//! current [`Position`], and the [`BranchRecord`] of tokens seen inside
//! branches that were not taken. Only [`ExecutionSession::step_forward`] and
//! [`ExecutionSession::step_back`] change any of these.
//!
//! Interpreter errors during a step are folded into
//! [`SessionState::Failed`]. A cursor report that cannot be decoded, or that
//! points outside the assembled segments, means the session and the
//! interpreter disagree about the scripts; that is returned as a
//! [`SessionError`] and ends the session.

use crate::engine::{EngineError, ScriptEngine};
use crate::script::ScriptSegment;
use crate::snapshot::SnapshotHistory;
use rustc_hash::FxHashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Token that closes a conditional; never marked as skipped
const BRANCH_TERMINATOR: &str = "OP_ENDIF";

/// Location of the instruction the interpreter will run next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// 0 = signature script, 1 = locking script, 2 = redeem script
    pub segment: usize,
    /// Token index within the segment
    pub offset: usize,
}

impl Position {
    pub fn new(segment: usize, offset: usize) -> Self {
        Position { segment, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.offset)
    }
}

/// Positions found inside a branch that was not taken
pub type BranchRecord = FxHashSet<Position>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No step taken yet
    Ready,
    Running,
    Succeeded,
    /// Execution or the final check failed, with the interpreter's message
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed(_))
    }
}

/// Everything the render loop needs to paint one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View<'a> {
    pub segments: &'a [ScriptSegment],
    pub position: Position,
    /// Token text at `position`
    pub next_instruction: Option<&'a str>,
    /// Main stack, bottom first
    pub stack: Vec<Vec<u8>>,
    /// Alternate stack, bottom first
    pub alt_stack: Vec<Vec<u8>>,
    pub state: SessionState,
    pub branch_record: &'a BranchRecord,
}

impl View<'_> {
    /// Whether the token at `segment`/`offset` sits in a skipped branch
    pub fn is_skipped(&self, segment: usize, offset: usize) -> bool {
        self.branch_record.contains(&Position::new(segment, offset))
    }
}

/// Fatal session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("malformed instruction cursor {0:?}")]
    MalformedCursor(String),

    #[error("instruction cursor {0} is outside the assembled scripts")]
    PositionOutOfRange(Position),

    #[error("interpreter could not report its cursor: {0}")]
    Engine(#[from] EngineError),
}

/// Decode an interpreter cursor of the form `SS:OOOO: MNEMONIC`.
///
/// Segment and offset are big-endian hex of one to four bytes.
pub fn decode_cursor(cursor: &str) -> Result<(Position, &str), SessionError> {
    let malformed = || SessionError::MalformedCursor(cursor.to_string());

    let mut fields = cursor.splitn(3, ':');
    let (Some(segment), Some(offset), Some(mnemonic)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };

    let segment = decode_hex_field(segment).ok_or_else(malformed)?;
    let offset = decode_hex_field(offset).ok_or_else(malformed)?;

    let mnemonic = mnemonic.trim_start();
    if mnemonic.is_empty() {
        return Err(malformed());
    }

    Ok((Position::new(segment, offset), mnemonic))
}

fn decode_hex_field(field: &str) -> Option<usize> {
    let bytes = hex::decode(field).ok()?;
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

/// Stepping session over one interpreter instance
#[derive(Debug)]
pub struct ExecutionSession<E: ScriptEngine> {
    segments: Vec<ScriptSegment>,
    engine: E,
    history: SnapshotHistory<E>,
    position: Position,
    branch_record: BranchRecord,
    /// Set by the step that finished execution, cleared by stepping back
    verdict: Option<SessionState>,
}

impl<E: ScriptEngine> ExecutionSession<E> {
    /// Snapshot the freshly constructed `engine` and locate its first
    /// instruction within `segments`
    pub fn new(segments: Vec<ScriptSegment>, engine: E) -> Result<Self, SessionError> {
        let (position, _) = locate(&segments, &engine)?;
        let history = SnapshotHistory::new(&engine);

        debug!(%position, segments = segments.len(), "session created");

        Ok(ExecutionSession {
            segments,
            engine,
            history,
            position,
            branch_record: BranchRecord::default(),
            verdict: None,
        })
    }

    /// Execute one instruction.
    ///
    /// A no-op once the session is terminal.
    pub fn step_forward(&mut self) -> Result<View<'_>, SessionError> {
        if self.verdict.is_some() {
            return Ok(self.current_view());
        }

        match self.engine.step() {
            Err(err) => {
                info!(%err, position = %self.position, "script failed");
                self.verdict = Some(SessionState::Failed(err.to_string()));
            }
            Ok(true) => {
                let verdict = match self.engine.check_error_condition(true) {
                    Ok(()) => {
                        info!("script succeeded");
                        SessionState::Succeeded
                    }
                    Err(err) => {
                        info!(%err, "script failed final check");
                        SessionState::Failed(err.to_string())
                    }
                };
                self.verdict = Some(verdict);
            }
            Ok(false) => {
                let (position, mnemonic) = locate(&self.segments, &self.engine)?;
                self.history.record(&self.engine);
                self.position = position;

                if !self.engine.is_branch_executing()
                    && mnemonic != BRANCH_TERMINATOR
                    && self.branch_record.insert(position)
                {
                    debug!(%position, %mnemonic, "marked skipped branch token");
                }

                debug!(%position, %mnemonic, steps = self.steps_taken(), "stepped forward");
            }
        }

        Ok(self.current_view())
    }

    /// Undo the most recent step.
    ///
    /// From a terminal state this returns to the state before the final step.
    /// A no-op before the first step. Skipped-branch marks are kept.
    pub fn step_back(&mut self) -> Result<View<'_>, SessionError> {
        if self.verdict.take().is_some() {
            // The finishing step never recorded a snapshot
            self.engine = self.history.restore_latest();
            debug!(position = %self.position, "left terminal state");
            return Ok(self.current_view());
        }

        if let Some(engine) = self.history.rewind() {
            let (position, _) = locate(&self.segments, &engine)?;
            self.engine = engine;
            self.position = position;
            debug!(%position, steps = self.steps_taken(), "stepped back");
        }

        Ok(self.current_view())
    }

    /// Read-only view of the current state
    pub fn current_view(&self) -> View<'_> {
        View {
            segments: &self.segments,
            position: self.position,
            next_instruction: self.token_at(self.position),
            stack: self.engine.stack(),
            alt_stack: self.engine.alt_stack(),
            state: self.state(),
            branch_record: &self.branch_record,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.verdict {
            Some(verdict) => verdict.clone(),
            None if self.history.is_at_start() => SessionState::Ready,
            None => SessionState::Running,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn segments(&self) -> &[ScriptSegment] {
        &self.segments
    }

    pub fn branch_record(&self) -> &BranchRecord {
        &self.branch_record
    }

    /// The live interpreter
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Number of stored snapshots, including the initial one
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forward steps currently in effect, counting a finishing step
    pub fn steps_taken(&self) -> usize {
        self.history.len() - 1 + usize::from(self.verdict.is_some())
    }

    fn token_at(&self, position: Position) -> Option<&str> {
        self.segments
            .get(position.segment)
            .and_then(|segment| segment.token(position.offset))
    }
}

/// Decode the interpreter's cursor and check it against the segments
fn locate<E: ScriptEngine>(
    segments: &[ScriptSegment],
    engine: &E,
) -> Result<(Position, String), SessionError> {
    let cursor = engine.disasm_pc()?;
    let (position, mnemonic) = decode_cursor(&cursor)?;

    segments
        .get(position.segment)
        .and_then(|segment| segment.token(position.offset))
        .ok_or(SessionError::PositionOutOfRange(position))?;

    Ok((position, mnemonic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::SegmentKind;

    /// Engine that replays a fixed list of cursor reports
    #[derive(Debug, Clone)]
    struct ScriptedEngine {
        cursors: Vec<(&'static str, bool)>,
        at: usize,
        stack: Vec<Vec<u8>>,
        fail_at: Option<usize>,
        passes_final_check: bool,
    }

    impl ScriptedEngine {
        fn new(cursors: Vec<(&'static str, bool)>) -> Self {
            ScriptedEngine {
                cursors,
                at: 0,
                stack: Vec::new(),
                fail_at: None,
                passes_final_check: true,
            }
        }
    }

    impl ScriptEngine for ScriptedEngine {
        fn step(&mut self) -> Result<bool, EngineError> {
            if self.fail_at == Some(self.at) {
                self.stack.clear();
                return Err(EngineError::EarlyReturn);
            }
            self.stack.push(vec![self.at as u8]);
            self.at += 1;
            Ok(self.at == self.cursors.len())
        }

        fn disasm_pc(&self) -> Result<String, EngineError> {
            self.cursors
                .get(self.at)
                .map(|(cursor, _)| cursor.to_string())
                .ok_or(EngineError::InvalidProgramCounter)
        }

        fn stack(&self) -> Vec<Vec<u8>> {
            self.stack.clone()
        }

        fn alt_stack(&self) -> Vec<Vec<u8>> {
            Vec::new()
        }

        fn is_branch_executing(&self) -> bool {
            self.cursors.get(self.at).map_or(true, |(_, executing)| *executing)
        }

        fn check_error_condition(&self, _final_script: bool) -> Result<(), EngineError> {
            if self.passes_final_check {
                Ok(())
            } else {
                Err(EngineError::EvalFalse)
            }
        }
    }

    type Observed = (Position, Option<String>, Vec<Vec<u8>>, SessionState);

    fn observe(view: View<'_>) -> Observed {
        (
            view.position,
            view.next_instruction.map(str::to_string),
            view.stack,
            view.state,
        )
    }

    fn segments() -> Vec<ScriptSegment> {
        let tokens = |list: &[&str]| list.iter().map(|t| t.to_string()).collect();
        vec![
            ScriptSegment::new(SegmentKind::SignatureScript, tokens(&["OP_0"])),
            ScriptSegment::new(
                SegmentKind::LockingScript,
                tokens(&["OP_IF", "OP_2", "OP_ENDIF", "OP_1"]),
            ),
        ]
    }

    fn skipped_branch_engine() -> ScriptedEngine {
        ScriptedEngine::new(vec![
            ("00:0000: OP_0", true),
            ("01:0000: OP_IF", true),
            ("01:0001: OP_2", false),
            ("01:0002: OP_ENDIF", false),
            ("01:0003: OP_1", true),
        ])
    }

    #[test]
    fn test_decode_cursor() {
        assert_eq!(
            decode_cursor("01:0003: OP_DUP").unwrap(),
            (Position::new(1, 3), "OP_DUP")
        );
        assert_eq!(
            decode_cursor("0a:00ff: 02ab").unwrap(),
            (Position::new(10, 255), "02ab")
        );
        assert_eq!(
            decode_cursor("02:00010000: OP_ADD").unwrap(),
            (Position::new(2, 65536), "OP_ADD")
        );
    }

    #[test]
    fn test_decode_cursor_rejects_malformed_input() {
        for cursor in [
            "",
            "01:0000",
            "01:0000: ",
            "zz:0000: OP_1",
            "01:000: OP_1",
            ":0000: OP_1",
            "0102030405:0000: OP_1",
        ] {
            assert_eq!(
                decode_cursor(cursor),
                Err(SessionError::MalformedCursor(cursor.to_string())),
                "{cursor:?}"
            );
        }
    }

    #[test]
    fn test_new_session_is_ready() {
        let session = ExecutionSession::new(segments(), skipped_branch_engine()).unwrap();
        let view = session.current_view();
        assert_eq!(view.state, SessionState::Ready);
        assert_eq!(view.position, Position::new(0, 0));
        assert_eq!(view.next_instruction, Some("OP_0"));
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_forward_run_marks_skipped_tokens_but_not_endif() {
        let mut session = ExecutionSession::new(segments(), skipped_branch_engine()).unwrap();
        for _ in 0..5 {
            session.step_forward().unwrap();
        }

        assert_eq!(session.state(), SessionState::Succeeded);
        let view = session.current_view();
        assert!(view.is_skipped(1, 1));
        assert!(!view.is_skipped(1, 2));
        assert_eq!(view.branch_record.len(), 1);
    }

    #[test]
    fn test_step_forward_is_noop_when_terminal() {
        let mut session = ExecutionSession::new(segments(), skipped_branch_engine()).unwrap();
        for _ in 0..5 {
            session.step_forward().unwrap();
        }
        let before = observe(session.current_view());
        let after = observe(session.step_forward().unwrap());
        assert_eq!(before, after);
        assert_eq!(session.steps_taken(), 5);
        assert_eq!(session.history_len(), 5);
    }

    #[test]
    fn test_step_back_is_noop_when_ready() {
        let mut session = ExecutionSession::new(segments(), skipped_branch_engine()).unwrap();
        let before = observe(session.current_view());
        assert_eq!(observe(session.step_back().unwrap()), before);
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_step_error_is_recorded_as_failure() {
        let mut engine = skipped_branch_engine();
        engine.fail_at = Some(2);
        let mut session = ExecutionSession::new(segments(), engine).unwrap();

        session.step_forward().unwrap();
        let before = observe(session.step_forward().unwrap());
        let failed = observe(session.step_forward().unwrap());
        assert_eq!(failed.3, SessionState::Failed("script returned early".to_string()));
        assert_eq!(failed.0, before.0);
        assert_eq!(session.history_len(), 3);

        assert_eq!(observe(session.step_back().unwrap()), before);
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_final_check_failure() {
        let mut engine = skipped_branch_engine();
        engine.passes_final_check = false;
        let mut session = ExecutionSession::new(segments(), engine).unwrap();
        for _ in 0..5 {
            session.step_forward().unwrap();
        }
        assert_eq!(
            session.state(),
            SessionState::Failed(EngineError::EvalFalse.to_string())
        );
    }

    #[test]
    fn test_step_back_keeps_branch_marks() {
        let mut session = ExecutionSession::new(segments(), skipped_branch_engine()).unwrap();
        for _ in 0..3 {
            session.step_forward().unwrap();
        }
        assert!(session.branch_record().contains(&Position::new(1, 1)));

        session.step_back().unwrap();
        session.step_back().unwrap();
        assert_eq!(session.position(), Position::new(1, 0));
        assert!(session.branch_record().contains(&Position::new(1, 1)));
    }

    #[test]
    fn test_cursor_outside_segments_is_fatal() {
        let engine = ScriptedEngine::new(vec![("00:0000: OP_0", true), ("01:0009: OP_1", true)]);
        let mut session = ExecutionSession::new(segments(), engine).unwrap();
        assert_eq!(
            session.step_forward().unwrap_err(),
            SessionError::PositionOutOfRange(Position::new(1, 9))
        );
    }

    #[test]
    fn test_malformed_initial_cursor_is_fatal() {
        let engine = ScriptedEngine::new(vec![("garbage", true)]);
        assert!(matches!(
            ExecutionSession::new(segments(), engine),
            Err(SessionError::MalformedCursor(_))
        ));
    }
}
