//! Startup shared by `debug` and `execute`

use crate::engine::{LegacyEngine, ScriptFlags, StandardDisassembler};
use crate::error::DebuggerError;
use crate::resolver::{resolve_input, InputRequest, ResolvedInput, TransactionSource};
use crate::script::build_segments;
use crate::session::ExecutionSession;
use tracing::info;

/// A session ready for the interactive loop, with the input it runs over
#[derive(Debug)]
pub struct PreparedSession {
    pub input: ResolvedInput,
    pub session: ExecutionSession<LegacyEngine>,
}

/// Resolve the input, assemble its scripts and start a session
pub fn prepare_session<S: TransactionSource + ?Sized>(
    source: &S,
    request: &InputRequest,
    flags: ScriptFlags,
) -> Result<PreparedSession, DebuggerError> {
    let input = resolve_input(source, request)?;

    let segments = build_segments(
        &StandardDisassembler,
        &input.tx,
        input.input_index,
        &input.locking_script,
    )?;
    let engine = new_engine(&input, flags)?;
    let session = ExecutionSession::new(segments, engine)?;

    info!(
        txid = %input.tx.compute_txid(),
        input = input.input_index,
        amount = input.amount.to_sat(),
        "session ready"
    );

    Ok(PreparedSession { input, session })
}

/// Run the input's scripts to completion
pub fn execute<S: TransactionSource + ?Sized>(
    source: &S,
    request: &InputRequest,
    flags: ScriptFlags,
) -> Result<(), DebuggerError> {
    let input = resolve_input(source, request)?;

    let mut engine = new_engine(&input, flags)?;
    engine.execute().map_err(DebuggerError::ScriptFailed)?;

    info!(input = engine.input_index(), amount = engine.amount().to_sat(), "script succeeded");
    Ok(())
}

fn new_engine(input: &ResolvedInput, flags: ScriptFlags) -> Result<LegacyEngine, DebuggerError> {
    Ok(LegacyEngine::new(
        &input.locking_script,
        &input.tx,
        input.input_index,
        flags,
        input.amount,
    )?)
}
