//! Top-level error taxonomy
//!
//! Scripted failures never reach this type while stepping: the session keeps
//! them as its own `Failed` state. Everything here ends the process with a
//! nonzero exit code.

use crate::engine::EngineError;
use crate::resolver::ResolveError;
use crate::script::AssemblyError;
use crate::session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DebuggerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// The interpreter refused to start on this input
    #[error("cannot start interpreter: {0}")]
    Engine(#[from] EngineError),

    #[error("session aborted: {0}")]
    Session(#[from] SessionError),

    /// Non-interactive execution ended in a script failure
    #[error("{0}")]
    ScriptFailed(EngineError),

    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
