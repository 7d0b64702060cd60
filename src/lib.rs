//! # Introduction
//!
//! scriptty single-steps a transaction input's scripts forward and backward,
//! showing where the interpreter is, what is on its stacks, and which
//! instructions sat in conditional branches that were not taken. Each step
//! records a clone of the interpreter, so stepping back is a restore rather
//! than a re-run.
//!
//! ## Pipeline
//!
//! ```text
//! Resolver → Segment assembly → Execution session ⇄ TUI
//! ```
//!
//! 1. [`resolver`]: decodes the transaction or fetches it by txid, and looks
//!    up the spent output's locking script and amount when not supplied.
//! 2. [`script`]: disassembles the signature, locking and (pay-to-script-hash)
//!    redeem scripts into token lists that positions index into.
//! 3. [`session`]: the stepping state machine over a [`engine::ScriptEngine`],
//!    backed by a [`snapshot::SnapshotHistory`].
//! 4. [`ui`]: ratatui-based TUI; not part of the stable library API.
//!
//! [`launch`] ties the first three together for the `debug` and `execute`
//! commands defined in [`cli`].

pub mod cli;
pub mod engine;
pub mod error;
pub mod launch;
pub mod logging;
pub mod resolver;
pub mod script;
pub mod session;
pub mod snapshot;
pub mod ui;
