//! Script interpreter contract
//!
//! The debugger never evaluates opcodes itself. Everything it knows about a
//! running script comes through two traits:
//!
//! - [`ScriptEngine`]: a steppable interpreter instance. `Clone` is the
//!   snapshot operation, so implementations must not share mutable state
//!   between clones.
//! - [`Disassembler`]: turns raw script bytes into the space-separated token
//!   text used to address instructions, and recognises the pay-to-script-hash
//!   pattern.
//!
//! [`LegacyEngine`] and [`StandardDisassembler`] are the implementations the
//! command-line front end wires in.
//!
//! # Cursor format
//!
//! [`ScriptEngine::disasm_pc`] reports the next instruction as
//! `SS:OOOO: MNEMONIC`, with the script index and opcode offset hex-encoded.
//! The session decodes it; nothing else should parse it.

pub mod disasm;
pub mod legacy;
pub mod num;

pub use disasm::StandardDisassembler;
pub use legacy::{LegacyEngine, ScriptFlags};

use thiserror::Error;

/// A steppable script interpreter
pub trait ScriptEngine: Clone {
    /// Execute exactly one instruction.
    ///
    /// Returns `Ok(true)` once the last instruction of the last script has run.
    fn step(&mut self) -> Result<bool, EngineError>;

    /// Describe the instruction about to execute as `SS:OOOO: MNEMONIC`
    fn disasm_pc(&self) -> Result<String, EngineError>;

    /// Main stack, bottom first
    fn stack(&self) -> Vec<Vec<u8>>;

    /// Alternate stack, bottom first
    fn alt_stack(&self) -> Vec<Vec<u8>>;

    /// Whether the innermost conditional branch is being executed
    fn is_branch_executing(&self) -> bool;

    /// Final-condition check run once every script has finished.
    ///
    /// `final_script` enables checks that only apply after the last script
    /// (clean stack).
    fn check_error_condition(&self, final_script: bool) -> Result<(), EngineError>;
}

/// Script disassembly and classification
pub trait Disassembler {
    /// Render a script as space-separated tokens, one per instruction
    fn disassemble(&self, script: &[u8]) -> Result<String, EngineError>;

    /// Whether a locking script is the `OP_HASH160 <20 bytes> OP_EQUAL` pattern
    fn is_script_hash(&self, script: &[u8]) -> bool;

    /// The item the final push of a push-only signature script leaves on
    /// the stack
    fn extract_redeem_script(&self, signature_script: &[u8]) -> Option<Vec<u8>>;
}

/// Errors reported by the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("malformed script: {0}")]
    Malformed(String),

    #[error("input index {index} is out of range for a transaction with {count} input(s)")]
    InvalidInputIndex { index: usize, count: usize },

    #[error("signature script is not push only")]
    NotPushOnly,

    #[error("false stack entry at end of script execution")]
    EvalFalse,

    #[error("stack empty at end of script execution")]
    EmptyStack,

    #[error("stack must contain exactly one item (contains {0})")]
    CleanStack(usize),

    #[error("error check when script program counter is on script {index} of {count}")]
    ScriptUnfinished { index: usize, count: usize },

    #[error("attempt to read past the end of the scripts")]
    InvalidProgramCounter,

    #[error("end of script reached in conditional execution")]
    UnbalancedConditional,

    #[error("encountered unbalanced conditional {0}")]
    UnbalancedElse(String),

    #[error("script returned early")]
    EarlyReturn,

    #[error("{0} failed")]
    VerifyFailed(String),

    #[error("{op} requires {needed} stack item(s), have {have}")]
    StackUnderflow {
        op: String,
        needed: usize,
        have: usize,
    },

    #[error("attempt to execute disabled opcode {0}")]
    DisabledOpcode(String),

    #[error("attempt to execute reserved opcode {0}")]
    ReservedOpcode(String),

    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(String),

    #[error("exceeded max operation limit of {0}")]
    TooManyOperations(usize),

    #[error("element size {size} exceeds max allowed size {max}")]
    ElementTooBig { size: usize, max: usize },

    #[error("combined stack size {size} exceeds max allowed size {max}")]
    StackOverflow { size: usize, max: usize },

    #[error("numeric value encoded as {0:02x?} is longer than the allowed length")]
    NumberTooBig(Vec<u8>),

    #[error("invalid public key count {0}")]
    InvalidPubKeyCount(i64),

    #[error("invalid signature count {0}")]
    InvalidSignatureCount(i64),

    #[error("multisig dummy argument has length {0} instead of 0")]
    NullDummy(usize),

    #[error("signature is not canonically DER encoded")]
    SignatureEncoding,

    #[error("negative lock time: {0}")]
    NegativeLockTime(i64),

    #[error("locktime requirement not satisfied: {0}")]
    UnsatisfiedLockTime(String),

    #[error("signature hash failed: {0}")]
    Sighash(String),

    #[error("redeem script is missing from the signature script")]
    MissingRedeemScript,

    #[error("witness program spends are not supported")]
    UnsupportedWitnessProgram,

    #[error("signature must use the fork-id hash type")]
    MustUseForkId,
}

/// Truthiness of a stack element: any non-zero byte, ignoring a trailing
/// sign bit (negative zero is false)
pub fn as_bool(item: &[u8]) -> bool {
    for (i, byte) in item.iter().enumerate() {
        if *byte != 0 {
            if i == item.len() - 1 && *byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bool() {
        assert!(!as_bool(&[]));
        assert!(!as_bool(&[0x00]));
        assert!(!as_bool(&[0x00, 0x80]));
        assert!(as_bool(&[0x01]));
        assert!(as_bool(&[0x80, 0x00]));
        assert!(as_bool(&[0x00, 0x00, 0x01]));
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = EngineError::StackUnderflow {
            op: "OP_DUP".to_string(),
            needed: 1,
            have: 0,
        };
        assert_eq!(err.to_string(), "OP_DUP requires 1 stack item(s), have 0");
        assert_eq!(
            EngineError::EvalFalse.to_string(),
            "false stack entry at end of script execution"
        );
    }
}
