//! Segment assembly
//!
//! Each script part of a spend is disassembled once, up front, into an
//! ordered list of tokens. A token's index in that list is the offset the
//! interpreter reports in its cursor, so these lists are the address space
//! the session and the script panes share.

use crate::engine::{Disassembler, EngineError};
use bitcoin::Transaction;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Which part of the spend a segment holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    SignatureScript,
    LockingScript,
    RedeemScript,
}

impl SegmentKind {
    /// Segment index used in cursor positions
    pub fn index(self) -> usize {
        match self {
            SegmentKind::SignatureScript => 0,
            SegmentKind::LockingScript => 1,
            SegmentKind::RedeemScript => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SegmentKind::SignatureScript => "Signature Script",
            SegmentKind::LockingScript => "Locking Script",
            SegmentKind::RedeemScript => "Redeem Script",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A disassembled script part. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSegment {
    kind: SegmentKind,
    tokens: Vec<String>,
}

impl ScriptSegment {
    pub fn new(kind: SegmentKind, tokens: Vec<String>) -> Self {
        ScriptSegment { kind, tokens }
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Token at `offset`, if the segment is that long
    pub fn token(&self, offset: usize) -> Option<&str> {
        self.tokens.get(offset).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Failures while preparing segments. All of them are fatal for startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("input index {index} is out of range for a transaction with {count} input(s)")]
    InputIndexOutOfRange { index: usize, count: usize },

    #[error("failed to disassemble {segment}: {source}")]
    Disassembly {
        segment: SegmentKind,
        #[source]
        source: EngineError,
    },
}

/// Disassemble the signature script of `input_index`, the locking script,
/// and the redeem script when the locking script is pay-to-script-hash.
///
/// The redeem segment is left out when the final push of the signature
/// script is missing or does not disassemble; the interpreter reports that
/// case itself once stepping reaches it.
pub fn build_segments<D: Disassembler + ?Sized>(
    disassembler: &D,
    tx: &Transaction,
    input_index: usize,
    locking_script: &[u8],
) -> Result<Vec<ScriptSegment>, AssemblyError> {
    let txin = tx
        .input
        .get(input_index)
        .ok_or(AssemblyError::InputIndexOutOfRange {
            index: input_index,
            count: tx.input.len(),
        })?;
    let signature_script = txin.script_sig.as_bytes();

    let mut segments = vec![
        assemble(disassembler, SegmentKind::SignatureScript, signature_script)?,
        assemble(disassembler, SegmentKind::LockingScript, locking_script)?,
    ];

    if disassembler.is_script_hash(locking_script) {
        let redeem = disassembler
            .extract_redeem_script(signature_script)
            .and_then(|script| assemble(disassembler, SegmentKind::RedeemScript, &script).ok());
        match redeem {
            Some(segment) => segments.push(segment),
            None => debug!("pay-to-script-hash spend without a decodable redeem script"),
        }
    }

    debug!(
        segments = segments.len(),
        tokens = segments.iter().map(ScriptSegment::len).sum::<usize>(),
        "assembled script segments"
    );

    Ok(segments)
}

fn assemble<D: Disassembler + ?Sized>(
    disassembler: &D,
    kind: SegmentKind,
    script: &[u8],
) -> Result<ScriptSegment, AssemblyError> {
    let text = disassembler
        .disassemble(script)
        .map_err(|source| AssemblyError::Disassembly {
            segment: kind,
            source,
        })?;

    let tokens = if text.is_empty() {
        Vec::new()
    } else {
        text.split(' ').map(str::to_string).collect()
    };

    Ok(ScriptSegment::new(kind, tokens))
}
