//! Script parsing and one-line disassembly

use bitcoin::opcodes::Opcode;
use bitcoin::script::{Instruction, Script};

use super::{num, Disassembler, EngineError};

/// Highest opcode that still counts as a push (`OP_16`)
pub(crate) const MAX_PUSH_OPCODE: u8 = 0x60;

/// A single parsed instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Data push, including the empty push (`OP_0`)
    Push(Vec<u8>),
    /// Any non-data opcode
    Code(Opcode),
}

/// An instruction together with its byte offset in the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOp {
    pub op: Op,
    pub start: usize,
}

impl ParsedOp {
    /// Whether this instruction only pushes a value
    pub fn is_push(&self) -> bool {
        match &self.op {
            Op::Push(_) => true,
            Op::Code(code) => code.to_u8() <= MAX_PUSH_OPCODE,
        }
    }

    /// Token text shown in the script panes and cursor reports
    pub fn token(&self) -> String {
        match &self.op {
            Op::Push(data) if data.is_empty() => "OP_0".to_string(),
            Op::Push(data) => hex::encode(data),
            Op::Code(code) => opcode_name(*code),
        }
    }
}

/// Canonical `OP_*` name, with small integers spelled `OP_1`..`OP_16`
pub fn opcode_name(code: Opcode) -> String {
    match code.to_u8() {
        0x4f => "OP_1NEGATE".to_string(),
        b @ 0x51..=0x60 => format!("OP_{}", b - 0x50),
        0xb1 => "OP_CHECKLOCKTIMEVERIFY".to_string(),
        0xb2 => "OP_CHECKSEQUENCEVERIFY".to_string(),
        _ => code.to_string(),
    }
}

/// Parse raw script bytes into instructions
pub fn parse(script: &[u8]) -> Result<Vec<ParsedOp>, EngineError> {
    Script::from_bytes(script)
        .instruction_indices()
        .map(|item| {
            let (start, instruction) = item.map_err(|e| EngineError::Malformed(e.to_string()))?;
            let op = match instruction {
                Instruction::PushBytes(bytes) => Op::Push(bytes.as_bytes().to_vec()),
                Instruction::Op(code) => Op::Code(code),
            };
            Ok(ParsedOp { op, start })
        })
        .collect()
}

/// The stack item a push-only instruction leaves behind. `OP_RESERVED`
/// pushes nothing.
pub(crate) fn pushed_value(op: &ParsedOp) -> Option<Vec<u8>> {
    match &op.op {
        Op::Push(data) => Some(data.clone()),
        Op::Code(code) => match code.to_u8() {
            0x4f => Some(num::encode(-1)),
            b @ 0x51..=0x60 => Some(num::encode((b - 0x50) as i64)),
            _ => None,
        },
    }
}

/// Disassembler for legacy and pay-to-script-hash scripts
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDisassembler;

impl Disassembler for StandardDisassembler {
    fn disassemble(&self, script: &[u8]) -> Result<String, EngineError> {
        let ops = parse(script)?;
        Ok(ops.iter().map(ParsedOp::token).collect::<Vec<_>>().join(" "))
    }

    fn is_script_hash(&self, script: &[u8]) -> bool {
        Script::from_bytes(script).is_p2sh()
    }

    fn extract_redeem_script(&self, signature_script: &[u8]) -> Option<Vec<u8>> {
        let ops = parse(signature_script).ok()?;
        if !ops.iter().all(ParsedOp::is_push) {
            return None;
        }
        ops.last().and_then(pushed_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_mixed_script() {
        // OP_0 <02 ab> OP_2 OP_IF OP_CHECKSIG OP_ENDIF
        let script = [0x00, 0x02, 0x02, 0xab, 0x52, 0x63, 0xac, 0x68];
        let text = StandardDisassembler.disassemble(&script).unwrap();
        assert_eq!(text, "OP_0 02ab OP_2 OP_IF OP_CHECKSIG OP_ENDIF");
    }

    #[test]
    fn test_disassemble_pushdata() {
        // OP_PUSHDATA1 3 bytes, then OP_1NEGATE
        let script = [0x4c, 0x03, 0x01, 0x02, 0x03, 0x4f];
        let text = StandardDisassembler.disassemble(&script).unwrap();
        assert_eq!(text, "010203 OP_1NEGATE");
    }

    #[test]
    fn test_truncated_push_is_malformed() {
        let err = StandardDisassembler.disassemble(&[0x05, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)));
    }

    #[test]
    fn test_empty_script_disassembles_to_nothing() {
        assert_eq!(StandardDisassembler.disassemble(&[]).unwrap(), "");
    }

    #[test]
    fn test_parse_records_byte_offsets() {
        let ops = parse(&[0x51, 0x02, 0xaa, 0xbb, 0x87]).unwrap();
        let starts: Vec<usize> = ops.iter().map(|op| op.start).collect();
        assert_eq!(starts, vec![0, 1, 4]);
    }

    #[test]
    fn test_extract_redeem_script() {
        // OP_0 <01> <51 52>
        let sig = [0x00, 0x01, 0x01, 0x02, 0x51, 0x52];
        assert_eq!(
            StandardDisassembler.extract_redeem_script(&sig),
            Some(vec![0x51, 0x52])
        );

        // Ends with an opcode rather than a push
        assert_eq!(StandardDisassembler.extract_redeem_script(&[0x01, 0x01, 0x76]), None);

        // Small integers are pushed as script numbers
        assert_eq!(StandardDisassembler.extract_redeem_script(&[0x4f]), Some(vec![0x81]));
        assert_eq!(StandardDisassembler.extract_redeem_script(&[0x00, 0x60]), Some(vec![0x10]));
        assert_eq!(StandardDisassembler.extract_redeem_script(&[0x50]), None);
    }

    #[test]
    fn test_is_script_hash() {
        let mut p2sh = vec![0xa9, 0x14];
        p2sh.extend_from_slice(&[0x11; 20]);
        p2sh.push(0x87);
        assert!(StandardDisassembler.is_script_hash(&p2sh));
        assert!(!StandardDisassembler.is_script_hash(&[0x51]));
    }
}
