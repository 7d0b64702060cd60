//! Steppable interpreter for legacy and pay-to-script-hash spends
//!
//! Execution walks up to three scripts in order: the input's signature
//! script, the locking script, and (for pay-to-script-hash) the redeem script
//! popped off the stack the signature script left behind. One call to
//! [`ScriptEngine::step`] executes one instruction.
//!
//! The transaction is shared behind an [`Arc`] and never mutated, so a cloned
//! engine is a fully independent snapshot.

use std::mem;
use std::sync::{Arc, OnceLock};

use bitcoin::hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};
use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;
use bitcoin::secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use bitcoin::sighash::SighashCache;
use bitcoin::{consensus, Amount, Script, ScriptBuf, Transaction};
use tracing::trace;

use super::disasm::{opcode_name, parse, pushed_value, Op, ParsedOp, MAX_PUSH_OPCODE};
use super::num::{self, DEFAULT_NUM_LEN, LOCKTIME_NUM_LEN};
use super::{as_bool, EngineError, ScriptEngine};

const MAX_OPS_PER_SCRIPT: usize = 201;
const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
const MAX_STACK_SIZE: usize = 1000;
const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

const LOCKTIME_THRESHOLD: i64 = 500_000_000;
const SEQUENCE_LOCKTIME_DISABLE_FLAG: i64 = 1 << 31;
const SEQUENCE_LOCKTIME_TYPE_FLAG: i64 = 1 << 22;
const SEQUENCE_LOCKTIME_MASK: i64 = 0x0000_ffff;

const SIGHASH_NONE: u32 = 0x02;
const SIGHASH_SINGLE: u32 = 0x03;
const SIGHASH_FORKID: u32 = 0x40;
const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Verification rules applied on top of consensus evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptFlags {
    /// Evaluate the redeem script of pay-to-script-hash outputs
    pub verify_p2sh: bool,
    /// Require exactly one item on the stack after the last script
    pub clean_stack: bool,
    /// Require the signature script to contain only pushes
    pub sig_push_only: bool,
    /// Reject signatures that are not strictly DER encoded
    pub strict_der: bool,
    /// Require the extra `OP_CHECKMULTISIG` argument to be empty
    pub null_dummy: bool,
    /// Enforce `OP_CHECKLOCKTIMEVERIFY` and `OP_CHECKSEQUENCEVERIFY`
    pub verify_locktime: bool,
    /// Sign over the fork-id digest, which commits to the spent amount.
    /// Signatures must then carry the fork-id bit in their hash type.
    pub sighash_forkid: bool,
}

impl ScriptFlags {
    /// Policy rules used when relaying transactions
    pub const STANDARD: ScriptFlags = ScriptFlags {
        verify_p2sh: true,
        clean_stack: true,
        sig_push_only: true,
        strict_der: true,
        null_dummy: true,
        verify_locktime: true,
        sighash_forkid: false,
    };

    /// Bare consensus evaluation with no pay-to-script-hash handling
    pub const NONE: ScriptFlags = ScriptFlags {
        verify_p2sh: false,
        clean_stack: false,
        sig_push_only: false,
        strict_der: false,
        null_dummy: false,
        verify_locktime: false,
        sighash_forkid: false,
    };
}

impl Default for ScriptFlags {
    fn default() -> Self {
        ScriptFlags::STANDARD
    }
}

/// State of one level of `OP_IF` nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    True,
    False,
    /// Nested inside a branch that is not executing; `OP_ELSE` cannot flip it
    Skip,
}

/// Interpreter for one transaction input
#[derive(Debug, Clone)]
pub struct LegacyEngine {
    tx: Arc<Transaction>,
    input_index: usize,
    amount: Amount,
    flags: ScriptFlags,
    bip16: bool,

    raw_scripts: Vec<Vec<u8>>,
    scripts: Vec<Vec<ParsedOp>>,
    script_idx: usize,
    script_off: usize,
    last_code_sep: usize,

    dstack: Vec<Vec<u8>>,
    astack: Vec<Vec<u8>>,
    cond_stack: Vec<Cond>,
    saved_first_stack: Vec<Vec<u8>>,
    num_ops: usize,
}

impl LegacyEngine {
    /// Prepare to evaluate `input_index` of `tx` against `locking_script`
    pub fn new(
        locking_script: &[u8],
        tx: &Transaction,
        input_index: usize,
        flags: ScriptFlags,
        amount: Amount,
    ) -> Result<Self, EngineError> {
        let txin = tx
            .input
            .get(input_index)
            .ok_or(EngineError::InvalidInputIndex {
                index: input_index,
                count: tx.input.len(),
            })?;

        let signature_script = txin.script_sig.as_bytes().to_vec();
        if signature_script.is_empty() && locking_script.is_empty() {
            return Err(EngineError::EvalFalse);
        }

        let sig_ops = parse(&signature_script)?;
        let lock_ops = parse(locking_script)?;

        let bip16 = flags.verify_p2sh && Script::from_bytes(locking_script).is_p2sh();
        if (bip16 || flags.sig_push_only) && !sig_ops.iter().all(ParsedOp::is_push) {
            return Err(EngineError::NotPushOnly);
        }

        // Witness spends would run with an empty witness and fail for the
        // wrong reason
        if Script::from_bytes(locking_script).is_witness_program() {
            return Err(EngineError::UnsupportedWitnessProgram);
        }
        if bip16
            && sig_ops
                .last()
                .and_then(pushed_value)
                .is_some_and(|redeem| Script::from_bytes(&redeem).is_witness_program())
        {
            return Err(EngineError::UnsupportedWitnessProgram);
        }

        // Nothing to execute in an empty signature script
        let script_idx = if sig_ops.is_empty() { 1 } else { 0 };

        trace!(input_index, bip16, "engine created");

        Ok(LegacyEngine {
            tx: Arc::new(tx.clone()),
            input_index,
            amount,
            flags,
            bip16,
            raw_scripts: vec![signature_script, locking_script.to_vec()],
            scripts: vec![sig_ops, lock_ops],
            script_idx,
            script_off: 0,
            last_code_sep: 0,
            dstack: Vec::new(),
            astack: Vec::new(),
            cond_stack: Vec::new(),
            saved_first_stack: Vec::new(),
            num_ops: 0,
        })
    }

    /// Run every remaining instruction, then apply the final-condition check
    pub fn execute(&mut self) -> Result<(), EngineError> {
        while !self.step()? {}
        self.check_error_condition(true)
    }

    /// Value of the output being spent. Only the fork-id digest commits to it.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    fn current_op(&self) -> Option<&ParsedOp> {
        self.scripts
            .get(self.script_idx)
            .and_then(|script| script.get(self.script_off))
    }

    /// Move past a finished script, handing over to the redeem script when
    /// pay-to-script-hash applies. Returns true when nothing is left to run.
    fn finish_script(&mut self) -> Result<bool, EngineError> {
        // An else can't straddle two scripts
        if !self.cond_stack.is_empty() {
            return Err(EngineError::UnbalancedConditional);
        }

        // Alt stack doesn't persist between scripts
        self.astack.clear();
        self.num_ops = 0;
        self.script_off = 0;
        self.last_code_sep = 0;

        if self.script_idx == 0 && self.bip16 {
            self.script_idx = 1;
            self.saved_first_stack = self.dstack.clone();
        } else if self.script_idx == 1 && self.bip16 {
            self.script_idx = 2;

            // The hash check must succeed before the redeem script runs
            let top = self.dstack.pop().ok_or(EngineError::EmptyStack)?;
            if !as_bool(&top) {
                return Err(EngineError::EvalFalse);
            }

            let mut first_stack = mem::take(&mut self.saved_first_stack);
            let redeem_script = first_stack.pop().ok_or(EngineError::MissingRedeemScript)?;
            let ops = parse(&redeem_script)?;
            self.raw_scripts.push(redeem_script);
            self.scripts.push(ops);
            self.dstack = first_stack;
        } else {
            self.script_idx += 1;
        }

        // Zero-length scripts exist in the wild
        if self
            .scripts
            .get(self.script_idx)
            .is_some_and(|script| script.is_empty())
        {
            self.script_idx += 1;
        }

        Ok(self.script_idx >= self.scripts.len())
    }

    fn execute_op(&mut self, op: &ParsedOp) -> Result<(), EngineError> {
        let executing = self.is_branch_executing();

        match &op.op {
            Op::Push(data) => {
                if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(EngineError::ElementTooBig {
                        size: data.len(),
                        max: MAX_SCRIPT_ELEMENT_SIZE,
                    });
                }
                if executing {
                    self.dstack.push(data.clone());
                }
                Ok(())
            }
            Op::Code(code) => {
                let code = *code;

                // Disabled and always-illegal opcodes fail even in an
                // unexecuted branch
                if is_disabled(code) {
                    return Err(EngineError::DisabledOpcode(opcode_name(code)));
                }
                if code == OP_VERIF || code == OP_VERNOTIF {
                    return Err(EngineError::ReservedOpcode(opcode_name(code)));
                }

                if code.to_u8() > MAX_PUSH_OPCODE {
                    self.num_ops += 1;
                    if self.num_ops > MAX_OPS_PER_SCRIPT {
                        return Err(EngineError::TooManyOperations(MAX_OPS_PER_SCRIPT));
                    }
                }

                if !executing && !is_conditional(code) {
                    return Ok(());
                }

                self.execute_code(code, executing)
            }
        }
    }

    fn execute_code(&mut self, code: Opcode, executing: bool) -> Result<(), EngineError> {
        let name = opcode_name(code);
        let byte = code.to_u8();

        // OP_1 through OP_16
        if (0x51..=0x60).contains(&byte) {
            self.dstack.push(num::encode((byte - 0x50) as i64));
            return Ok(());
        }

        // OP_NOP1 and OP_NOP4 through OP_NOP10
        if byte == 0xb0 || (0xb3..=0xb9).contains(&byte) {
            return Ok(());
        }

        match code {
            OP_PUSHNUM_NEG1 => self.dstack.push(num::encode(-1)),
            OP_NOP => {}

            OP_IF | OP_NOTIF => {
                let cond = if executing {
                    let top = self.pop(&name)?;
                    let mut value = as_bool(&top);
                    if code == OP_NOTIF {
                        value = !value;
                    }
                    if value {
                        Cond::True
                    } else {
                        Cond::False
                    }
                } else {
                    Cond::Skip
                };
                self.cond_stack.push(cond);
            }
            OP_ELSE => {
                let top = self
                    .cond_stack
                    .last_mut()
                    .ok_or_else(|| EngineError::UnbalancedElse(name.clone()))?;
                *top = match *top {
                    Cond::True => Cond::False,
                    Cond::False => Cond::True,
                    Cond::Skip => Cond::Skip,
                };
            }
            OP_ENDIF => {
                self.cond_stack
                    .pop()
                    .ok_or_else(|| EngineError::UnbalancedElse(name.clone()))?;
            }
            OP_VERIFY => {
                let top = self.pop(&name)?;
                if !as_bool(&top) {
                    return Err(EngineError::VerifyFailed(name));
                }
            }
            OP_RETURN => return Err(EngineError::EarlyReturn),

            OP_TOALTSTACK => {
                let top = self.pop(&name)?;
                self.astack.push(top);
            }
            OP_FROMALTSTACK => {
                let top = self.astack.pop().ok_or(EngineError::StackUnderflow {
                    op: name,
                    needed: 1,
                    have: 0,
                })?;
                self.dstack.push(top);
            }
            OP_2DROP => {
                self.require(&name, 2)?;
                self.dstack.truncate(self.dstack.len() - 2);
            }
            OP_2DUP => self.duplicate(&name, 2, 2)?,
            OP_3DUP => self.duplicate(&name, 3, 3)?,
            OP_2OVER => self.duplicate(&name, 4, 2)?,
            OP_2ROT => {
                self.require(&name, 6)?;
                let n = self.dstack.len();
                let moved: Vec<_> = self.dstack.drain(n - 6..n - 4).collect();
                self.dstack.extend(moved);
            }
            OP_2SWAP => {
                self.require(&name, 4)?;
                let n = self.dstack.len();
                let moved: Vec<_> = self.dstack.drain(n - 4..n - 2).collect();
                self.dstack.extend(moved);
            }
            OP_IFDUP => {
                let top = self.peek(&name)?.clone();
                if as_bool(&top) {
                    self.dstack.push(top);
                }
            }
            OP_DEPTH => self.dstack.push(num::encode(self.dstack.len() as i64)),
            OP_DROP => {
                self.pop(&name)?;
            }
            OP_DUP => self.duplicate(&name, 1, 1)?,
            OP_NIP => {
                self.require(&name, 2)?;
                let n = self.dstack.len();
                self.dstack.remove(n - 2);
            }
            OP_OVER => self.duplicate(&name, 2, 1)?,
            OP_PICK | OP_ROLL => {
                let depth = self.pop_num(&name)?;
                let have = self.dstack.len();
                if depth < 0 || depth as usize >= have {
                    return Err(EngineError::StackUnderflow {
                        op: name,
                        needed: depth.max(0) as usize + 1,
                        have,
                    });
                }
                let index = have - 1 - depth as usize;
                let item = if code == OP_ROLL {
                    self.dstack.remove(index)
                } else {
                    self.dstack[index].clone()
                };
                self.dstack.push(item);
            }
            OP_ROT => {
                self.require(&name, 3)?;
                let n = self.dstack.len();
                let item = self.dstack.remove(n - 3);
                self.dstack.push(item);
            }
            OP_SWAP => {
                self.require(&name, 2)?;
                let n = self.dstack.len();
                self.dstack.swap(n - 1, n - 2);
            }
            OP_TUCK => {
                self.require(&name, 2)?;
                let n = self.dstack.len();
                let top = self.dstack[n - 1].clone();
                self.dstack.insert(n - 2, top);
            }
            OP_SIZE => {
                let size = self.peek(&name)?.len();
                self.dstack.push(num::encode(size as i64));
            }

            OP_EQUAL | OP_EQUALVERIFY => {
                let a = self.pop(&name)?;
                let b = self.pop(&name)?;
                if code == OP_EQUALVERIFY {
                    if a != b {
                        return Err(EngineError::VerifyFailed(name));
                    }
                } else {
                    self.dstack.push(num::from_bool(a == b));
                }
            }

            OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                let value = self.pop_num(&name)?;
                let result = match code {
                    OP_1ADD => value + 1,
                    OP_1SUB => value - 1,
                    OP_NEGATE => -value,
                    OP_ABS => value.abs(),
                    OP_NOT => (value == 0) as i64,
                    _ => (value != 0) as i64,
                };
                self.dstack.push(num::encode(result));
            }

            OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
            | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
            | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                let b = self.pop_num(&name)?;
                let a = self.pop_num(&name)?;
                let result = match code {
                    OP_ADD => a + b,
                    OP_SUB => a - b,
                    OP_BOOLAND => (a != 0 && b != 0) as i64,
                    OP_BOOLOR => (a != 0 || b != 0) as i64,
                    OP_NUMEQUAL | OP_NUMEQUALVERIFY => (a == b) as i64,
                    OP_NUMNOTEQUAL => (a != b) as i64,
                    OP_LESSTHAN => (a < b) as i64,
                    OP_GREATERTHAN => (a > b) as i64,
                    OP_LESSTHANOREQUAL => (a <= b) as i64,
                    OP_GREATERTHANOREQUAL => (a >= b) as i64,
                    OP_MIN => a.min(b),
                    _ => a.max(b),
                };
                if code == OP_NUMEQUALVERIFY {
                    if result == 0 {
                        return Err(EngineError::VerifyFailed(name));
                    }
                } else {
                    self.dstack.push(num::encode(result));
                }
            }
            OP_WITHIN => {
                let max = self.pop_num(&name)?;
                let min = self.pop_num(&name)?;
                let x = self.pop_num(&name)?;
                self.dstack.push(num::from_bool(min <= x && x < max));
            }

            OP_RIPEMD160 => {
                let data = self.pop(&name)?;
                self.dstack
                    .push(ripemd160::Hash::hash(&data).to_byte_array().to_vec());
            }
            OP_SHA1 => {
                let data = self.pop(&name)?;
                self.dstack.push(sha1::Hash::hash(&data).to_byte_array().to_vec());
            }
            OP_SHA256 => {
                let data = self.pop(&name)?;
                self.dstack
                    .push(sha256::Hash::hash(&data).to_byte_array().to_vec());
            }
            OP_HASH160 => {
                let data = self.pop(&name)?;
                self.dstack
                    .push(hash160::Hash::hash(&data).to_byte_array().to_vec());
            }
            OP_HASH256 => {
                let data = self.pop(&name)?;
                self.dstack
                    .push(sha256d::Hash::hash(&data).to_byte_array().to_vec());
            }

            OP_CODESEPARATOR => self.last_code_sep = self.script_off + 1,
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let pubkey = self.pop(&name)?;
                let signature = self.pop(&name)?;
                let valid = self.check_signature(&signature, &pubkey)?;
                if code == OP_CHECKSIGVERIFY {
                    if !valid {
                        return Err(EngineError::VerifyFailed(name));
                    }
                } else {
                    self.dstack.push(num::from_bool(valid));
                }
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let valid = self.check_multisig(&name)?;
                if code == OP_CHECKMULTISIGVERIFY {
                    if !valid {
                        return Err(EngineError::VerifyFailed(name));
                    }
                } else {
                    self.dstack.push(num::from_bool(valid));
                }
            }

            OP_CLTV => self.check_lock_time(&name)?,
            OP_CSV => self.check_sequence(&name)?,

            OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => {
                return Err(EngineError::ReservedOpcode(name));
            }

            _ => return Err(EngineError::UnsupportedOpcode(name)),
        }

        Ok(())
    }

    fn require(&self, op: &str, needed: usize) -> Result<(), EngineError> {
        if self.dstack.len() < needed {
            return Err(EngineError::StackUnderflow {
                op: op.to_string(),
                needed,
                have: self.dstack.len(),
            });
        }
        Ok(())
    }

    fn pop(&mut self, op: &str) -> Result<Vec<u8>, EngineError> {
        self.require(op, 1)?;
        Ok(self.dstack.pop().unwrap_or_default())
    }

    fn peek(&self, op: &str) -> Result<&Vec<u8>, EngineError> {
        self.require(op, 1)?;
        Ok(&self.dstack[self.dstack.len() - 1])
    }

    fn pop_num(&mut self, op: &str) -> Result<i64, EngineError> {
        let item = self.pop(op)?;
        num::decode(&item, DEFAULT_NUM_LEN)
    }

    /// Copy `count` items starting `depth` items below the top onto the top
    fn duplicate(&mut self, op: &str, depth: usize, count: usize) -> Result<(), EngineError> {
        self.require(op, depth)?;
        let start = self.dstack.len() - depth;
        let copied: Vec<_> = self.dstack[start..start + count].to_vec();
        self.dstack.extend(copied);
        Ok(())
    }

    /// Script code for signature hashing: the running script from the last
    /// `OP_CODESEPARATOR` on
    fn script_code(&self) -> &[u8] {
        let raw = &self.raw_scripts[self.script_idx];
        let start = self.scripts[self.script_idx]
            .get(self.last_code_sep)
            .map_or(raw.len(), |op| op.start);
        &raw[start..]
    }

    fn check_signature(&self, signature: &[u8], pubkey: &[u8]) -> Result<bool, EngineError> {
        let Some((hash_type, der)) = signature.split_last() else {
            return Ok(false);
        };

        let mut signature = if self.flags.strict_der {
            Signature::from_der(der).map_err(|_| EngineError::SignatureEncoding)?
        } else {
            match Signature::from_der_lax(der) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            }
        };
        signature.normalize_s();

        let pubkey = match PublicKey::from_slice(pubkey) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };

        let hash_type = *hash_type as u32;
        let digest = if self.flags.sighash_forkid {
            if hash_type & SIGHASH_FORKID == 0 {
                return Err(EngineError::MustUseForkId);
            }
            forkid_signature_hash(
                &self.tx,
                self.input_index,
                self.script_code(),
                self.amount,
                hash_type,
            )?
        } else {
            SighashCache::new(self.tx.as_ref())
                .legacy_signature_hash(
                    self.input_index,
                    Script::from_bytes(self.script_code()),
                    hash_type,
                )
                .map_err(|e| EngineError::Sighash(e.to_string()))?
                .to_byte_array()
        };
        let message = Message::from_digest(digest);

        Ok(verifier()
            .verify_ecdsa(&message, &signature, &pubkey)
            .is_ok())
    }

    fn check_multisig(&mut self, op: &str) -> Result<bool, EngineError> {
        let key_count = self.pop_num(op)?;
        if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&key_count) {
            return Err(EngineError::InvalidPubKeyCount(key_count));
        }
        self.num_ops += key_count as usize;
        if self.num_ops > MAX_OPS_PER_SCRIPT {
            return Err(EngineError::TooManyOperations(MAX_OPS_PER_SCRIPT));
        }
        let pubkeys = self.pop_many(op, key_count as usize)?;

        let sig_count = self.pop_num(op)?;
        if !(0..=key_count).contains(&sig_count) {
            return Err(EngineError::InvalidSignatureCount(sig_count));
        }
        let signatures = self.pop_many(op, sig_count as usize)?;

        // Extra item consumed by a historical off-by-one
        let dummy = self.pop(op)?;
        if self.flags.null_dummy && !dummy.is_empty() {
            return Err(EngineError::NullDummy(dummy.len()));
        }

        // Signatures must appear in the same order as their keys
        let (mut sig_idx, mut key_idx) = (0, 0);
        while sig_idx < signatures.len() {
            if signatures.len() - sig_idx > pubkeys.len() - key_idx {
                return Ok(false);
            }
            if self.check_signature(&signatures[sig_idx], &pubkeys[key_idx])? {
                sig_idx += 1;
            }
            key_idx += 1;
        }
        Ok(true)
    }

    /// Pop `count` items, returned deepest first
    fn pop_many(&mut self, op: &str, count: usize) -> Result<Vec<Vec<u8>>, EngineError> {
        self.require(op, count)?;
        let at = self.dstack.len() - count;
        Ok(self.dstack.split_off(at))
    }

    fn check_lock_time(&self, op: &str) -> Result<(), EngineError> {
        if !self.flags.verify_locktime {
            return Ok(());
        }

        let lock_time = num::decode(self.peek(op)?, LOCKTIME_NUM_LEN)?;
        if lock_time < 0 {
            return Err(EngineError::NegativeLockTime(lock_time));
        }

        let tx_lock_time = self.tx.lock_time.to_consensus_u32() as i64;
        if (tx_lock_time < LOCKTIME_THRESHOLD) != (lock_time < LOCKTIME_THRESHOLD) {
            return Err(EngineError::UnsatisfiedLockTime(format!(
                "mismatched locktime types: transaction {tx_lock_time}, script {lock_time}"
            )));
        }
        if lock_time > tx_lock_time {
            return Err(EngineError::UnsatisfiedLockTime(format!(
                "locktime {lock_time} is greater than the transaction locktime {tx_lock_time}"
            )));
        }

        let sequence = self.tx.input[self.input_index].sequence.to_consensus_u32();
        if sequence == u32::MAX {
            return Err(EngineError::UnsatisfiedLockTime(
                "transaction input is finalized".to_string(),
            ));
        }
        Ok(())
    }

    fn check_sequence(&self, op: &str) -> Result<(), EngineError> {
        if !self.flags.verify_locktime {
            return Ok(());
        }

        let sequence = num::decode(self.peek(op)?, LOCKTIME_NUM_LEN)?;
        if sequence < 0 {
            return Err(EngineError::NegativeLockTime(sequence));
        }

        // Disabled relative locks behave as a NOP
        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return Ok(());
        }

        if self.tx.version.0 < 2 {
            return Err(EngineError::UnsatisfiedLockTime(format!(
                "invalid transaction version {}",
                self.tx.version.0
            )));
        }

        let tx_sequence = self.tx.input[self.input_index].sequence.to_consensus_u32() as i64;
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return Err(EngineError::UnsatisfiedLockTime(
                "transaction sequence has the disable flag set".to_string(),
            ));
        }

        let mask = SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK;
        let (required, actual) = (sequence & mask, tx_sequence & mask);
        if (required < SEQUENCE_LOCKTIME_TYPE_FLAG) != (actual < SEQUENCE_LOCKTIME_TYPE_FLAG) {
            return Err(EngineError::UnsatisfiedLockTime(format!(
                "mismatched sequence types: transaction {actual}, script {required}"
            )));
        }
        if required > actual {
            return Err(EngineError::UnsatisfiedLockTime(format!(
                "sequence {required} is greater than the input sequence {actual}"
            )));
        }
        Ok(())
    }
}

impl ScriptEngine for LegacyEngine {
    fn step(&mut self) -> Result<bool, EngineError> {
        let op = self
            .current_op()
            .cloned()
            .ok_or(EngineError::InvalidProgramCounter)?;

        trace!(
            script = self.script_idx,
            offset = self.script_off,
            op = %op.token(),
            "executing"
        );
        self.execute_op(&op)?;

        let combined = self.dstack.len() + self.astack.len();
        if combined > MAX_STACK_SIZE {
            return Err(EngineError::StackOverflow {
                size: combined,
                max: MAX_STACK_SIZE,
            });
        }

        self.script_off += 1;
        if self.script_off < self.scripts[self.script_idx].len() {
            return Ok(false);
        }
        self.finish_script()
    }

    fn disasm_pc(&self) -> Result<String, EngineError> {
        let op = self.current_op().ok_or(EngineError::InvalidProgramCounter)?;
        Ok(format!(
            "{:02x}:{:04x}: {}",
            self.script_idx,
            self.script_off,
            op.token()
        ))
    }

    fn stack(&self) -> Vec<Vec<u8>> {
        self.dstack.clone()
    }

    fn alt_stack(&self) -> Vec<Vec<u8>> {
        self.astack.clone()
    }

    fn is_branch_executing(&self) -> bool {
        self.cond_stack.last().map_or(true, |cond| *cond == Cond::True)
    }

    fn check_error_condition(&self, final_script: bool) -> Result<(), EngineError> {
        if self.script_idx < self.scripts.len() {
            return Err(EngineError::ScriptUnfinished {
                index: self.script_idx,
                count: self.scripts.len(),
            });
        }

        let top = self.dstack.last().ok_or(EngineError::EmptyStack)?;
        if final_script && self.flags.clean_stack && self.dstack.len() != 1 {
            return Err(EngineError::CleanStack(self.dstack.len()));
        }
        if !as_bool(top) {
            return Err(EngineError::EvalFalse);
        }
        Ok(())
    }
}

/// Fork-id signature hash: the BIP143 digest layout, committing to the spent
/// amount, with the full hash type (fork-id bit included) appended
pub(crate) fn forkid_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: Amount,
    hash_type: u32,
) -> Result<[u8; 32], EngineError> {
    let txin = tx.input.get(input_index).ok_or(EngineError::InvalidInputIndex {
        index: input_index,
        count: tx.input.len(),
    })?;

    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;
    let base_type = hash_type & 0x1f;
    let single_or_none = base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE;

    let hash_prevouts = if anyone_can_pay {
        [0u8; 32]
    } else {
        let prevouts: Vec<u8> = tx
            .input
            .iter()
            .flat_map(|txin| consensus::serialize(&txin.previous_output))
            .collect();
        sha256d::Hash::hash(&prevouts).to_byte_array()
    };

    let hash_sequence = if anyone_can_pay || single_or_none {
        [0u8; 32]
    } else {
        let sequences: Vec<u8> = tx
            .input
            .iter()
            .flat_map(|txin| consensus::serialize(&txin.sequence))
            .collect();
        sha256d::Hash::hash(&sequences).to_byte_array()
    };

    let hash_outputs = if !single_or_none {
        let outputs: Vec<u8> = tx.output.iter().flat_map(consensus::serialize).collect();
        sha256d::Hash::hash(&outputs).to_byte_array()
    } else if base_type == SIGHASH_SINGLE && input_index < tx.output.len() {
        sha256d::Hash::hash(&consensus::serialize(&tx.output[input_index])).to_byte_array()
    } else {
        [0u8; 32]
    };

    let mut preimage = consensus::serialize(&tx.version);
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend(consensus::serialize(&txin.previous_output));
    preimage.extend(consensus::serialize(&ScriptBuf::from_bytes(script_code.to_vec())));
    preimage.extend(consensus::serialize(&amount.to_sat()));
    preimage.extend(consensus::serialize(&txin.sequence));
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend(consensus::serialize(&tx.lock_time));
    preimage.extend(consensus::serialize(&hash_type));

    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

fn is_disabled(code: Opcode) -> bool {
    matches!(
        code.to_u8(),
        0x7e..=0x81 | 0x83..=0x86 | 0x8d | 0x8e | 0x95..=0x99
    )
}

fn is_conditional(code: Opcode) -> bool {
    matches!(code, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF)
}

fn verifier() -> &'static Secp256k1<VerifyOnly> {
    static CONTEXT: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::verification_only)
}
