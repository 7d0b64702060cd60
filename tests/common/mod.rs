// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use scriptty::engine::{LegacyEngine, ScriptFlags, StandardDisassembler};
use scriptty::resolver::{PrevOut, ResolveError, TransactionSource};
use scriptty::script::build_segments;
use scriptty::session::{ExecutionSession, Position, SessionState, View};

/// A spend together with the output it spends
pub struct Fixture {
    pub tx: Transaction,
    pub locking_script: Vec<u8>,
    pub amount: Amount,
}

impl Fixture {
    pub fn outpoint(&self) -> OutPoint {
        self.tx.input[0].previous_output
    }

    pub fn prevout(&self) -> PrevOut {
        PrevOut {
            locking_script: self.locking_script.clone(),
            amount: self.amount,
            token_data: None,
        }
    }
}

pub fn push(script: &mut Vec<u8>, data: &[u8]) {
    assert!(data.len() < 0x4c, "fixture pushes use single-byte lengths");
    script.push(data.len() as u8);
    script.extend_from_slice(data);
}

pub fn spending_tx(signature_script: Vec<u8>) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([7; 32]), 0),
            script_sig: ScriptBuf::from_bytes(signature_script),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(90_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }],
    }
}

pub fn p2sh_locking_script(redeem_script: &[u8]) -> Vec<u8> {
    let mut script = vec![0xa9, 0x14];
    script.extend_from_slice(&hash160::Hash::hash(redeem_script).to_byte_array());
    script.push(0x87);
    script
}

pub fn public_keys() -> Vec<[u8; 33]> {
    let secp = Secp256k1::new();
    secret_keys()
        .iter()
        .map(|key| PublicKey::from_secret_key(&secp, key).serialize())
        .collect()
}

fn secret_keys() -> Vec<SecretKey> {
    [[1u8; 32], [2u8; 32]]
        .iter()
        .map(|bytes| SecretKey::from_slice(bytes).unwrap())
        .collect()
}

/// `OP_2 <pubkey1> <pubkey2> OP_2 OP_CHECKMULTISIG`
pub fn multisig_redeem_script() -> Vec<u8> {
    let mut script = vec![0x52];
    for key in public_keys() {
        push(&mut script, &key);
    }
    script.extend_from_slice(&[0x52, 0xae]);
    script
}

/// A 2-of-2 multisig wrapped in pay-to-script-hash, validly signed
pub fn p2sh_multisig() -> Fixture {
    let redeem = multisig_redeem_script();
    let mut tx = spending_tx(Vec::new());

    let sighash = SighashCache::new(&tx)
        .legacy_signature_hash(0, Script::from_bytes(&redeem), 0x01)
        .unwrap();
    let message = Message::from_digest(sighash.to_byte_array());

    let secp = Secp256k1::new();
    let mut signature_script = vec![0x00];
    for key in secret_keys() {
        let mut signature = secp.sign_ecdsa(&message, &key).serialize_der().to_vec();
        signature.push(0x01);
        push(&mut signature_script, &signature);
    }
    push(&mut signature_script, &redeem);
    tx.input[0].script_sig = ScriptBuf::from_bytes(signature_script);

    Fixture {
        tx,
        locking_script: p2sh_locking_script(&redeem),
        amount: Amount::from_sat(100_000),
    }
}

/// `OP_0 | OP_IF OP_2 OP_3 OP_ADD OP_DROP OP_ENDIF OP_1`
pub fn skipped_branch() -> Fixture {
    Fixture {
        tx: spending_tx(vec![0x00]),
        locking_script: vec![0x63, 0x52, 0x53, 0x93, 0x75, 0x68, 0x51],
        amount: Amount::from_sat(1_000),
    }
}

/// `OP_1 OP_2 | OP_EQUALVERIFY OP_1`, failing on its third step
pub fn failing_verify() -> Fixture {
    Fixture {
        tx: spending_tx(vec![0x51, 0x52]),
        locking_script: vec![0x88, 0x51],
        amount: Amount::from_sat(1_000),
    }
}

pub fn session(fixture: &Fixture) -> ExecutionSession<LegacyEngine> {
    let segments = build_segments(
        &StandardDisassembler,
        &fixture.tx,
        0,
        &fixture.locking_script,
    )
    .unwrap();
    let engine = LegacyEngine::new(
        &fixture.locking_script,
        &fixture.tx,
        0,
        ScriptFlags::STANDARD,
        fixture.amount,
    )
    .unwrap();
    ExecutionSession::new(segments, engine).unwrap()
}

/// Owned copy of the parts of a view that stepping changes
pub type Observed = (Position, Vec<Vec<u8>>, Vec<Vec<u8>>, SessionState);

pub fn observe(view: View<'_>) -> Observed {
    (view.position, view.stack, view.alt_stack, view.state)
}

/// In-memory transaction source that counts lookups
#[derive(Default)]
pub struct FakeSource {
    pub transactions: HashMap<Txid, Vec<u8>>,
    pub outputs: HashMap<OutPoint, PrevOut>,
    pub transaction_lookups: Cell<usize>,
    pub output_lookups: Cell<usize>,
}

impl FakeSource {
    pub fn with_fixture(fixture: &Fixture) -> Self {
        let mut source = FakeSource::default();
        source.transactions.insert(
            fixture.tx.compute_txid(),
            bitcoin::consensus::serialize(&fixture.tx),
        );
        source.outputs.insert(fixture.outpoint(), fixture.prevout());
        source
    }
}

impl TransactionSource for FakeSource {
    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ResolveError> {
        self.transaction_lookups.set(self.transaction_lookups.get() + 1);
        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(format!("transaction {txid}")))
    }

    fn previous_output(&self, outpoint: &OutPoint) -> Result<PrevOut, ResolveError> {
        self.output_lookups.set(self.output_lookups.get() + 1);
        self.outputs
            .get(outpoint)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(format!("output {outpoint}")))
    }
}
