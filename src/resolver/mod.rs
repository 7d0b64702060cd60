//! Script source resolution
//!
//! Everything needed to build a session comes from the command line, from a
//! [`TransactionSource`], or from both: the spending transaction (hex, or a
//! txid to look up), the locking script of the output it spends, and that
//! output's amount. Lookups are one-shot and happen before any stepping.

pub mod esplora;

pub use esplora::EsploraClient;

use bitcoin::{consensus, Amount, OutPoint, Transaction, Txid};
use thiserror::Error;
use tracing::{debug, info};

/// Fungible or non-fungible token attached to an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    pub category: [u8; 32],
    pub amount: u64,
    pub commitment: Vec<u8>,
    pub bitfield: u8,
}

/// The output an input spends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrevOut {
    pub locking_script: Vec<u8>,
    pub amount: Amount,
    pub token_data: Option<TokenData>,
}

/// Lookup service for transactions that are already on chain
pub trait TransactionSource {
    /// Serialized transaction with the given id
    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ResolveError>;

    /// The output referenced by `outpoint`
    fn previous_output(&self, outpoint: &OutPoint) -> Result<PrevOut, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// What the user supplied for the input to debug
#[derive(Debug, Clone, Default)]
pub struct InputRequest {
    /// Transaction hex or txid
    pub transaction: String,
    pub input_index: usize,
    /// Amount in satoshis; zero means look it up
    pub amount: Option<u64>,
    /// Locking script hex; absent means look it up
    pub locking_script: Option<String>,
}

/// A fully resolved input, ready for assembly
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub tx: Transaction,
    pub input_index: usize,
    pub locking_script: Vec<u8>,
    pub amount: Amount,
    pub token_data: Option<TokenData>,
}

/// Decode `transaction` as hex, or fetch it when it parses as a txid
pub fn resolve_transaction<S: TransactionSource + ?Sized>(
    source: &S,
    transaction: &str,
) -> Result<Transaction, ResolveError> {
    let transaction = transaction.trim();
    let bytes = match transaction.parse::<Txid>() {
        Ok(txid) => {
            info!(%txid, "fetching transaction");
            source.raw_transaction(&txid)?
        }
        Err(_) => hex::decode(transaction)
            .map_err(|e| ResolveError::MalformedInput(format!("transaction hex: {e}")))?,
    };

    let tx: Transaction = consensus::deserialize(&bytes)
        .map_err(|e| ResolveError::MalformedInput(format!("transaction: {e}")))?;

    if tx.input.is_empty() {
        return Err(ResolveError::MalformedInput(
            "transaction has no inputs".to_string(),
        ));
    }

    debug!(txid = %tx.compute_txid(), inputs = tx.input.len(), "decoded transaction");
    Ok(tx)
}

/// Resolve the transaction, locking script and amount for one input.
///
/// The spent output is fetched at most once, and only when the locking
/// script or the amount was not supplied.
pub fn resolve_input<S: TransactionSource + ?Sized>(
    source: &S,
    request: &InputRequest,
) -> Result<ResolvedInput, ResolveError> {
    let tx = resolve_transaction(source, &request.transaction)?;

    let txin = tx.input.get(request.input_index).ok_or_else(|| {
        ResolveError::MalformedInput(format!(
            "input index {} is out of range for a transaction with {} input(s)",
            request.input_index,
            tx.input.len()
        ))
    })?;
    let outpoint = txin.previous_output;

    let locking_script = request
        .locking_script
        .as_deref()
        .map(|script| {
            hex::decode(script.trim())
                .map_err(|e| ResolveError::MalformedInput(format!("locking script hex: {e}")))
        })
        .transpose()?;
    let amount = request
        .amount
        .filter(|sats| *sats != 0)
        .map(Amount::from_sat);

    let (locking_script, amount, token_data) = match (locking_script, amount) {
        (Some(script), Some(amount)) => (script, amount, None),
        (script, amount) => {
            info!(%outpoint, "fetching spent output");
            let prevout = source.previous_output(&outpoint)?;
            (
                script.unwrap_or(prevout.locking_script),
                amount.unwrap_or(prevout.amount),
                prevout.token_data,
            )
        }
    };

    Ok(ResolvedInput {
        tx,
        input_index: request.input_index,
        locking_script,
        amount,
        token_data,
    })
}
