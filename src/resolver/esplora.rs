//! Blocking client for an Esplora-style REST API

use super::{PrevOut, ResolveError, TransactionSource};
use bitcoin::{Amount, OutPoint, Txid};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public endpoint used when none is given
pub const DEFAULT_ENDPOINT: &str = "https://blockstream.info/api";

/// Per-request timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct EsploraTx {
    vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraOutput {
    scriptpubkey: String,
    value: u64,
}

/// Esplora HTTP client, built once at startup
#[derive(Debug, Clone)]
pub struct EsploraClient {
    agent: ureq::Agent,
    base_url: String,
}

impl EsploraClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        EsploraClient {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str, what: &str) -> Result<String, ResolveError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(ResolveError::NotFound(what.to_string())),
            Err(ureq::Error::Status(code, _)) => {
                return Err(ResolveError::Network(format!("{url} returned HTTP {code}")))
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ResolveError::Network(transport.to_string()))
            }
        };

        response
            .into_string()
            .map_err(|e| ResolveError::Network(format!("reading {url}: {e}")))
    }
}

impl TransactionSource for EsploraClient {
    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ResolveError> {
        let body = self.get(&format!("/tx/{txid}/hex"), &format!("transaction {txid}"))?;
        hex::decode(body.trim())
            .map_err(|e| ResolveError::MalformedInput(format!("transaction {txid} hex: {e}")))
    }

    fn previous_output(&self, outpoint: &OutPoint) -> Result<PrevOut, ResolveError> {
        let body = self.get(
            &format!("/tx/{}", outpoint.txid),
            &format!("transaction {}", outpoint.txid),
        )?;
        parse_output(&body, outpoint)
    }
}

/// Pick the spent output out of an Esplora transaction document
fn parse_output(body: &str, outpoint: &OutPoint) -> Result<PrevOut, ResolveError> {
    let tx: EsploraTx = serde_json::from_str(body).map_err(|e| {
        ResolveError::MalformedInput(format!("transaction {} document: {e}", outpoint.txid))
    })?;

    let output = tx
        .vout
        .get(outpoint.vout as usize)
        .ok_or_else(|| ResolveError::NotFound(format!("output {outpoint}")))?;

    let locking_script = hex::decode(&output.scriptpubkey).map_err(|e| {
        ResolveError::MalformedInput(format!("output {outpoint} locking script: {e}"))
    })?;

    Ok(PrevOut {
        locking_script,
        amount: Amount::from_sat(output.value),
        token_data: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    const DOCUMENT: &str = r#"{
        "txid": "00",
        "vout": [
            {"scriptpubkey": "51", "scriptpubkey_type": "unknown", "value": 1000},
            {"scriptpubkey": "a914000000000000000000000000000000000000000087", "value": 25000}
        ]
    }"#;

    fn outpoint(vout: u32) -> OutPoint {
        OutPoint::new(Txid::all_zeros(), vout)
    }

    #[test]
    fn test_parse_output_picks_vout() {
        let prevout = parse_output(DOCUMENT, &outpoint(1)).unwrap();
        assert_eq!(prevout.amount, Amount::from_sat(25_000));
        assert_eq!(prevout.locking_script.len(), 23);
        assert_eq!(prevout.token_data, None);
    }

    #[test]
    fn test_parse_output_missing_vout() {
        let err = parse_output(DOCUMENT, &outpoint(5)).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_parse_output_rejects_bad_document() {
        let err = parse_output("<html>", &outpoint(0)).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedInput(_)));

        let bad_hex = r#"{"vout": [{"scriptpubkey": "zz", "value": 1}]}"#;
        let err = parse_output(bad_hex, &outpoint(0)).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedInput(_)));
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = EsploraClient::new("https://example.org/api/", DEFAULT_TIMEOUT);
        assert_eq!(client.base_url(), "https://example.org/api");
    }
}
