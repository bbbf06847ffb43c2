//! Submission boundary
//!
//! The payloads exchanged with the remote relay: an unsigned transaction
//! comes in, a signed one goes out together with its trade metadata. The
//! relay broadcasts and reports back; its answer is passed to the caller
//! untouched.
//!
//! Transactions travel as standard base64 inside JSON:
//!
//! ```json
//! {"unsigned_tx": "AQAAAA..."}
//! {"signed_tx": "AX3f...", "tx_type": "SWAP", "token_mint": "So11...", "amount": 0.5}
//! ```

use crate::store::SecretStore;
use crate::transaction::Transaction;
use crate::vault::{Vault, VaultError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Invalid transaction encoding: {0}")]
    Encoding(String),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// Kind of trade a transaction performs
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxType {
    Buy,
    Sell,
    #[default]
    Swap,
}

impl std::str::FromStr for TxType {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(TxType::Buy),
            "SELL" => Ok(TxType::Sell),
            "SWAP" => Ok(TxType::Swap),
            other => Err(SubmissionError::Encoding(format!("unknown tx type {:?}", other))),
        }
    }
}

/// Unsigned transaction as delivered by the relay
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTxEnvelope {
    /// Base64 transaction bytes
    pub unsigned_tx: String,
}

impl UnsignedTxEnvelope {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            unsigned_tx: BASE64.encode(bytes),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SubmissionError> {
        decode_base64(&self.unsigned_tx)
    }
}

/// Trade metadata carried alongside the signed transaction
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TxMetadata {
    #[serde(default)]
    pub tx_type: TxType,
    /// Mint address of the traded token
    #[serde(default)]
    pub token_mint: String,
    /// Trade size in SOL
    #[serde(default)]
    pub amount: f64,
}

/// Signed transaction handed to the relay for broadcast
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignedSubmission {
    /// Base64 transaction bytes
    pub signed_tx: String,
    #[serde(flatten)]
    pub metadata: TxMetadata,
}

impl SignedSubmission {
    pub fn new(signed: &[u8], metadata: TxMetadata) -> Self {
        Self {
            signed_tx: BASE64.encode(signed),
            metadata,
        }
    }

    pub fn signed_bytes(&self) -> Result<Vec<u8>, SubmissionError> {
        decode_base64(&self.signed_tx)
    }

    /// Base-58 transaction signature the network will know this transaction by
    pub fn transaction_id(&self) -> Result<String, SubmissionError> {
        let tx = Transaction::parse(self.signed_bytes()?)
            .map_err(|e| SubmissionError::Encoding(e.to_string()))?;
        Ok(tx.transaction_id())
    }
}

/// Lifecycle of a submitted transaction as reported by the relay
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
    Expired,
}

/// Relay's answer to a submission
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub confirmations: u32,
    /// Lifecycle state when the relay reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TxStatus>,
}

impl SubmissionResult {
    /// Relay-reported status, otherwise inferred from `success` and `confirmations`
    pub fn status(&self) -> TxStatus {
        if let Some(status) = self.status {
            return status;
        }
        match (self.success, self.confirmations) {
            (false, _) => TxStatus::Failed,
            (true, 0) => TxStatus::Submitted,
            (true, _) => TxStatus::Confirmed,
        }
    }
}

/// The remote party that broadcasts signed transactions
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(
        &self,
        submission: &SignedSubmission,
    ) -> Result<SubmissionResult, SubmissionError>;
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, SubmissionError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| SubmissionError::Encoding(e.to_string()))
}

/// Sign a relay-supplied transaction with the unlocked vault secret
pub async fn prepare_submission<S: SecretStore + 'static>(
    vault: &Vault<S>,
    envelope: &UnsignedTxEnvelope,
    metadata: TxMetadata,
) -> Result<SignedSubmission, SubmissionError> {
    let unsigned = envelope.to_bytes()?;
    let signed = vault.sign_transaction(&unsigned).await?;
    Ok(SignedSubmission::new(&signed, metadata))
}

/// Sign and hand off to the gateway; the gateway's result is returned as-is.
pub async fn sign_and_submit<S, G>(
    vault: &Vault<S>,
    gateway: &G,
    envelope: &UnsignedTxEnvelope,
    metadata: TxMetadata,
) -> Result<SubmissionResult, SubmissionError>
where
    S: SecretStore + 'static,
    G: SubmissionGateway + ?Sized,
{
    let submission = prepare_submission(vault, envelope, metadata).await?;
    if let Ok(id) = submission.transaction_id() {
        log::info!(
            "Submitting {:?} transaction {}",
            submission.metadata.tx_type,
            id
        );
    }

    let result = gateway.submit(&submission).await?;
    match &result.error {
        Some(error) => log::warn!("Relay reported failure: {}", error),
        None => log::info!("Relay status: {:?}", result.status()),
    }
    Ok(result)
}
