//! Transaction handling for the ledger
//!
//! Implements a UTXO-based transaction model. Inputs carry signature and
//! public-key placeholders which are presence-checked by default; the actual
//! check is delegated to a [`SignatureVerifier`] so a real asymmetric scheme
//! can be plugged in without touching transaction or block logic.

use crate::crypto::sha256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid transaction shape: {0}")]
    InvalidTransactionShape(String),
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionInput {
    /// Transaction ID of the previous transaction
    pub tx_id: String,
    /// Index of the output in the previous transaction
    pub output_index: u32,
    /// Signature placeholder
    pub signature: String,
    /// Public key placeholder
    pub public_key: String,
}

impl TransactionInput {
    pub fn new(tx_id: &str, output_index: u32, signature: &str, public_key: &str) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            output_index,
            signature: signature.to_string(),
            public_key: public_key.to_string(),
        }
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Amount of coins
    pub amount: u64,
    /// Recipient's address
    pub recipient: String,
}

impl TransactionOutput {
    pub fn new(recipient: &str, amount: u64) -> Self {
        Self {
            amount,
            recipient: recipient.to_string(),
        }
    }

    /// Check if this output belongs to the given address
    pub fn is_owned_by(&self, address: &str) -> bool {
        self.recipient == address
    }
}

// =============================================================================
// UTXO
// =============================================================================

/// Unspent Transaction Output (UTXO)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UTXO {
    pub tx_id: String,
    pub output_index: u32,
    pub output: TransactionOutput,
}

// =============================================================================
// Signature verification
// =============================================================================

/// Authorisation check applied to every input of a non-coinbase transaction
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// `signing_data` is the digest returned by [`Transaction::signing_data`]
    fn verify_input(&self, input: &TransactionInput, signing_data: &[u8]) -> bool;
}

/// Accepts any input whose signature and public key are non-empty
///
/// This is not proof of authorisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

impl SignatureVerifier for PresenceVerifier {
    fn verify_input(&self, input: &TransactionInput, _signing_data: &[u8]) -> bool {
        !input.signature.is_empty() && !input.public_key.is_empty()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Unique transaction ID (hash of transaction data)
    pub id: String,
    /// Transaction inputs
    pub inputs: Vec<TransactionInput>,
    /// Transaction outputs
    pub outputs: Vec<TransactionOutput>,
    /// Timestamp of transaction creation
    pub timestamp: DateTime<Utc>,
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u64).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn sum_outputs(outputs: &[TransactionOutput]) -> Option<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
}

fn put_timestamp(buf: &mut Vec<u8>, timestamp: &DateTime<Utc>) {
    buf.extend_from_slice(&timestamp.timestamp().to_be_bytes());
    buf.extend_from_slice(&timestamp.timestamp_subsec_nanos().to_be_bytes());
}

impl Transaction {
    /// Create a new transaction stamped with the current time
    pub fn new(
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Result<Self, TransactionError> {
        Self::with_timestamp(inputs, outputs, Utc::now())
    }

    /// Create a transaction with an explicit timestamp
    pub fn with_timestamp(
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TransactionError> {
        if let Some(index) = outputs.iter().position(|o| o.amount == 0) {
            return Err(TransactionError::InvalidTransactionShape(format!(
                "output {} has zero value",
                index
            )));
        }
        if sum_outputs(&outputs).is_none() {
            return Err(TransactionError::InvalidTransactionShape(
                "output total overflows".to_string(),
            ));
        }

        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
            timestamp,
        };
        tx.id = tx.calculate_hash();
        Ok(tx)
    }

    /// Create a coinbase (minting) transaction
    pub fn coinbase(recipient: &str, amount: u64) -> Result<Self, TransactionError> {
        Self::new(vec![], vec![TransactionOutput::new(recipient, amount)])
    }

    /// Create a coinbase transaction with an explicit timestamp
    pub fn coinbase_at(
        recipient: &str,
        amount: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TransactionError> {
        Self::with_timestamp(vec![], vec![TransactionOutput::new(recipient, amount)], timestamp)
    }

    /// Whether this transaction has the coinbase shape (no inputs)
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Calculate the transaction hash
    ///
    /// Covers inputs, outputs and timestamp in a fixed order; never reads `id`.
    pub fn calculate_hash(&self) -> String {
        let mut data = Vec::new();

        data.extend_from_slice(&(self.inputs.len() as u64).to_be_bytes());
        for input in &self.inputs {
            put_str(&mut data, &input.tx_id);
            data.extend_from_slice(&input.output_index.to_be_bytes());
            put_str(&mut data, &input.signature);
            put_str(&mut data, &input.public_key);
        }

        data.extend_from_slice(&(self.outputs.len() as u64).to_be_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.amount.to_be_bytes());
            put_str(&mut data, &output.recipient);
        }

        put_timestamp(&mut data, &self.timestamp);

        hex::encode(sha256(&data))
    }

    /// Check that the stored id matches the content
    pub fn verify_id(&self) -> bool {
        self.id == self.calculate_hash()
    }

    /// Get the data a signature would commit to
    ///
    /// Outpoints, outputs and timestamp; signatures and keys are excluded.
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for input in &self.inputs {
            put_str(&mut data, &input.tx_id);
            data.extend_from_slice(&input.output_index.to_be_bytes());
        }
        for output in &self.outputs {
            data.extend_from_slice(&output.amount.to_be_bytes());
            put_str(&mut data, &output.recipient);
        }
        put_timestamp(&mut data, &self.timestamp);
        sha256(&data)
    }

    /// Get total output amount
    ///
    /// Saturates at `u64::MAX`; see [`checked_total_output`](Self::checked_total_output).
    pub fn total_output(&self) -> u64 {
        self.checked_total_output().unwrap_or(u64::MAX)
    }

    /// Total output amount, or `None` if it does not fit in a `u64`
    pub fn checked_total_output(&self) -> Option<u64> {
        sum_outputs(&self.outputs)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Shape validation with presence-only signature checks
    pub fn verify(&self, is_coinbase: bool) -> bool {
        self.verify_with(is_coinbase, &PresenceVerifier)
    }

    /// Shape validation delegating input authorisation to `verifier`
    pub fn verify_with(&self, is_coinbase: bool, verifier: &dyn SignatureVerifier) -> bool {
        if self.outputs.is_empty() || self.outputs.iter().any(|o| o.amount == 0) {
            return false;
        }
        if self.checked_total_output().is_none() {
            return false;
        }

        if is_coinbase {
            return self.inputs.is_empty();
        }

        if self.inputs.is_empty() {
            return false;
        }

        let signing_data = self.signing_data();
        self.inputs
            .iter()
            .all(|input| verifier.verify_input(input, &signing_data))
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for assembling spend transactions
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    signature: Option<(String, String)>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input from a UTXO
    pub fn add_input(self, utxo: &UTXO) -> Self {
        self.add_input_ref(&utxo.tx_id, utxo.output_index)
    }

    /// Add an input by outpoint
    pub fn add_input_ref(mut self, tx_id: &str, output_index: u32) -> Self {
        self.inputs
            .push(TransactionInput::new(tx_id, output_index, "", ""));
        self
    }

    /// Add an output
    pub fn add_output(mut self, recipient: &str, amount: u64) -> Self {
        self.outputs.push(TransactionOutput::new(recipient, amount));
        self
    }

    /// Attach the signature and key placeholders to every input
    pub fn placeholder_signature(mut self, signature: &str, public_key: &str) -> Self {
        self.signature = Some((signature.to_string(), public_key.to_string()));
        self
    }

    /// Build the transaction
    pub fn build(mut self) -> Result<Transaction, TransactionError> {
        if let Some((signature, public_key)) = &self.signature {
            for input in &mut self.inputs {
                input.signature = signature.clone();
                input.public_key = public_key.clone();
            }
        }
        Transaction::new(self.inputs, self.outputs)
    }
}

// =============================================================================
// Tests
// =============================================================================
