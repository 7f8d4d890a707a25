//! Block implementation for the ledger
//!
//! A block contains a header with metadata and a list of transactions.
//! Blocks are assembled on top of a parent, mined by searching the nonce
//! space, and frozen once appended to the chain.

use crate::core::difficulty::{bits_to_target, DifficultyError, Target};
use crate::core::transaction::Transaction;
use crate::crypto::{
    calculate_merkle_root_hex, decode_hash, double_sha256, hash_meets_target, leaf_from_hex,
    MerkleProof,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation and mining errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Invalid block hash")]
    InvalidBlockHash,
    #[error("Transaction id does not match its content: {0}")]
    InvalidTransactionId(String),
    #[error("Invalid difficulty bits: {0}")]
    InvalidBits(#[from] DifficultyError),
    #[error("Mining cancelled after {0} attempts")]
    MiningCancelled(u64),
    #[error("Mining gave up after {0} attempts")]
    AttemptLimitReached(u64),
    #[error("Nonce space exhausted")]
    NonceSpaceExhausted,
}

// =============================================================================
// Mining control
// =============================================================================

/// Bounds and cancellation for a nonce search
///
/// The default control never stops a search before it succeeds.
#[derive(Debug, Clone, Default)]
pub struct MiningControl {
    /// Give up after this many hash attempts
    pub max_attempts: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl MiningControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Abort the search once `flag` is set; checked before every attempt
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

// =============================================================================
// Block Header
// =============================================================================

/// Block header containing metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block height (0 = genesis)
    pub height: u64,
    /// Block creation timestamp, whole seconds
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of all transactions
    pub merkle_root: String,
    /// Compact difficulty target
    pub bits: u32,
    /// Nonce used for proof of work
    pub nonce: u64,
    /// Hash of every other header field
    pub hash: String,
}

impl BlockHeader {
    /// Calculate the hash of the block header
    pub fn calculate_hash(&self) -> String {
        let mut data = Vec::with_capacity(160);
        data.extend_from_slice(&self.height.to_be_bytes());
        data.extend_from_slice(&self.timestamp.timestamp().to_be_bytes());
        data.extend_from_slice(self.previous_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.bits.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        hex::encode(double_sha256(&data))
    }

    /// Expanded target for this header's bits
    pub fn target(&self) -> Result<Target, DifficultyError> {
        bits_to_target(self.bits)
    }

    /// Check if the stored hash meets the header's own target
    pub fn meets_target(&self) -> bool {
        match (decode_hash(&self.hash), self.target()) {
            (Some(hash), Ok(target)) => hash_meets_target(&hash, &target),
            _ => false,
        }
    }
}

// =============================================================================
// Block
// =============================================================================

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(
        height: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        bits: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let merkle_root = Self::calculate_merkle_root(&transactions);

        let mut header = BlockHeader {
            height,
            timestamp: timestamp.trunc_subsecs(0),
            previous_hash,
            merkle_root,
            bits,
            nonce: 0,
            hash: String::new(),
        };
        header.hash = header.calculate_hash();

        Self {
            header,
            transactions,
        }
    }

    /// Assemble an unmined block on top of `parent`
    pub fn assemble(parent: &Block, transactions: Vec<Transaction>, bits: u32) -> Self {
        Self::new(
            parent.header.height + 1,
            parent.header.hash.clone(),
            transactions,
            bits,
            Utc::now(),
        )
    }

    /// Block height
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Block hash
    pub fn hash(&self) -> &str {
        &self.header.hash
    }

    /// Calculate the merkle root from transactions
    fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let tx_ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
        calculate_merkle_root_hex(&tx_ids)
    }

    /// Mine the block (find a valid nonce), returning the number of attempts
    pub fn mine(&mut self) -> Result<u64, BlockError> {
        self.mine_with(&MiningControl::unbounded())
    }

    /// Mine the block under the given bounds
    pub fn mine_with(&mut self, control: &MiningControl) -> Result<u64, BlockError> {
        let target = self.header.target()?;
        let mut attempts = 0u64;
        let mut nonce = self.header.nonce;

        loop {
            if control.is_cancelled() {
                return Err(BlockError::MiningCancelled(attempts));
            }
            if control.max_attempts.map_or(false, |max| attempts >= max) {
                return Err(BlockError::AttemptLimitReached(attempts));
            }

            self.header.nonce = nonce;
            self.header.hash = self.header.calculate_hash();
            attempts += 1;

            if let Some(hash) = decode_hash(&self.header.hash) {
                if hash_meets_target(&hash, &target) {
                    return Ok(attempts);
                }
            }

            nonce = nonce.checked_add(1).ok_or(BlockError::NonceSpaceExhausted)?;
        }
    }

    /// Check if the proof of work is valid
    pub fn is_valid_pow(&self) -> bool {
        self.header.meets_target()
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.header.merkle_root
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.header.hash == self.header.calculate_hash()
    }

    /// Full self-contained validation (hash + merkle + PoW + tx ids)
    pub fn validate(&self) -> Result<(), BlockError> {
        if !self.verify_hash() {
            return Err(BlockError::InvalidBlockHash);
        }

        if let Some(tx) = self.transactions.iter().find(|tx| !tx.verify_id()) {
            return Err(BlockError::InvalidTransactionId(tx.id.clone()));
        }

        if !self.verify_merkle_root() {
            return Err(BlockError::InvalidMerkleRoot);
        }

        self.header.target()?;
        if !self.is_valid_pow() {
            return Err(BlockError::InvalidProofOfWork);
        }

        Ok(())
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Get the value minted by this block's coinbase
    pub fn mining_reward(&self) -> u64 {
        self.coinbase_tx().map(|tx| tx.total_output()).unwrap_or(0)
    }

    /// Build an inclusion proof for the transaction at `index`
    pub fn merkle_proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|tx| leaf_from_hex(&tx.id))
            .collect();
        MerkleProof::build(&leaves, index)
    }

    /// Check an inclusion proof against this block's merkle root
    pub fn verify_inclusion(&self, tx_id: &str, proof: &MerkleProof) -> bool {
        match hex::decode(&self.header.merkle_root) {
            Ok(root) => proof.verify(&leaf_from_hex(tx_id), &root),
            Err(_) => false,
        }
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
