//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model with pluggable input authorisation)
//! - Difficulty (compact bits and periodic retargeting)
//! - Blocks (with proof of work and merkle commitments)
//! - UTXO ledger (atomic block application)
//! - Blockchain (chain management and full validation)

pub mod block;
pub mod blockchain;
pub mod config;
pub mod difficulty;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockError, BlockHeader, MiningControl};
pub use blockchain::{Blockchain, BlockchainError, ChainStats};
pub use config::{
    ChainConfig, ConfigError, BLOCK_REWARD, DEFAULT_GENESIS_BITS, DIFFICULTY_ADJUSTMENT_INTERVAL,
    GENESIS_REWARD, HARDEST_BITS, MAX_DIFFICULTY_ADJUSTMENT_FACTOR, POW_LIMIT_BITS,
    TARGET_BLOCK_TIME,
};
pub use difficulty::{
    bits_to_target, difficulty, target_to_bits, DifficultyController, DifficultyError,
    RetargetParams, Target,
};
pub use transaction::{
    PresenceVerifier, SignatureVerifier, Transaction, TransactionBuilder, TransactionError,
    TransactionInput, TransactionOutput, UTXO,
};
pub use utxo::{LedgerError, OutPoint, UtxoLedger};
