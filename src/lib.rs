//! Mini-Ledger: an educational UTXO ledger with proof of work
//!
//! This crate provides a small, fully in-memory chain featuring:
//! - UTXO-based transactions with content-addressed ids
//! - Merkle commitments and inclusion proofs
//! - Bitcoin-style compact difficulty bits with periodic retargeting
//! - Proof-of-work mining with attempt caps and cancellation
//! - Fail-closed block application and full chain re-validation
//!
//! # Example
//!
//! ```rust
//! use mini_ledger::core::{Blockchain, ChainConfig};
//! use mini_ledger::mining::Miner;
//!
//! // Create a new blockchain with trivial difficulty
//! let mut blockchain = Blockchain::new(ChainConfig::regtest()).unwrap();
//!
//! // Mine a block
//! let miner = Miner::new("miner");
//! let (block, stats) = miner.mine_block(&mut blockchain, vec![]).unwrap();
//! println!("Mined block {} in {}ms", block.header.height, stats.time_ms);
//!
//! // Check balance
//! assert_eq!(blockchain.get_balance("miner"), 50);
//! assert!(blockchain.is_valid());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;

// Re-export commonly used types
pub use core::{
    Block, Blockchain, BlockchainError, ChainConfig, Transaction, TransactionBuilder, UtxoLedger,
    BLOCK_REWARD,
};
pub use crypto::MerkleProof;
pub use mining::{Miner, MiningStats};
