//! Mining engine for the ledger
//!
//! Wraps chain extension with timing and hash-rate statistics.

use crate::core::{Block, Blockchain, BlockchainError, MiningControl, Transaction};
use log::info;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn measure(hash_attempts: u64, start: Instant) -> Self {
        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (hash_attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };

        Self {
            hash_attempts,
            time_ms: elapsed,
            hash_rate,
        }
    }
}

/// Miner for creating new blocks
#[derive(Debug, Clone)]
pub struct Miner {
    /// Miner's address for receiving rewards
    pub address: String,
    control: MiningControl,
}

impl Miner {
    /// Create a new miner
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            control: MiningControl::unbounded(),
        }
    }

    /// Bound or cancel every search this miner runs
    pub fn with_control(mut self, control: MiningControl) -> Self {
        self.control = control;
        self
    }

    /// Mine a new block with the given transactions
    ///
    /// The coinbase pays the block reward plus the fees of `transactions`.
    pub fn mine_block(
        &self,
        blockchain: &mut Blockchain,
        transactions: Vec<Transaction>,
    ) -> Result<(Block, MiningStats), BlockchainError> {
        let start = Instant::now();

        let coinbase = blockchain.build_coinbase(
            &transactions,
            &self.address,
            blockchain.config().block_reward,
        )?;
        let mut all_transactions = vec![coinbase];
        all_transactions.extend(transactions);

        let block = blockchain
            .append_block_with(all_transactions, &self.control)?
            .clone();

        // Blocks are assembled at nonce zero
        let stats = MiningStats::measure(block.header.nonce + 1, start);

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.header.height, stats.time_ms, stats.hash_attempts, stats.hash_rate
        );

        Ok((block, stats))
    }

    /// Mine `num_blocks` empty blocks, stopping at the first failure
    pub fn mine_continuously(
        &self,
        blockchain: &mut Blockchain,
        num_blocks: u64,
    ) -> Result<Vec<(Block, MiningStats)>, BlockchainError> {
        let mut results = Vec::new();

        for _ in 0..num_blocks {
            results.push(self.mine_block(blockchain, vec![])?);
        }

        Ok(results)
    }
}
