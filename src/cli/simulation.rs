//! Random chain simulation
//!
//! Builds an in-memory chain by mining blocks full of random transfers
//! between a fixed set of demo addresses.

use crate::core::{Blockchain, BlockchainError, ChainConfig, Transaction, TransactionBuilder, UTXO};
use crate::mining::Miner;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Addresses random transfers pay to
pub const DEMO_ADDRESSES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Blocks to mine on top of genesis
    pub blocks: u64,
    /// Address collecting block rewards
    pub miner: String,
    /// RNG seed; random when absent
    pub seed: Option<u64>,
    /// Upper bound on transfers per block
    pub max_transfers: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            blocks: 10,
            miner: "miner".to_string(),
            seed: None,
            max_transfers: 3,
        }
    }
}

/// Mine `options.blocks` blocks of random transfers on a fresh chain
pub fn simulate(
    config: ChainConfig,
    options: &SimulationOptions,
) -> Result<Blockchain, BlockchainError> {
    let seed = options.seed.unwrap_or_else(rand::random);
    info!("Simulating {} blocks (seed {})", options.blocks, seed);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut chain = Blockchain::new(config)?;
    let miner = Miner::new(&options.miner);

    for _ in 0..options.blocks {
        let transfers = random_transfers(&chain, &mut rng, options.max_transfers);
        miner.mine_block(&mut chain, transfers)?;
    }

    Ok(chain)
}

/// Pick up to `max` distinct unspent outputs and move them around
fn random_transfers(chain: &Blockchain, rng: &mut StdRng, max: usize) -> Vec<Transaction> {
    let mut candidates: Vec<UTXO> = chain
        .ledger()
        .entries()
        .into_iter()
        .filter(|utxo| utxo.output.amount >= 2)
        .cloned()
        .collect();

    let count = rng.gen_range(0..=max);
    let mut transfers = Vec::with_capacity(count);

    for _ in 0..count {
        if candidates.is_empty() {
            break;
        }
        let utxo = candidates.swap_remove(rng.gen_range(0..candidates.len()));
        let owner = utxo.output.recipient.clone();

        let fee = rng.gen_range(0..=1);
        let available = utxo.output.amount - fee;
        let amount = rng.gen_range(1..=available);
        let to = DEMO_ADDRESSES[rng.gen_range(0..DEMO_ADDRESSES.len())];

        let mut builder = TransactionBuilder::new()
            .add_input(&utxo)
            .add_output(to, amount);
        if available > amount {
            builder = builder.add_output(&owner, available - amount);
        }

        match builder
            .placeholder_signature(&format!("sig_{}", owner), &format!("{}_pub", owner))
            .build()
        {
            Ok(tx) => transfers.push(tx),
            Err(e) => warn!("Skipping transfer from {}: {}", owner, e),
        }
    }

    transfers
}
