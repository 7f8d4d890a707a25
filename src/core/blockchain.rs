//! Blockchain implementation
//!
//! The chain manager owns the ordered list of blocks and the UTXO ledger
//! derived from them. [`Blockchain::append_block`] is the only way either is
//! mutated: it validates the pending transactions, mines a block at the
//! current difficulty, appends it and applies it to the ledger.

use crate::core::block::{Block, BlockError, MiningControl};
use crate::core::config::{ChainConfig, ConfigError};
use crate::core::difficulty::{difficulty, DifficultyController, DifficultyError};
use crate::core::transaction::{
    PresenceVerifier, SignatureVerifier, Transaction, TransactionError, UTXO,
};
use crate::core::utxo::{LedgerError, OutPoint, UtxoLedger};
use crate::crypto::ZERO_HASH_HEX;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid transaction {0}: {1}")]
    InvalidTransaction(String, String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
    #[error("Difficulty error: {0}")]
    Difficulty(#[from] DifficultyError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Invalid chain at height {0}: {1}")]
    InvalidChain(u64, String),
}

/// The main blockchain structure
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks
    blocks: Vec<Block>,
    /// Unspent transaction outputs
    ledger: UtxoLedger,
    /// Coins created so far (genesis reward plus net coinbase issuance)
    minted: u64,
    config: ChainConfig,
    difficulty: DifficultyController,
    verifier: Arc<dyn SignatureVerifier>,
}

impl Blockchain {
    /// Create a new blockchain with genesis block
    pub fn new(config: ChainConfig) -> Result<Self, BlockchainError> {
        Self::with_verifier(config, Arc::new(PresenceVerifier))
    }

    /// Create a blockchain that authorises inputs with `verifier`
    pub fn with_verifier(
        config: ChainConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, BlockchainError> {
        config.validate()?;

        let genesis = Self::genesis(&config)?;
        let mut ledger = UtxoLedger::new();
        ledger.apply_block_transactions(&genesis.transactions)?;

        info!(
            "Genesis block {} minted {} to {}",
            genesis.header.hash, config.genesis_reward, config.genesis_address
        );

        Ok(Self {
            blocks: vec![genesis],
            ledger,
            minted: config.genesis_reward,
            difficulty: DifficultyController::new(config.retarget_params()),
            config,
            verifier,
        })
    }

    /// Build the genesis block for `config`
    ///
    /// Deterministic: the same config always yields the same block.
    pub fn genesis(config: &ChainConfig) -> Result<Block, BlockchainError> {
        let timestamp = config.genesis_time()?;
        let coinbase =
            Transaction::coinbase_at(&config.genesis_address, config.genesis_reward, timestamp)?;

        let mut block = Block::new(
            0,
            ZERO_HASH_HEX.to_string(),
            vec![coinbase],
            config.genesis_bits,
            timestamp,
        );
        block.mine()?;
        Ok(block)
    }

    // =========================================================================
    // Read-only accessors
    // =========================================================================

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    /// Get a block by height
    pub fn get_block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Get a block by hash
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.header.hash == hash)
    }

    /// Get blockchain height
    pub fn height(&self) -> u64 {
        self.latest_block().header.height
    }

    /// The current UTXO ledger
    pub fn ledger(&self) -> &UtxoLedger {
        &self.ledger
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Get balance for an address
    pub fn get_balance(&self, address: &str) -> u64 {
        self.ledger.balance(address)
    }

    /// Get UTXOs for a specific address
    pub fn get_utxos_for_address(&self, address: &str) -> Vec<&UTXO> {
        self.ledger.utxos_for(address)
    }

    /// Coins that should be in circulation: genesis reward plus net issuance
    pub fn expected_supply(&self) -> u64 {
        self.minted
    }

    /// Bits the next block will be mined at
    pub fn current_bits(&self) -> Result<u32, DifficultyError> {
        self.difficulty.current_bits(&self.blocks)
    }

    // =========================================================================
    // Fees and coinbase
    // =========================================================================

    /// Total fees paid by the non-coinbase transactions in `pending`
    ///
    /// Inputs resolve against the ledger, then against outputs of earlier
    /// pending transactions. Unresolved inputs contribute nothing.
    pub fn fees_for(&self, pending: &[Transaction]) -> u64 {
        block_fees(&self.ledger, pending)
    }

    /// Build the coinbase paying `block_reward` plus the fees in `pending`
    pub fn build_coinbase(
        &self,
        pending: &[Transaction],
        miner_address: &str,
        block_reward: u64,
    ) -> Result<Transaction, BlockchainError> {
        let fees = self.fees_for(pending);
        let coinbase = Transaction::coinbase(miner_address, block_reward.saturating_add(fees))?;
        Ok(coinbase)
    }

    // =========================================================================
    // Chain extension
    // =========================================================================

    /// Mine `transactions` behind a fresh coinbase paying `miner_address`
    pub fn mine_block(
        &mut self,
        transactions: Vec<Transaction>,
        miner_address: &str,
    ) -> Result<Block, BlockchainError> {
        let coinbase = self.build_coinbase(&transactions, miner_address, self.config.block_reward)?;

        let mut all_transactions = vec![coinbase];
        all_transactions.extend(transactions);

        let block = self.append_block(all_transactions)?;
        Ok(block.clone())
    }

    /// Validate, mine and append a block holding `pending`
    pub fn append_block(&mut self, pending: Vec<Transaction>) -> Result<&Block, BlockchainError> {
        self.append_block_with(pending, &MiningControl::unbounded())
    }

    /// [`append_block`](Self::append_block) with a bounded or cancellable search
    ///
    /// On any error the chain and ledger are unchanged.
    pub fn append_block_with(
        &mut self,
        pending: Vec<Transaction>,
        control: &MiningControl,
    ) -> Result<&Block, BlockchainError> {
        if let Err(e) = self.check_transactions(&pending) {
            warn!("Rejected block candidate: {}", e);
            return Err(e);
        }
        let fees = self.fees_for(&pending);

        let bits = self.current_bits()?;
        let mut block = Block::assemble(self.latest_block(), pending, bits);

        info!(
            "Mining block {} with bits {:#010x}...",
            block.header.height, block.header.bits
        );
        let attempts = block.mine_with(control)?;
        info!(
            "Block {} mined after {} attempts: {}",
            block.header.height, attempts, block.header.hash
        );

        self.ledger.apply_block_transactions(&block.transactions)?;
        self.minted = self
            .minted
            .saturating_add(block.mining_reward())
            .saturating_sub(fees);
        self.blocks.push(block);

        Ok(self.latest_block())
    }

    /// Reject anything that must never reach the chain
    fn check_transactions(&self, pending: &[Transaction]) -> Result<(), BlockchainError> {
        for (index, tx) in pending.iter().enumerate() {
            if !tx.verify_id() {
                return Err(BlockchainError::InvalidTransaction(
                    tx.id.clone(),
                    "id does not match content".to_string(),
                ));
            }

            let is_coinbase = tx.is_coinbase();
            if is_coinbase && index != 0 {
                return Err(BlockchainError::InvalidTransaction(
                    tx.id.clone(),
                    "coinbase must be the first transaction".to_string(),
                ));
            }

            if !tx.verify_with(is_coinbase, self.verifier.as_ref()) {
                return Err(BlockchainError::InvalidTransaction(
                    tx.id.clone(),
                    "failed verification".to_string(),
                ));
            }
        }

        if let Some(coinbase) = pending.first().filter(|tx| tx.is_coinbase()) {
            let allowed = self
                .config
                .block_reward
                .saturating_add(self.fees_for(pending));
            if coinbase.total_output() > allowed {
                return Err(BlockchainError::InvalidTransaction(
                    coinbase.id.clone(),
                    format!(
                        "coinbase pays {} but at most {} is allowed",
                        coinbase.total_output(),
                        allowed
                    ),
                ));
            }
        }

        self.ledger.check_block_transactions(pending)?;
        Ok(())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate the entire chain
    ///
    /// Checks heights, parent links, block self-consistency and the difficulty
    /// schedule, then replays every block: coinbase placement and value,
    /// spends, and that the replayed ledger and supply match the live ones.
    pub fn validate_chain(&self) -> Result<(), BlockchainError> {
        let mut replayed = UtxoLedger::new();
        let mut issued = 0u64;

        for (index, block) in self.blocks.iter().enumerate() {
            let height = index as u64;
            let invalid = |reason: String| BlockchainError::InvalidChain(height, reason);

            block.validate().map_err(|e| invalid(e.to_string()))?;

            if block.header.height != height {
                return Err(invalid(format!("height field is {}", block.header.height)));
            }

            let expected_parent = match index {
                0 => ZERO_HASH_HEX.to_string(),
                _ => self.blocks[index - 1].header.calculate_hash(),
            };
            if block.header.previous_hash != expected_parent {
                return Err(invalid("previous hash does not match parent".to_string()));
            }

            let expected_bits = self.difficulty.current_bits(&self.blocks[..index])?;
            if block.header.bits != expected_bits {
                return Err(invalid(format!(
                    "bits {:#010x}, expected {:#010x}",
                    block.header.bits, expected_bits
                )));
            }

            if block.transactions.iter().skip(1).any(|tx| tx.is_coinbase()) {
                return Err(invalid("coinbase after the first transaction".to_string()));
            }

            let fees = block_fees(&replayed, &block.transactions);
            let allowed = match index {
                0 => self.config.genesis_reward,
                _ => self.config.block_reward.saturating_add(fees),
            };
            let reward = block.mining_reward();
            if reward > allowed {
                return Err(invalid(format!(
                    "coinbase pays {} but at most {} is allowed",
                    reward, allowed
                )));
            }

            replayed
                .apply_block_transactions(&block.transactions)
                .map_err(|e| invalid(e.to_string()))?;
            issued = issued.saturating_add(reward).saturating_sub(fees);
        }

        let tip = self.height();
        if replayed != self.ledger {
            return Err(BlockchainError::InvalidChain(
                tip,
                "ledger does not match replay".to_string(),
            ));
        }
        let supply = replayed.total_supply();
        if supply != issued || issued != self.minted {
            return Err(BlockchainError::InvalidChain(
                tip,
                format!(
                    "supply {} does not match issuance {} (recorded {})",
                    supply, issued, self.minted
                ),
            ));
        }

        Ok(())
    }

    /// Whether [`validate_chain`](Self::validate_chain) passes
    pub fn is_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        let latest = self.latest_block();
        let total_transactions: usize = self.blocks.iter().map(|b| b.tx_count()).sum();

        ChainStats {
            height: self.height(),
            total_blocks: self.blocks.len() as u64,
            total_transactions: total_transactions as u64,
            total_supply: self.ledger.total_supply(),
            utxo_count: self.ledger.len(),
            bits: latest.header.bits,
            difficulty: difficulty(latest.header.bits, self.config.pow_limit_bits).unwrap_or(0.0),
            latest_hash: latest.header.hash.clone(),
        }
    }
}

/// Fees paid by the non-coinbase transactions in `pending`, resolving inputs
/// against `ledger` and then against earlier outputs in `pending`
fn block_fees(ledger: &UtxoLedger, pending: &[Transaction]) -> u64 {
    let mut staged: HashMap<OutPoint, u64> = HashMap::new();
    let mut total_fees = 0u64;

    for tx in pending {
        if !tx.is_coinbase() {
            let mut input_total = 0u64;
            for input in &tx.inputs {
                let outpoint = OutPoint::new(&input.tx_id, input.output_index);
                let value = ledger
                    .find(&input.tx_id, input.output_index)
                    .map(|utxo| utxo.output.amount)
                    .or_else(|| staged.get(&outpoint).copied());

                match value {
                    Some(amount) => input_total = input_total.saturating_add(amount),
                    None => warn!(
                        "Fee calculation: transaction {} references unknown output {}",
                        tx.id, outpoint
                    ),
                }
            }
            total_fees = total_fees.saturating_add(input_total.saturating_sub(tx.total_output()));
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            staged.insert(OutPoint::new(&tx.id, index as u32), output.amount);
        }
    }

    total_fees
}

/// Chain statistics
#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_supply: u64,
    pub utxo_count: usize,
    pub bits: u32,
    pub difficulty: f64,
    pub latest_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TransactionBuilder, TransactionInput};
    use std::sync::atomic::AtomicBool;

    fn regtest_chain() -> Blockchain {
        Blockchain::new(ChainConfig {
            genesis_address: "alice".to_string(),
            ..ChainConfig::regtest()
        })
        .unwrap()
    }

    fn pay(utxo: &UTXO, outputs: &[(&str, u64)]) -> Transaction {
        let mut builder = TransactionBuilder::new().add_input(utxo);
        for (to, amount) in outputs {
            builder = builder.add_output(to, *amount);
        }
        builder
            .placeholder_signature("sig", &format!("{}_pub", utxo.output.recipient))
            .build()
            .unwrap()
    }

    fn genesis_utxo(chain: &Blockchain) -> UTXO {
        let genesis_tx = &chain.blocks()[0].transactions[0];
        chain.ledger().find(&genesis_tx.id, 0).unwrap().clone()
    }

    #[test]
    fn test_new_blockchain() {
        let chain = regtest_chain();
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.get_balance("alice"), 50);
        assert_eq!(chain.latest_block().header.previous_hash, ZERO_HASH_HEX);
        assert!(chain.latest_block().is_valid_pow());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = regtest_chain();
        let b = regtest_chain();
        assert_eq!(a.latest_block(), b.latest_block());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChainConfig {
            adjustment_interval: 0,
            ..ChainConfig::regtest()
        };
        assert!(matches!(
            Blockchain::new(config),
            Err(BlockchainError::Config(ConfigError::ZeroInterval))
        ));
    }

    #[test]
    fn test_mine_block() {
        let mut chain = regtest_chain();
        let block = chain.mine_block(vec![], "miner").unwrap();

        assert_eq!(block.header.height, 1);
        assert!(block.is_valid_pow());
        assert_eq!(chain.blocks().len(), 2);
        assert_eq!(chain.get_balance("miner"), chain.config().block_reward);
    }

    #[test]
    fn test_scenario_fee_to_miner() {
        let mut chain = Blockchain::new(ChainConfig {
            genesis_address: "A".to_string(),
            block_reward: 25,
            ..ChainConfig::regtest()
        })
        .unwrap();
        let genesis_tx = chain.blocks()[0].transactions[0].clone();

        let t1 = TransactionBuilder::new()
            .add_input_ref(&genesis_tx.id, 0)
            .add_output("B", 30)
            .add_output("A", 19)
            .placeholder_signature("sig_a", "pub_a")
            .build()
            .unwrap();
        let c1 = chain
            .build_coinbase(&[t1.clone()], "miner", 25)
            .unwrap();
        assert_eq!(c1.total_output(), 26);

        chain.append_block(vec![c1.clone(), t1.clone()]).unwrap();

        let mut entries: Vec<(String, u32, u64, String)> = chain
            .ledger()
            .entries()
            .into_iter()
            .map(|u| {
                (
                    u.tx_id.clone(),
                    u.output_index,
                    u.output.amount,
                    u.output.recipient.clone(),
                )
            })
            .collect();
        let mut expected = vec![
            (c1.id.clone(), 0, 26, "miner".to_string()),
            (t1.id.clone(), 0, 30, "B".to_string()),
            (t1.id.clone(), 1, 19, "A".to_string()),
        ];
        entries.sort();
        expected.sort();

        assert_eq!(entries, expected);
        assert!(chain.ledger().find(&genesis_tx.id, 0).is_none());
        assert_eq!(chain.ledger().total_supply(), 75);
        assert_eq!(chain.expected_supply(), 75);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_chain_properties_hold() {
        let mut chain = regtest_chain();
        let mut spendable = genesis_utxo(&chain);

        for _ in 0..5 {
            // Pay bob 1, keep the change, leave a fee of 1
            let change = spendable.output.amount - 2;
            let tx = pay(&spendable, &[("bob", 1), ("alice", change)]);
            chain.mine_block(vec![tx.clone()], "miner").unwrap();
            spendable = chain.ledger().find(&tx.id, 1).unwrap().clone();
        }

        let blocks = chain.blocks();
        for i in 1..blocks.len() {
            assert_eq!(
                blocks[i].header.previous_hash,
                blocks[i - 1].header.calculate_hash()
            );
            assert_eq!(blocks[i].header.height, i as u64);
        }
        for block in blocks {
            assert!(block.verify_merkle_root());
            assert!(block.is_valid_pow());
        }

        let expected = chain.config().genesis_reward + 5 * chain.config().block_reward;
        assert_eq!(chain.ledger().total_supply(), expected);
        assert_eq!(chain.expected_supply(), expected);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_fees_chain_within_pending() {
        let chain = regtest_chain();
        let utxo = genesis_utxo(&chain);

        let t1 = pay(&utxo, &[("bob", 48)]);
        let bob_utxo = UTXO {
            tx_id: t1.id.clone(),
            output_index: 0,
            output: t1.outputs[0].clone(),
        };
        let t2 = pay(&bob_utxo, &[("carol", 45)]);

        assert_eq!(chain.fees_for(&[t1, t2]), 5);
    }

    #[test]
    fn test_unresolved_input_contributes_no_fee() {
        let chain = regtest_chain();
        let orphan = Transaction::new(
            vec![TransactionInput::new("missing", 0, "sig", "key")],
            vec![crate::core::transaction::TransactionOutput::new("bob", 5)],
        )
        .unwrap();

        let coinbase = chain.build_coinbase(&[orphan], "miner", 50).unwrap();
        assert_eq!(coinbase.total_output(), 50);
    }

    #[test]
    fn test_double_spend_rejected_across_blocks() {
        let mut chain = regtest_chain();
        let utxo = genesis_utxo(&chain);

        chain
            .mine_block(vec![pay(&utxo, &[("bob", 50)])], "miner")
            .unwrap();
        let height = chain.height();

        let again = pay(&utxo, &[("carol", 50)]);
        let result = chain.mine_block(vec![again], "miner");

        assert!(matches!(
            result,
            Err(BlockchainError::Ledger(LedgerError::MissingOutput { .. }))
        ));
        assert_eq!(chain.height(), height);
        assert_eq!(chain.get_balance("carol"), 0);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_overspend_rejected() {
        let mut chain = regtest_chain();
        let utxo = genesis_utxo(&chain);
        let supply = chain.ledger().total_supply();
        let blocks = chain.blocks().len();

        let overspend = pay(&utxo, &[("bob", 1_000_000)]);
        let result = chain.mine_block(vec![overspend], "miner");

        assert!(matches!(
            result,
            Err(BlockchainError::Ledger(LedgerError::InsufficientInputs { .. }))
        ));
        assert_eq!(chain.blocks().len(), blocks);
        assert_eq!(chain.ledger().total_supply(), supply);
        assert_eq!(chain.expected_supply(), supply);
        assert_eq!(chain.get_balance("bob"), 0);
        assert_eq!(chain.get_balance("alice"), 50);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_overspend_in_history_detected() {
        let mut chain = regtest_chain();
        let utxo = genesis_utxo(&chain);
        chain
            .mine_block(vec![pay(&utxo, &[("bob", 50)])], "miner")
            .unwrap();
        assert!(chain.is_valid());

        // Rewrite history so the payment creates coins, keeping hashes consistent
        let mut forged = chain.clone();
        let inflated = pay(&utxo, &[("bob", 5_000)]);
        let coinbase = forged.blocks[1].transactions[0].clone();
        forged.blocks[1] = Block::new(
            1,
            forged.blocks[0].header.hash.clone(),
            vec![coinbase, inflated],
            forged.blocks[1].header.bits,
            forged.blocks[1].header.timestamp,
        );
        forged.blocks[1].mine().unwrap();
        forged.ledger = UtxoLedger::new();
        for block in &forged.blocks {
            for tx in &block.transactions {
                for input in &tx.inputs {
                    forged.ledger.spend(&input.tx_id, input.output_index);
                }
                for (index, output) in tx.outputs.iter().enumerate() {
                    forged
                        .ledger
                        .add(&tx.id, index as u32, output.amount, &output.recipient)
                        .unwrap();
                }
            }
        }

        assert!(matches!(
            forged.validate_chain(),
            Err(BlockchainError::InvalidChain(1, _))
        ));
    }

    #[test]
    fn test_output_overflow_rejected() {
        let chain = regtest_chain();
        let utxo = genesis_utxo(&chain);

        let result = TransactionBuilder::new()
            .add_input(&utxo)
            .add_output("bob", u64::MAX)
            .add_output("bob", 1)
            .placeholder_signature("sig", "alice_pub")
            .build();
        assert!(matches!(
            result,
            Err(TransactionError::InvalidTransactionShape(_))
        ));
    }

    #[test]
    fn test_unsigned_transaction_rejected() {
        let mut chain = regtest_chain();
        let utxo = genesis_utxo(&chain);
        let unsigned = TransactionBuilder::new()
            .add_input(&utxo)
            .add_output("bob", 50)
            .build()
            .unwrap();

        let result = chain.mine_block(vec![unsigned], "miner");
        assert!(matches!(
            result,
            Err(BlockchainError::InvalidTransaction(_, _))
        ));
        assert_eq!(chain.blocks().len(), 1);
    }

    #[test]
    fn test_coinbase_placement_and_value() {
        let mut chain = regtest_chain();
        let utxo = genesis_utxo(&chain);
        let spend = pay(&utxo, &[("bob", 50)]);

        let late_coinbase = Transaction::coinbase("miner", 10).unwrap();
        let result = chain.append_block(vec![spend, late_coinbase]);
        assert!(matches!(
            result,
            Err(BlockchainError::InvalidTransaction(_, _))
        ));

        let greedy = Transaction::coinbase("miner", chain.config().block_reward + 1).unwrap();
        assert!(chain.append_block(vec![greedy]).is_err());
        assert_eq!(chain.blocks().len(), 1);
    }

    #[test]
    fn test_empty_block_allowed() {
        let mut chain = regtest_chain();
        let block = chain.append_block(vec![]).unwrap();
        assert_eq!(block.header.merkle_root, ZERO_HASH_HEX);
        assert_eq!(chain.expected_supply(), chain.ledger().total_supply());
    }

    #[derive(Debug)]
    struct RequireKey(&'static str);

    impl SignatureVerifier for RequireKey {
        fn verify_input(&self, input: &TransactionInput, _signing_data: &[u8]) -> bool {
            input.public_key == self.0
        }
    }

    #[test]
    fn test_custom_verifier() {
        let config = ChainConfig {
            genesis_address: "alice".to_string(),
            ..ChainConfig::regtest()
        };
        let mut chain = Blockchain::with_verifier(config, Arc::new(RequireKey("alice_pub"))).unwrap();
        let utxo = genesis_utxo(&chain);

        let forged = TransactionBuilder::new()
            .add_input(&utxo)
            .add_output("mallory", 50)
            .placeholder_signature("sig", "mallory_pub")
            .build()
            .unwrap();
        assert!(chain.mine_block(vec![forged], "miner").is_err());

        chain
            .mine_block(vec![pay(&utxo, &[("bob", 50)])], "miner")
            .unwrap();
        assert_eq!(chain.get_balance("bob"), 50);
    }

    #[test]
    fn test_cancelled_append_leaves_chain_unchanged() {
        let mut chain = regtest_chain();
        let control = MiningControl::unbounded().with_cancel_flag(Arc::new(AtomicBool::new(true)));

        let result = chain.append_block_with(vec![], &control);
        assert!(matches!(
            result,
            Err(BlockchainError::Block(BlockError::MiningCancelled(0)))
        ));
        assert_eq!(chain.blocks().len(), 1);
    }

    #[test]
    fn test_retarget_schedule_followed() {
        let mut chain = Blockchain::new(ChainConfig {
            adjustment_interval: 2,
            target_timespan: 20,
            ..ChainConfig::regtest()
        })
        .unwrap();

        for _ in 0..4 {
            chain.mine_block(vec![], "miner").unwrap();
        }

        // Blocks 2 and 4 were retargeted; the fixed 2024 genesis makes the
        // first interval look slow, so it stays at the pow limit
        assert_eq!(chain.blocks()[2].header.bits, chain.config().pow_limit_bits);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_recent_genesis_retargets_normally() {
        let mut chain = Blockchain::new(ChainConfig {
            adjustment_interval: 2,
            target_timespan: 20,
            genesis_timestamp: chrono::Utc::now().timestamp(),
            ..ChainConfig::regtest()
        })
        .unwrap();

        for _ in 0..2 {
            chain.mine_block(vec![], "miner").unwrap();
        }

        // Two instant blocks are faster than the timespan, so difficulty rises
        assert_ne!(chain.blocks()[2].header.bits, chain.config().pow_limit_bits);
        let bits = chain.blocks()[2].header.bits;
        assert!(difficulty(bits, chain.config().pow_limit_bits).unwrap() > 1.0);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_tampering_detected() {
        let mut chain = regtest_chain();
        chain.mine_block(vec![], "miner").unwrap();
        chain.mine_block(vec![], "miner").unwrap();
        assert!(chain.is_valid());

        let mut tampered = chain.clone();
        tampered.blocks[1].transactions[0].outputs[0].amount = 1_000_000;
        assert!(!tampered.is_valid());

        let mut relinked = chain.clone();
        relinked.blocks[2].header.previous_hash = ZERO_HASH_HEX.to_string();
        assert!(!relinked.is_valid());

        let mut ledger_drift = chain.clone();
        ledger_drift.ledger.add("ghost", 0, 1, "mallory").unwrap();
        assert!(!ledger_drift.is_valid());

        let mut inflated = chain.clone();
        inflated.minted += 1;
        assert!(!inflated.is_valid());
    }

    #[test]
    fn test_stats() {
        let mut chain = regtest_chain();
        chain.mine_block(vec![], "miner").unwrap();

        let stats = chain.stats();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.total_supply, 100);
        assert_eq!(stats.utxo_count, 2);
        assert_eq!(stats.difficulty, 1.0);
    }
}
