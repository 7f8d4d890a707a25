//! UTXO ledger
//!
//! The set of currently unspent outputs, keyed by outpoint. Applying a
//! block's transactions is all-or-nothing: every input must resolve to an
//! unspent output (from the ledger or an earlier transaction in the same
//! block) before anything is mutated.

use crate::core::transaction::{Transaction, TransactionOutput, UTXO};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// UTXO ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Output {0} already exists")]
    DuplicateOutput(OutPoint),
    #[error("Transaction {tx_id} spends missing or already spent output {outpoint}")]
    MissingOutput { tx_id: String, outpoint: OutPoint },
    #[error("Transaction {tx_id} pays out {outputs} but only spends {inputs}")]
    InsufficientInputs {
        tx_id: String,
        inputs: u64,
        outputs: u64,
    },
}

/// Reference to one output of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: String,
    pub output_index: u32,
}

impl OutPoint {
    pub fn new(tx_id: &str, output_index: u32) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            output_index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// The set of unspent transaction outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoLedger {
    entries: HashMap<OutPoint, UTXO>,
}

impl UtxoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new unspent output
    pub fn add(
        &mut self,
        tx_id: &str,
        output_index: u32,
        amount: u64,
        owner: &str,
    ) -> Result<(), LedgerError> {
        let key = OutPoint::new(tx_id, output_index);
        if self.entries.contains_key(&key) {
            return Err(LedgerError::DuplicateOutput(key));
        }

        self.entries.insert(
            key,
            UTXO {
                tx_id: tx_id.to_string(),
                output_index,
                output: TransactionOutput::new(owner, amount),
            },
        );
        Ok(())
    }

    /// Remove an unspent output; `false` when it is absent
    pub fn spend(&mut self, tx_id: &str, output_index: u32) -> bool {
        self.entries
            .remove(&OutPoint::new(tx_id, output_index))
            .is_some()
    }

    /// Look up an unspent output
    pub fn find(&self, tx_id: &str, output_index: u32) -> Option<&UTXO> {
        self.entries.get(&OutPoint::new(tx_id, output_index))
    }

    /// Apply a block's transactions in order
    ///
    /// Coinbase-shaped transactions only add outputs; others spend every
    /// input and then add every output. On error the ledger is unchanged.
    pub fn apply_block_transactions(
        &mut self,
        transactions: &[Transaction],
    ) -> Result<(), LedgerError> {
        self.check_block_transactions(transactions)?;

        for tx in transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    self.spend(&input.tx_id, input.output_index);
                }
            }
            for (index, output) in tx.outputs.iter().enumerate() {
                self.entries.insert(
                    OutPoint::new(&tx.id, index as u32),
                    UTXO {
                        tx_id: tx.id.clone(),
                        output_index: index as u32,
                        output: output.clone(),
                    },
                );
            }
        }

        Ok(())
    }

    /// Dry-run of [`apply_block_transactions`](Self::apply_block_transactions)
    ///
    /// Also checks that no spend pays out more than its inputs are worth.
    pub fn check_block_transactions(&self, transactions: &[Transaction]) -> Result<(), LedgerError> {
        let mut spent: HashSet<OutPoint> = HashSet::new();
        let mut created: HashMap<OutPoint, u64> = HashMap::new();

        for tx in transactions {
            if !tx.is_coinbase() {
                let mut input_total = 0u64;
                for input in &tx.inputs {
                    let outpoint = OutPoint::new(&input.tx_id, input.output_index);
                    let value = self
                        .entries
                        .get(&outpoint)
                        .map(|utxo| utxo.output.amount)
                        .or_else(|| created.get(&outpoint).copied());

                    let amount = match value {
                        Some(amount) if !spent.contains(&outpoint) => amount,
                        _ => {
                            return Err(LedgerError::MissingOutput {
                                tx_id: tx.id.clone(),
                                outpoint,
                            })
                        }
                    };
                    input_total = input_total.saturating_add(amount);
                    spent.insert(outpoint);
                }

                let output_total = tx.checked_total_output().unwrap_or(u64::MAX);
                if output_total > input_total {
                    return Err(LedgerError::InsufficientInputs {
                        tx_id: tx.id.clone(),
                        inputs: input_total,
                        outputs: output_total,
                    });
                }
            }

            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint::new(&tx.id, index as u32);
                if self.entries.contains_key(&outpoint) || created.contains_key(&outpoint) {
                    return Err(LedgerError::DuplicateOutput(outpoint));
                }
                created.insert(outpoint, output.amount);
            }
        }

        Ok(())
    }

    /// Fee paid by `tx`: resolved input value minus output value, floored at 0
    ///
    /// Inputs missing from the ledger contribute nothing.
    pub fn fee_for(&self, tx: &Transaction) -> u64 {
        if tx.is_coinbase() {
            return 0;
        }

        let mut input_total = 0u64;
        for input in &tx.inputs {
            match self.find(&input.tx_id, input.output_index) {
                Some(utxo) => input_total = input_total.saturating_add(utxo.output.amount),
                None => warn!(
                    "Fee calculation: transaction {} references unknown output {}:{}",
                    tx.id, input.tx_id, input.output_index
                ),
            }
        }

        input_total.saturating_sub(tx.total_output())
    }

    /// All unspent outputs, ordered by outpoint
    pub fn entries(&self) -> Vec<&UTXO> {
        let mut entries: Vec<(&OutPoint, &UTXO)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, utxo)| utxo).collect()
    }

    /// Number of unspent outputs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get UTXOs for a specific address
    pub fn utxos_for(&self, owner: &str) -> Vec<&UTXO> {
        self.entries()
            .into_iter()
            .filter(|utxo| utxo.output.is_owned_by(owner))
            .collect()
    }

    /// Get balance for an address
    pub fn balance(&self, owner: &str) -> u64 {
        self.entries
            .values()
            .filter(|utxo| utxo.output.is_owned_by(owner))
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.output.amount))
    }

    /// Sum of every unspent output (circulating supply)
    pub fn total_supply(&self) -> u64 {
        self.entries
            .values()
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.output.amount))
    }
}
