//! CLI commands for the ledger
//!
//! Implements the command handlers for the CLI interface. Every command works
//! on an in-memory chain built for the invocation.

use crate::cli::simulation::{simulate, SimulationOptions};
use crate::core::{
    Block, Blockchain, ChainConfig, MiningControl, TransactionBuilder, POW_LIMIT_BITS,
};
use crate::mining::Miner;
use serde_json::json;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the chain config, applying command-line overrides
pub fn load_config(
    path: Option<&Path>,
    regtest: bool,
    difficulty_bits: Option<u32>,
) -> CliResult<ChainConfig> {
    let mut config = match path {
        Some(path) => ChainConfig::from_json_file(path)?,
        None if regtest => ChainConfig::regtest(),
        None => ChainConfig::default(),
    };

    if let Some(bits) = difficulty_bits {
        config.genesis_bits = bits;
    }
    config.validate()?;

    Ok(config)
}

/// Parse compact bits given as hex (`0x1f00ffff`) or decimal
pub fn parse_bits(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid bits '{}': {}", value, e))
}

/// Run the worked example: A pays B 30, keeps 19 as change, leaves a fee of 1
pub fn cmd_demo(config: ChainConfig, json_output: bool) -> CliResult<()> {
    let config = ChainConfig {
        genesis_address: "A".to_string(),
        genesis_reward: 50,
        block_reward: 25,
        ..config
    };
    let mut chain = Blockchain::new(config)?;
    let genesis_tx = chain.blocks()[0].transactions[0].clone();

    let t1 = TransactionBuilder::new()
        .add_input_ref(&genesis_tx.id, 0)
        .add_output("B", 30)
        .add_output("A", 19)
        .placeholder_signature("sig_a", "A_pub")
        .build()?;
    let c1 = chain.build_coinbase(&[t1.clone()], "miner", chain.config().block_reward)?;

    if !json_output {
        println!("🎬 Demo: A spends the 50-coin genesis output");
        println!("   ├─ T1 pays B 30 and returns 19 to A (fee 1)");
        println!("   └─ C1 pays the miner 25 + 1 = {}", c1.total_output());
        println!();
    }

    chain.append_block_with(vec![c1, t1], &MiningControl::unbounded())?;

    if json_output {
        print_json(&chain)?;
        return Ok(());
    }

    cmd_chain_blocks(&chain, chain.blocks().len() as u32, false)?;
    println!();
    cmd_utxos(&chain, None, false)?;
    println!();
    cmd_validate(&chain, false)?;

    Ok(())
}

/// Build a chain of random transfers and summarise it
pub fn cmd_simulate(
    config: ChainConfig,
    options: &SimulationOptions,
    json_output: bool,
) -> CliResult<Blockchain> {
    if !json_output {
        println!(
            "⛏️  Simulating {} block(s) for miner: {}",
            options.blocks, options.miner
        );
        println!("   Genesis bits: {:#010x}", config.genesis_bits);
        if config.genesis_bits != POW_LIMIT_BITS {
            println!("   (use --regtest for near-instant blocks)");
        }
    }

    let chain = simulate(config, options)?;

    if !json_output {
        println!(
            "\n💰 Miner balance: {} coins",
            chain.get_balance(&options.miner)
        );
    }

    Ok(chain)
}

/// Mine `count` empty blocks for `address` on a fresh chain
pub fn cmd_mine(
    config: ChainConfig,
    address: &str,
    count: u64,
    json_output: bool,
) -> CliResult<Blockchain> {
    let mut chain = Blockchain::new(config)?;
    let miner = Miner::new(address);

    if !json_output {
        println!("⛏️  Mining {} block(s) for address: {}", count, address);
    }

    for _ in 0..count {
        let bits = chain.current_bits()?;
        let (block, stats) = miner.mine_block(&mut chain, vec![])?;
        if json_output {
            continue;
        }

        println!("   Current bits: {:#010x}", bits);
        println!("\n   Block {} mined!", block.header.height);
        println!("   ├─ Hash: {}", short(&block.header.hash, 16));
        println!("   ├─ Transactions: {}", block.tx_count());
        println!("   ├─ Time: {}ms", stats.time_ms);
        println!("   ├─ Attempts: {}", stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);
    }

    if !json_output {
        println!(
            "\n💰 New balance for miner: {} coins",
            chain.get_balance(address)
        );
    }

    Ok(chain)
}

/// Display blockchain info
pub fn cmd_chain_info(chain: &Blockchain, json_output: bool) -> CliResult<()> {
    let stats = chain.stats();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("⛓️  Blockchain Info");
    println!("   ├─ Height: {}", stats.height);
    println!("   ├─ Total blocks: {}", stats.total_blocks);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Total supply: {} coins", stats.total_supply);
    println!("   ├─ Unspent outputs: {}", stats.utxo_count);
    println!(
        "   ├─ Bits: {:#010x} (difficulty {:.2})",
        stats.bits, stats.difficulty
    );
    println!("   └─ Latest hash: {}...", short(&stats.latest_hash, 32));

    Ok(())
}

/// List recent blocks
pub fn cmd_chain_blocks(chain: &Blockchain, count: u32, json_output: bool) -> CliResult<()> {
    let height = chain.height() as usize;
    let start = (height + 1).saturating_sub(count as usize);

    if json_output {
        let recent: Vec<&Block> = chain.blocks()[start..].iter().rev().collect();
        println!("{}", serde_json::to_string_pretty(&recent)?);
        return Ok(());
    }

    println!("🧱 Recent blocks:");
    for i in (start..=height).rev() {
        if let Some(block) = chain.get_block(i as u64) {
            println!(
                "   #{} | {} | {:#010x} | {} tx | {}",
                block.header.height,
                short(&block.header.hash, 16),
                block.header.bits,
                block.tx_count(),
                block.header.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
            for tx in &block.transactions {
                let kind = if tx.is_coinbase() { "coinbase" } else { "transfer" };
                let outputs: Vec<String> = tx
                    .outputs
                    .iter()
                    .map(|o| format!("{} → {}", o.amount, o.recipient))
                    .collect();
                println!(
                    "      └─ {} {} [{}]",
                    kind,
                    short(&tx.id, 8),
                    outputs.join(", ")
                );
            }
        }
    }

    Ok(())
}

/// List unspent outputs, optionally for one address
pub fn cmd_utxos(chain: &Blockchain, address: Option<&str>, json_output: bool) -> CliResult<()> {
    let utxos = match address {
        Some(address) => chain.get_utxos_for_address(address),
        None => chain.ledger().entries(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&utxos)?);
        return Ok(());
    }

    match address {
        Some(address) => println!(
            "💰 Balance for {}: {} coins",
            address,
            chain.get_balance(address)
        ),
        None => println!(
            "💰 Unspent outputs (supply {} coins)",
            chain.ledger().total_supply()
        ),
    }

    if utxos.is_empty() {
        println!("   📭 None");
    }
    for utxo in &utxos {
        println!(
            "   └─ {}:{} = {} coins → {}",
            short(&utxo.tx_id, 8),
            utxo.output_index,
            utxo.output.amount,
            utxo.output.recipient
        );
    }

    Ok(())
}

/// Validate the blockchain
pub fn cmd_validate(chain: &Blockchain, json_output: bool) -> CliResult<()> {
    let result = chain.validate_chain();

    if json_output {
        let report = json!({
            "valid": result.is_ok(),
            "blocks": chain.blocks().len(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔍 Validating blockchain...");
    match result {
        Ok(()) => {
            println!("✅ Blockchain is valid!");
            println!("   {} blocks verified", chain.blocks().len());
        }
        Err(e) => {
            println!("❌ Blockchain validation FAILED!");
            println!("   {}", e);
        }
    }

    Ok(())
}

/// Dump every block as JSON
pub fn print_json(chain: &Blockchain) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    Ok(())
}

fn short(value: &str, len: usize) -> &str {
    value.get(..len).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bits() {
        assert_eq!(parse_bits("0x1f00ffff"), Ok(0x1f00ffff));
        assert_eq!(parse_bits("0X207FFFFF"), Ok(0x207fffff));
        assert_eq!(parse_bits("486604799"), Ok(0x1d00ffff));
        assert!(parse_bits("0xzz").is_err());
    }

    #[test]
    fn test_load_config_overrides() {
        let config = load_config(None, true, Some(0x1f00ffff)).unwrap();
        assert_eq!(config.genesis_bits, 0x1f00ffff);
        assert_eq!(config.adjustment_interval, ChainConfig::regtest().adjustment_interval);

        assert!(load_config(None, true, Some(0x1e0000ff)).is_err());
    }

    #[test]
    fn test_short() {
        assert_eq!(short("abcdef", 3), "abc");
        assert_eq!(short("ab", 8), "ab");
    }

    #[test]
    fn test_mine_json_returns_chain() {
        let chain = cmd_mine(ChainConfig::regtest(), "miner", 2, true).unwrap();
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.get_balance("miner"), 2 * ChainConfig::regtest().block_reward);
        assert!(serde_json::to_string(chain.blocks()).is_ok());
    }

    #[test]
    fn test_demo_runs() {
        assert!(cmd_demo(ChainConfig::regtest(), true).is_ok());
    }
}
