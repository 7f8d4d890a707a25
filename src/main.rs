//! Mini-Ledger CLI Application
//!
//! A command-line interface for building and inspecting in-memory chains.

use clap::{Args, Parser, Subcommand};
use mini_ledger::cli::{self, SimulationOptions};
use mini_ledger::core::ChainConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "An educational UTXO ledger with proof of work", long_about = None)]
struct Cli {
    /// JSON file with chain parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use trivial difficulty and rare retargets (ignored with --config)
    #[arg(long, global = true)]
    regtest: bool,

    /// Override the genesis difficulty, e.g. 0x1f00ffff
    #[arg(long, global = true, value_parser = cli::parse_bits)]
    difficulty_bits: Option<u32>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options for commands that build a simulated chain first
#[derive(Args)]
struct SimulationArgs {
    /// Number of blocks to mine
    #[arg(short, long, default_value = "10")]
    blocks: u64,

    /// Address receiving block rewards
    #[arg(short, long, default_value = "miner")]
    miner: String,

    /// RNG seed for the random transfers
    #[arg(short, long)]
    seed: Option<u64>,

    /// Maximum transfers per block
    #[arg(long, default_value = "3")]
    max_transfers: usize,
}

impl SimulationArgs {
    fn options(&self) -> SimulationOptions {
        SimulationOptions {
            blocks: self.blocks,
            miner: self.miner.clone(),
            seed: self.seed,
            max_transfers: self.max_transfers,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worked example: one payment with change and a fee
    Demo,

    /// Mine blocks of random transfers and summarise the result
    Simulate {
        #[command(flatten)]
        sim: SimulationArgs,
    },

    /// Mine empty blocks for an address
    Mine {
        /// Miner's address for receiving rewards
        #[arg(short, long)]
        address: String,

        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u64,
    },

    /// Display information about a simulated chain
    Chain {
        #[command(flatten)]
        sim: SimulationArgs,

        #[command(subcommand)]
        action: Option<ChainCommands>,
    },

    /// List unspent outputs of a simulated chain
    Utxos {
        #[command(flatten)]
        sim: SimulationArgs,

        /// Only show outputs owned by this address
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Validate a simulated chain
    Validate {
        #[command(flatten)]
        sim: SimulationArgs,
    },
}

#[derive(Subcommand)]
enum ChainCommands {
    /// Show detailed info
    Info,

    /// List recent blocks
    Blocks {
        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config: ChainConfig =
        cli::load_config(cli.config.as_deref(), cli.regtest, cli.difficulty_bits)?;

    match cli.command {
        Commands::Demo => cli::cmd_demo(config, cli.json)?,
        Commands::Simulate { sim } => {
            let chain = cli::cmd_simulate(config, &sim.options(), cli.json)?;
            if cli.json {
                cli::print_json(&chain)?;
            } else {
                println!();
                cli::cmd_chain_info(&chain, false)?;
            }
        }
        Commands::Mine { address, count } => {
            let chain = cli::cmd_mine(config, &address, count, cli.json)?;
            if cli.json {
                cli::print_json(&chain)?;
            }
        }
        Commands::Chain { sim, action } => {
            let chain = cli::simulate(config, &sim.options())?;
            match action {
                Some(ChainCommands::Blocks { count }) => {
                    cli::cmd_chain_blocks(&chain, count, cli.json)?
                }
                Some(ChainCommands::Info) | None => cli::cmd_chain_info(&chain, cli.json)?,
            }
        }
        Commands::Utxos { sim, address } => {
            let chain = cli::simulate(config, &sim.options())?;
            cli::cmd_utxos(&chain, address.as_deref(), cli.json)?;
        }
        Commands::Validate { sim } => {
            let chain = cli::simulate(config, &sim.options())?;
            cli::cmd_validate(&chain, cli.json)?;
        }
    }

    Ok(())
}
