//! Chain configuration
//!
//! A fixed set of parameters supplied once when the chain is created.

use crate::core::difficulty::{bits_to_target, is_canonical, RetargetParams, Target};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// Target block time in seconds
pub const TARGET_BLOCK_TIME: u64 = 10;

/// Largest factor difficulty may move by in one adjustment
pub const MAX_DIFFICULTY_ADJUSTMENT_FACTOR: u64 = 4;

/// Default genesis difficulty (about 2^16 hashes per block)
pub const DEFAULT_GENESIS_BITS: u32 = 0x1f00ffff;

/// Easiest permitted target
pub const POW_LIMIT_BITS: u32 = 0x207fffff;

/// Hardest permitted target
pub const HARDEST_BITS: u32 = 0x1d00ffff;

/// Coins minted by the genesis block
pub const GENESIS_REWARD: u64 = 50;

/// Block reward in coins
pub const BLOCK_REWARD: u64 = 50;

/// Recipient of the genesis reward
pub const GENESIS_ADDRESS: &str = "genesis";

/// Genesis block timestamp (2024-01-01T00:00:00Z)
///
/// The first retarget measures from genesis, so a chain started long after
/// this date sees a huge first timespan and clamps to the easiest allowed
/// adjustment. Set `genesis_timestamp` near the start time to avoid that.
pub const GENESIS_TIMESTAMP: i64 = 1_704_067_200;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Adjustment interval must be at least 1")]
    ZeroInterval,
    #[error("Max adjustment must be at least 1 and no larger than the target timespan")]
    InvalidAdjustment,
    #[error("Invalid {0} bits: {1:#010x}")]
    InvalidBits(&'static str, u32),
    #[error("Bits out of order: hardest <= genesis <= pow limit must hold")]
    BitsOutOfRange,
    #[error("Genesis reward must be positive")]
    ZeroGenesisReward,
    #[error("Block reward must be positive")]
    ZeroBlockReward,
    #[error("Genesis address must not be empty")]
    EmptyGenesisAddress,
    #[error("Invalid genesis timestamp: {0}")]
    InvalidGenesisTimestamp(i64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Blocks between retargets
    pub adjustment_interval: u64,
    /// Ideal seconds elapsed per interval
    pub target_timespan: u64,
    /// Clamp on the per-retarget change
    pub max_adjustment: u64,
    /// Difficulty of the genesis block and of the first interval
    pub genesis_bits: u32,
    /// Easiest permitted target
    pub pow_limit_bits: u32,
    /// Hardest permitted target
    pub hardest_bits: u32,
    /// Coins minted by the genesis block
    pub genesis_reward: u64,
    /// Recipient of the genesis reward
    pub genesis_address: String,
    /// Genesis timestamp, seconds since the Unix epoch; the start of the
    /// first retarget interval
    pub genesis_timestamp: i64,
    /// Reward minted by every later block
    pub block_reward: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            adjustment_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
            target_timespan: TARGET_BLOCK_TIME * DIFFICULTY_ADJUSTMENT_INTERVAL,
            max_adjustment: MAX_DIFFICULTY_ADJUSTMENT_FACTOR,
            genesis_bits: DEFAULT_GENESIS_BITS,
            pow_limit_bits: POW_LIMIT_BITS,
            hardest_bits: HARDEST_BITS,
            genesis_reward: GENESIS_REWARD,
            genesis_address: GENESIS_ADDRESS.to_string(),
            genesis_timestamp: GENESIS_TIMESTAMP,
            block_reward: BLOCK_REWARD,
        }
    }
}

impl ChainConfig {
    /// Trivial difficulty and rare retargets, for tests and demos
    pub fn regtest() -> Self {
        Self {
            adjustment_interval: 150,
            target_timespan: 150 * TARGET_BLOCK_TIME,
            genesis_bits: POW_LIMIT_BITS,
            ..Self::default()
        }
    }

    /// Load a config from a JSON file; missing fields take default values
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the chain cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adjustment_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_adjustment == 0 || self.target_timespan < self.max_adjustment {
            return Err(ConfigError::InvalidAdjustment);
        }

        let genesis = checked_target("genesis", self.genesis_bits)?;
        let limit = checked_target("pow limit", self.pow_limit_bits)?;
        let hardest = checked_target("hardest", self.hardest_bits)?;
        if !(hardest <= genesis && genesis <= limit) {
            return Err(ConfigError::BitsOutOfRange);
        }

        if self.genesis_reward == 0 {
            return Err(ConfigError::ZeroGenesisReward);
        }
        if self.block_reward == 0 {
            return Err(ConfigError::ZeroBlockReward);
        }
        if self.genesis_address.is_empty() {
            return Err(ConfigError::EmptyGenesisAddress);
        }
        self.genesis_time()?;

        Ok(())
    }

    /// Genesis timestamp as a date
    pub fn genesis_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        Utc.timestamp_opt(self.genesis_timestamp, 0)
            .single()
            .ok_or(ConfigError::InvalidGenesisTimestamp(self.genesis_timestamp))
    }

    /// Parameters for the difficulty controller
    pub fn retarget_params(&self) -> RetargetParams {
        RetargetParams {
            adjustment_interval: self.adjustment_interval,
            target_timespan: self.target_timespan,
            max_adjustment: self.max_adjustment,
            genesis_bits: self.genesis_bits,
            pow_limit_bits: self.pow_limit_bits,
            hardest_bits: self.hardest_bits,
        }
    }
}

fn checked_target(name: &'static str, bits: u32) -> Result<Target, ConfigError> {
    if !is_canonical(bits) {
        return Err(ConfigError::InvalidBits(name, bits));
    }
    bits_to_target(bits).map_err(|_| ConfigError::InvalidBits(name, bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_regtest_are_valid() {
        assert!(ChainConfig::default().validate().is_ok());
        assert!(ChainConfig::regtest().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let config = ChainConfig {
            adjustment_interval: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        let config = ChainConfig {
            max_adjustment: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAdjustment)));

        let config = ChainConfig {
            genesis_bits: 0x1e0000ff,
            ..ChainConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBits("genesis", 0x1e0000ff))
        ));

        let config = ChainConfig {
            genesis_bits: 0x1b00ffff,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BitsOutOfRange)));

        let config = ChainConfig {
            genesis_reward: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroGenesisReward)));

        let config = ChainConfig {
            block_reward: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBlockReward)));

        let config = ChainConfig {
            genesis_address: String::new(),
            ..ChainConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyGenesisAddress)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ChainConfig =
            serde_json::from_str(r#"{"block_reward": 25, "genesis_address": "alice"}"#).unwrap();
        assert_eq!(config.block_reward, 25);
        assert_eq!(config.genesis_address, "alice");
        assert_eq!(config.adjustment_interval, DIFFICULTY_ADJUSTMENT_INTERVAL);
    }

    #[test]
    fn test_retarget_params() {
        let params = ChainConfig::default().retarget_params();
        assert_eq!(params.target_timespan, 100);
        assert_eq!(params.genesis_bits, DEFAULT_GENESIS_BITS);
    }
}
