//! Difficulty control
//!
//! Targets are 256-bit big-endian integers carried in block headers as a
//! compact "bits" encoding (one exponent byte, 23-bit mantissa, Bitcoin
//! layout). Every `adjustment_interval` blocks the target is rescaled by the
//! ratio of observed to ideal elapsed time, clamped by `max_adjustment`.

use crate::core::block::Block;
use log::info;
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Expanded difficulty target
pub type Target = U256;

/// Compact encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DifficultyError {
    #[error("Negative compact target: {0:#010x}")]
    NegativeTarget(u32),
    #[error("Zero compact target: {0:#010x}")]
    ZeroTarget(u32),
    #[error("Compact target overflows 256 bits: {0:#010x}")]
    TargetOverflow(u32),
}

// =============================================================================
// Compact encoding
// =============================================================================

/// Expand compact bits into a 256-bit target
///
/// The target is `mantissa * 256^(exponent - 3)`.
pub fn bits_to_target(bits: u32) -> Result<Target, DifficultyError> {
    if bits & 0x0080_0000 != 0 {
        return Err(DifficultyError::NegativeTarget(bits));
    }

    let size = (bits >> 24) as usize;
    let mut word = bits & 0x007f_ffff;

    if size <= 3 {
        word >>= 8 * (3 - size);
    } else if (word != 0 && size > 34)
        || (word > 0xff && size > 33)
        || (word > 0xffff && size > 32)
    {
        return Err(DifficultyError::TargetOverflow(bits));
    }

    if word == 0 {
        return Err(DifficultyError::ZeroTarget(bits));
    }

    if size <= 3 {
        Ok(U256::from(word))
    } else {
        Ok(U256::from(word) << (8 * (size - 3)))
    }
}

/// Encode a target in canonical compact form
///
/// Precision below the top three significant bytes is dropped. A zero target
/// encodes as 0.
pub fn target_to_bits(target: &Target) -> u32 {
    if target.is_zero() {
        return 0;
    }

    let mut size = (target.bits() + 7) / 8;
    let mut mantissa = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (*target >> (8 * (size - 3))).low_u32()
    };

    // The 0x00800000 bit is the sign bit
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        size += 1;
    }

    mantissa | ((size as u32) << 24)
}

/// Whether `bits` is the canonical encoding of its own target
pub fn is_canonical(bits: u32) -> bool {
    bits_to_target(bits).map_or(false, |target| target_to_bits(&target) == bits)
}

fn target_to_f64(target: &Target) -> f64 {
    let mut bytes = [0u8; 32];
    target.to_big_endian(&mut bytes);
    bytes.iter().fold(0.0, |acc, byte| acc * 256.0 + f64::from(*byte))
}

/// Human-readable difficulty: how many times harder than the pow limit
pub fn difficulty(bits: u32, pow_limit_bits: u32) -> Result<f64, DifficultyError> {
    let limit = target_to_f64(&bits_to_target(pow_limit_bits)?);
    let target = target_to_f64(&bits_to_target(bits)?);
    Ok(limit / target)
}

/// Compute `target * mul / div` exactly
///
/// Returns `None` when the result does not fit in 256 bits.
fn scale_target(target: &Target, mul: u64, div: u64) -> Option<Target> {
    let product: U512 = target.full_mul(U256::from(mul));
    U256::try_from(product / U512::from(div)).ok()
}

// =============================================================================
// Retargeting
// =============================================================================

/// Retargeting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetParams {
    /// Blocks between retargets
    pub adjustment_interval: u64,
    /// Ideal seconds elapsed over one interval
    pub target_timespan: u64,
    /// Largest factor the target may move by in one retarget
    pub max_adjustment: u64,
    /// Bits used before the first retarget
    pub genesis_bits: u32,
    /// Easiest permitted target
    pub pow_limit_bits: u32,
    /// Hardest permitted target
    pub hardest_bits: u32,
}

/// Computes the bits the next block must be mined at
#[derive(Debug, Clone)]
pub struct DifficultyController {
    params: RetargetParams,
}

impl DifficultyController {
    pub fn new(params: RetargetParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RetargetParams {
        &self.params
    }

    /// Bits required for the block that would extend `blocks`
    pub fn current_bits(&self, blocks: &[Block]) -> Result<u32, DifficultyError> {
        let last = match blocks.last() {
            Some(block) => block,
            None => return Ok(self.params.genesis_bits),
        };

        if blocks.len() as u64 % self.params.adjustment_interval == 0 {
            self.retarget(blocks)
        } else {
            Ok(last.header.bits)
        }
    }

    /// Rescale the tip's target from the timing of the last interval
    pub fn retarget(&self, blocks: &[Block]) -> Result<u32, DifficultyError> {
        let interval = self.params.adjustment_interval as usize;
        if blocks.len() < interval {
            return Ok(self.params.genesis_bits);
        }

        let first = &blocks[blocks.len() - interval];
        let last = &blocks[blocks.len() - 1];

        let timespan = self.params.target_timespan;
        let min_span = timespan / self.params.max_adjustment;
        let max_span = timespan.saturating_mul(self.params.max_adjustment);

        let measured = last
            .header
            .timestamp
            .signed_duration_since(first.header.timestamp)
            .num_seconds();
        let actual = u64::try_from(measured)
            .unwrap_or(0)
            .clamp(min_span, max_span);

        if actual == timespan {
            return Ok(last.header.bits);
        }

        let old_target = bits_to_target(last.header.bits)?;
        let limit = bits_to_target(self.params.pow_limit_bits)?;
        let hardest = bits_to_target(self.params.hardest_bits)?;

        // Target and difficulty are inversely proportional
        let new_target = match scale_target(&old_target, actual, timespan) {
            Some(target) if target > limit => limit,
            Some(target) if target < hardest => hardest,
            Some(target) => target,
            None => limit,
        };
        let new_bits = target_to_bits(&new_target);

        info!(
            "Difficulty retarget at height {}: bits {:#010x} -> {:#010x} (took {}s, expected {}s)",
            last.header.height, last.header.bits, new_bits, measured, timespan
        );

        Ok(new_bits)
    }
}
