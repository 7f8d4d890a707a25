//! Cryptographic hashing utilities for the ledger
//!
//! Provides SHA-256 based hashing functions used for block hashes,
//! transaction IDs, and merkle tree calculations, plus the numeric
//! comparison used by proof of work.

use primitive_types::U256;
use sha2::{Digest, Sha256};

/// Length of every digest in bytes
pub const HASH_LEN: usize = 32;

/// Hex form of the all-zero digest (genesis parent, empty merkle root)
pub const ZERO_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block hashes in Bitcoin-style blockchains
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Decodes a hex digest into a fixed-width array
///
/// Returns `None` when the string is not valid hex or not exactly 32 bytes.
pub fn decode_hash(hex_hash: &str) -> Option<[u8; HASH_LEN]> {
    let bytes = hex::decode(hex_hash).ok()?;
    bytes.try_into().ok()
}

/// Checks if a hash satisfies a proof-of-work target (`hash <= target`)
///
/// The digest is read as a big-endian 256-bit integer.
pub fn hash_meets_target(hash: &[u8; HASH_LEN], target: &U256) -> bool {
    U256::from_big_endian(hash) <= *target
}
