//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing
//! - Proof-of-work target comparison
//! - Merkle tree calculations and inclusion proofs

pub mod hash;
pub mod merkle;

pub use hash::{
    decode_hash, double_sha256, double_sha256_hex, hash_meets_target, sha256,
    sha256_hex, HASH_LEN, ZERO_HASH_HEX,
};
pub use merkle::{
    calculate_merkle_root, calculate_merkle_root_hex, leaf_from_hex, merkle_levels,
    merkle_next_level, MerkleProof,
};
