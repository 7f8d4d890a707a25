//! Merkle tree implementation for transaction aggregation
//!
//! Folds an ordered list of transaction hashes into one root, one level at a
//! time. Pairs are concatenated as raw bytes and hashed with SHA-256; when a
//! level has odd length its last hash is paired with itself.

use super::hash::{sha256, HASH_LEN};

/// Hash two sibling nodes into their parent
fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(left.len() + right.len());
    data.extend_from_slice(left);
    data.extend_from_slice(right);
    sha256(&data)
}

/// Compute the level above `level`
///
/// An empty or single-element level is returned unchanged.
pub fn merkle_next_level(level: &[Vec<u8>]) -> Vec<Vec<u8>> {
    if level.len() <= 1 {
        return level.to_vec();
    }

    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_pair(left, right),
            [last] => hash_pair(last, last),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Every level of the tree, leaves first and root last
pub fn merkle_levels(hashes: &[Vec<u8>]) -> Vec<Vec<Vec<u8>>> {
    let mut levels = vec![hashes.to_vec()];

    while levels.last().map_or(false, |level| level.len() > 1) {
        let next = merkle_next_level(&levels[levels.len() - 1]);
        levels.push(next);
    }

    levels
}

/// Calculate the merkle root from a list of transaction hashes
///
/// An empty list yields the all-zero hash.
pub fn calculate_merkle_root(hashes: &[Vec<u8>]) -> Vec<u8> {
    if hashes.is_empty() {
        return vec![0u8; HASH_LEN];
    }

    let mut current_level = hashes.to_vec();
    while current_level.len() > 1 {
        current_level = merkle_next_level(&current_level);
    }

    current_level.remove(0)
}

/// Decode a hex transaction id into a merkle leaf
///
/// Ids are hex digests; anything else contributes its raw bytes so a
/// malformed id still changes the root.
pub fn leaf_from_hex(id: &str) -> Vec<u8> {
    hex::decode(id).unwrap_or_else(|_| id.as_bytes().to_vec())
}

/// Calculate merkle root from hex-encoded hashes
pub fn calculate_merkle_root_hex(hex_hashes: &[String]) -> String {
    let hashes: Vec<Vec<u8>> = hex_hashes.iter().map(|h| leaf_from_hex(h)).collect();
    hex::encode(calculate_merkle_root(&hashes))
}

/// Merkle proof for verifying transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// List of sibling hashes from leaf to root
    pub siblings: Vec<(Vec<u8>, bool)>, // (hash, is_left)
}

impl MerkleProof {
    /// Build the inclusion proof for the leaf at `index`
    pub fn build(hashes: &[Vec<u8>], index: usize) -> Option<Self> {
        if index >= hashes.len() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut position = index;

        for level in merkle_levels(hashes) {
            if level.len() <= 1 {
                break;
            }
            let sibling = if position % 2 == 0 {
                // Odd tail pairs with itself
                let right = level.get(position + 1).unwrap_or(&level[position]);
                (right.clone(), false)
            } else {
                (level[position - 1].clone(), true)
            };
            siblings.push(sibling);
            position /= 2;
        }

        Some(Self { siblings })
    }

    /// Verify the proof against a root hash
    pub fn verify(&self, leaf_hash: &[u8], root_hash: &[u8]) -> bool {
        let mut current = leaf_hash.to_vec();

        for (sibling, is_left) in &self.siblings {
            current = if *is_left {
                hash_pair(sibling, &current)
            } else {
                hash_pair(&current, sibling)
            };
        }

        current == root_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| sha256(format!("tx{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = vec![sha256(b"tx1")];
        let root = calculate_merkle_root(&hashes);
        assert_eq!(root, hashes[0]);
    }

    #[test]
    fn test_merkle_root_two() {
        let hash1 = sha256(b"tx1");
        let hash2 = sha256(b"tx2");
        let hashes = vec![hash1.clone(), hash2.clone()];

        let root = calculate_merkle_root(&hashes);

        let mut expected = hash1;
        expected.extend_from_slice(&hash2);
        let expected_root = sha256(&expected);

        assert_eq!(root, expected_root);
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let hashes = leaves(3);
        let left = hash_pair(&hashes[0], &hashes[1]);
        let right = hash_pair(&hashes[2], &hashes[2]);
        assert_eq!(calculate_merkle_root(&hashes), hash_pair(&left, &right));
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let hashes = leaves(4);
        let mut swapped = hashes.clone();
        swapped.swap(0, 3);
        assert_ne!(calculate_merkle_root(&hashes), calculate_merkle_root(&swapped));
    }

    #[test]
    fn test_empty_merkle_root() {
        let hashes: Vec<Vec<u8>> = vec![];
        let root = calculate_merkle_root(&hashes);
        assert_eq!(root, vec![0u8; 32]);
    }

    #[test]
    fn test_merkle_levels() {
        let levels = merkle_levels(&leaves(5));
        let widths: Vec<usize> = levels.iter().map(|l| l.len()).collect();
        assert_eq!(widths, vec![5, 3, 2, 1]);
        assert_eq!(levels[3][0], calculate_merkle_root(&leaves(5)));
    }

    #[test]
    fn test_merkle_root_hex_matches_bytes() {
        let hashes = leaves(3);
        let hex_hashes: Vec<String> = hashes.iter().map(hex::encode).collect();
        assert_eq!(
            calculate_merkle_root_hex(&hex_hashes),
            hex::encode(calculate_merkle_root(&hashes))
        );
    }

    #[test]
    fn test_merkle_proof_every_leaf() {
        for n in 1..=7 {
            let hashes = leaves(n);
            let root = calculate_merkle_root(&hashes);
            for (i, leaf) in hashes.iter().enumerate() {
                let proof = MerkleProof::build(&hashes, i).unwrap();
                assert!(proof.verify(leaf, &root), "leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_merkle_proof_rejects_wrong_leaf() {
        let hashes = leaves(4);
        let root = calculate_merkle_root(&hashes);
        let proof = MerkleProof::build(&hashes, 1).unwrap();
        assert!(!proof.verify(&hashes[2], &root));
        assert!(MerkleProof::build(&hashes, 4).is_none());
    }
}
