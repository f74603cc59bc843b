//! Origination nonces: deterministic fresh contract addresses.
//!
//! Each block initializes the nonce from its hash; every origination during
//! the block draws the next address by hashing the block hash with an
//! incrementing counter. Re-running the block reproduces the same
//! addresses.

use sha3::{Digest, Keccak256};

/// Domain tag for address derivation.
const ORIGINATION_DOMAIN: &[u8] = b"stele_origination";

/// The per-block origination nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginationNonce {
    block_hash: [u8; 32],
    counter: u32,
}

impl OriginationNonce {
    /// Initializes the nonce for a block.
    pub fn new(block_hash: [u8; 32]) -> Self {
        Self {
            block_hash,
            counter: 0,
        }
    }

    /// Draws the next fresh 20-byte contract address.
    pub fn fresh_address(&mut self) -> [u8; 20] {
        let mut hasher = Keccak256::new();
        hasher.update(ORIGINATION_DOMAIN);
        hasher.update(self.block_hash);
        hasher.update(self.counter.to_be_bytes());
        self.counter += 1;

        let digest: [u8; 32] = hasher.finalize().into();
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..32]);
        address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_deterministic() {
        let mut a = OriginationNonce::new([1u8; 32]);
        let mut b = OriginationNonce::new([1u8; 32]);
        assert_eq!(a.fresh_address(), b.fresh_address());
        assert_eq!(a.fresh_address(), b.fresh_address());
    }

    #[test]
    fn test_addresses_differ_by_counter_and_block() {
        let mut a = OriginationNonce::new([1u8; 32]);
        let first = a.fresh_address();
        assert_ne!(first, a.fresh_address());

        let mut other = OriginationNonce::new([2u8; 32]);
        assert_ne!(first, other.fresh_address());
    }
}
