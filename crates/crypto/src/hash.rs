//! Keccak256 hashing utilities.
//!
//! All digests in Stele are Keccak256. Domain separation is done with
//! constant ASCII tags absorbed ahead of the payload, never with length
//! prefixes.

use sha3::{Digest, Keccak256};

/// Compute the Keccak256 hash of the input data.
///
/// # Example
///
/// ```rust
/// use stele_crypto::keccak256;
///
/// let hash = keccak256(b"hello");
/// assert_eq!(hash.len(), 32);
/// ```
#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Keccak256 hash of multiple concatenated inputs.
///
/// Equivalent to hashing the concatenation, without the temporary buffer.
///
/// # Example
///
/// ```rust
/// use stele_crypto::keccak256_concat;
///
/// let hash = keccak256_concat(&[b"hello", b" ", b"world"]);
/// ```
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(b"");
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_concat_equivalence() {
        let hash1 = keccak256(b"hello world");
        let hash2 = keccak256_concat(&[b"hello", b" ", b"world"]);
        assert_eq!(hash1, hash2);
    }
}
