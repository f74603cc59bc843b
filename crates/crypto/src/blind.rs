//! Blinded public key hashes for commitment-based account activation.
//!
//! Genesis seeds a table of blinded public key hashes mapped to balances.
//! The owner of a key proves their claim by presenting the activation code
//! that, combined with their public key hash, reproduces the blinded entry.

use crate::{keccak256_concat, CryptoError, PublicKeyHash, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separator for blinded hash derivation.
const BLIND_DOMAIN: &[u8] = b"stele_blinded_pkh";

/// A 20-byte secret distributed out-of-band to a claimant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationCode(pub [u8; 20]);

impl ActivationCode {
    /// Creates a code from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates a code from a slice; fails unless it is exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 20 {
            return Err(CryptoError::InvalidLength {
                expected: 20,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ActivationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret itself.
        f.debug_struct("ActivationCode").finish_non_exhaustive()
    }
}

/// A blinded public key hash, the key of the commitment table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlindedPublicKeyHash(pub [u8; 20]);

impl fmt::Display for BlindedPublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlindedPublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlindedPublicKeyHash(0x{})", hex::encode(self.0))
    }
}

/// Computes the blinded hash for `pkh` under `code`.
///
/// The construction is `keccak256(tag ‖ pkh ‖ code)` truncated to the low
/// 20 bytes of the digest.
pub fn blinded_pkh(code: &ActivationCode, pkh: &PublicKeyHash) -> BlindedPublicKeyHash {
    let digest = keccak256_concat(&[BLIND_DOMAIN, pkh.as_bytes(), &code.0]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..32]);
    BlindedPublicKeyHash(out)
}
