//! # Stele Crypto
//!
//! Cryptographic primitives consumed by the Stele transition core.
//!
//! This crate provides:
//! - **Keccak256 hashing** — the single digest used throughout Stele
//! - **Watermarked Schnorr signatures** — secp256k1, BIP-340 style, with
//!   domain bytes separating headers, endorsements and operations
//! - **Blinded public key hashes** — for commitment-based activation
//! - **Seeded byte streams** — the deterministic sampler behind rights
//!   selection and roll-snapshot freezing
//!
//! ## Example
//!
//! ```rust
//! use stele_crypto::{keccak256, SecretKey, Watermark};
//!
//! let digest = keccak256(b"block contents");
//!
//! let secret = SecretKey::from_seed(&[1u8; 32]);
//! let sig = secret.sign(Watermark::Operation, &digest);
//! assert!(secret.public_key().verify(Watermark::Operation, &digest, &sig));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod blind;
pub mod hash;
pub mod keys;
pub mod seed;

// Re-export commonly used items
pub use blind::{blinded_pkh, ActivationCode, BlindedPublicKeyHash};
pub use hash::{keccak256, keccak256_concat};
pub use keys::{PublicKey, PublicKeyHash, SecretKey, Signature, Watermark};
pub use seed::{Seed, Sequence};

/// Result type alias for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A fixed-size input had the wrong length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid public key bytes.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}
