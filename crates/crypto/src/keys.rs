//! Delegate keys and watermarked Schnorr signatures.
//!
//! Stele signs consensus objects with BIP-340 style Schnorr signatures over
//! secp256k1. Every signature is bound to a watermark domain so a signed
//! endorsement can never be replayed as a block header and vice versa.
//!
//! ## Watermarks
//!
//! - `0x01` — block headers
//! - `0x02` — endorsements
//! - `0x03` — all other operations
//!
//! ## Example
//!
//! ```rust
//! use stele_crypto::{SecretKey, Watermark};
//!
//! let secret = SecretKey::from_seed(&[7u8; 32]);
//! let public = secret.public_key().clone();
//!
//! let sig = secret.sign(Watermark::Operation, b"contents");
//! assert!(public.verify(Watermark::Operation, b"contents", &sig));
//! assert!(!public.verify(Watermark::Endorsement, b"contents", &sig));
//! ```

use crate::{keccak256, CryptoError, Result};
use k256::{
    elliptic_curve::{
        group::GroupEncoding,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar, U256,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Domain tag for nonce derivation.
const NONCE_DOMAIN: &[u8] = b"stele_sig_nonce";

/// Domain tag for challenge derivation.
const CHALLENGE_DOMAIN: &[u8] = b"stele_sig_challenge";

/// Signature watermark domains.
///
/// The watermark byte is absorbed into the challenge hash ahead of the
/// message, separating the signing domains of headers, endorsements and
/// generic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Watermark {
    /// Block header signatures.
    BlockHeader,
    /// Endorsement signatures.
    Endorsement,
    /// Every other operation kind.
    Operation,
}

impl Watermark {
    /// The domain byte absorbed into the challenge.
    pub const fn byte(self) -> u8 {
        match self {
            Watermark::BlockHeader => 0x01,
            Watermark::Endorsement => 0x02,
            Watermark::Operation => 0x03,
        }
    }
}

/// A 20-byte hash of a public key, identifying a delegate or an implicit
/// account.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PublicKeyHash(pub [u8; 20]);

impl PublicKeyHash {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates a hash from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the hash as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Creates a hash from a slice; fails unless it is exactly 20 bytes.
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

impl fmt::Display for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHash(0x{})", hex::encode(self.0))
    }
}

/// Schnorr secret key.
///
/// The scalar is normalized at construction so the public key always has an
/// even y-coordinate, which keeps the x-only encoding unambiguous.
#[derive(Clone)]
pub struct SecretKey {
    scalar: Scalar,
    public: PublicKey,
}

/// Schnorr public key (32-byte x-only encoding, even y).
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicKey {
    /// The x-coordinate of the key point.
    bytes: [u8; 32],
    #[serde(skip)]
    point: Option<ProjectivePoint>,
}

/// Schnorr signature: commitment x-coordinate and response scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Signature {
    /// Commitment point R (x-coordinate, 32 bytes).
    pub r: [u8; 32],
    /// Response scalar s (32 bytes).
    pub s: [u8; 32],
}

impl SecretKey {
    /// Generates a new random secret key.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self::generate(&mut rng)
    }

    /// Generates a new secret key from the provided RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Derives a secret key from a 32-byte seed, deterministically.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let hash = keccak256(seed);
        let scalar = <Scalar as Reduce<U256>>::reduce_bytes(&hash.into());
        let scalar = if scalar.is_zero().into() {
            Scalar::ONE
        } else {
            scalar
        };

        let point = ProjectivePoint::GENERATOR * scalar;
        // Normalize to an even-y public point.
        let (scalar, point) = if has_even_y(&point) {
            (scalar, point)
        } else {
            (-scalar, -point)
        };

        let bytes = x_bytes(&point);
        Self {
            scalar,
            public: PublicKey {
                bytes,
                point: Some(point),
            },
        }
    }

    /// The public key for this secret key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The public key hash for this secret key.
    pub fn public_key_hash(&self) -> PublicKeyHash {
        self.public.hash()
    }

    /// Signs a message under the given watermark.
    ///
    /// Nonces are derived deterministically from the secret, the watermark
    /// and the message, so signing never consumes ambient randomness.
    pub fn sign(&self, watermark: Watermark, message: &[u8]) -> Signature {
        let k = self.derive_nonce(watermark, message);

        let r_point = ProjectivePoint::GENERATOR * k;
        // BIP-340: force the commitment to the even-y representative so the
        // x-only r encoding round-trips in verification.
        let (k, r_point) = if has_even_y(&r_point) {
            (k, r_point)
        } else {
            (-k, -r_point)
        };
        let r = x_bytes(&r_point);

        let e = challenge(&r, &self.public.bytes, watermark, message);
        let s = k + e * self.scalar;

        Signature {
            r,
            s: s.to_bytes().into(),
        }
    }

    fn derive_nonce(&self, watermark: Watermark, message: &[u8]) -> Scalar {
        let mut hasher = Keccak256::new();
        hasher.update(NONCE_DOMAIN);
        hasher.update(self.scalar.to_bytes());
        hasher.update([watermark.byte()]);
        hasher.update(message);
        let hash: [u8; 32] = hasher.finalize().into();
        let nonce = <Scalar as Reduce<U256>>::reduce_bytes(&hash.into());
        if nonce.is_zero().into() {
            Scalar::ONE
        } else {
            nonce
        }
    }
}

impl PublicKey {
    /// Creates a public key from its 32-byte x-only encoding.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let point = lift_x(bytes).ok_or_else(|| {
            CryptoError::InvalidPublicKey("not an x-coordinate on secp256k1".to_string())
        })?;
        Ok(Self {
            bytes: *bytes,
            point: Some(point),
        })
    }

    /// The 32-byte x-only encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The 20-byte hash identifying this key.
    ///
    /// Computed over the compressed SEC1 encoding, truncated to the low 20
    /// bytes of the digest.
    pub fn hash(&self) -> PublicKeyHash {
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[1..].copy_from_slice(&self.bytes);
        let digest = keccak256(&compressed);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..32]);
        PublicKeyHash(out)
    }

    /// Verifies a signature over `message` under `watermark`.
    pub fn verify(&self, watermark: Watermark, message: &[u8], signature: &Signature) -> bool {
        let point = match self.point() {
            Some(p) => p,
            None => return false,
        };
        let r_point = match lift_x(&signature.r) {
            Some(p) => p,
            None => return false,
        };
        let s_opt = Scalar::from_repr(signature.s.into());
        let s = if s_opt.is_some().into() {
            s_opt.unwrap()
        } else {
            return false;
        };

        let e = challenge(&signature.r, &self.bytes, watermark, message);

        // s * G == R + e * P, with R the even-y lift of r.
        let lhs = ProjectivePoint::GENERATOR * s;
        let rhs = r_point + point * e;
        lhs == rhs
    }

    fn point(&self) -> Option<ProjectivePoint> {
        match self.point {
            Some(p) => Some(p),
            // Deserialized keys lose the cached point; re-lift from x.
            None => lift_x(&self.bytes),
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{})", hex::encode(self.bytes))
    }
}

impl Signature {
    /// The zero signature, used as a placeholder before signing.
    pub const ZERO: Self = Self {
        r: [0u8; 32],
        s: [0u8; 32],
    };

    /// Serializes to 64 bytes (`r ‖ s`).
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Parses from 64 bytes (`r ‖ s`).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(CryptoError::InvalidLength {
                expected: 64,
                actual: bytes.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self { r, s })
    }
}

/// Challenge scalar `e = H(tag ‖ r ‖ pk ‖ watermark ‖ m)`.
fn challenge(r: &[u8; 32], pk: &[u8; 32], watermark: Watermark, message: &[u8]) -> Scalar {
    let mut hasher = Keccak256::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(r);
    hasher.update(pk);
    hasher.update([watermark.byte()]);
    hasher.update(message);
    let hash: [u8; 32] = hasher.finalize().into();
    <Scalar as Reduce<U256>>::reduce_bytes(&hash.into())
}

/// Lifts an x-coordinate to the curve point with even y, if one exists.
fn lift_x(x: &[u8; 32]) -> Option<ProjectivePoint> {
    let mut compressed = [0u8; 33];
    compressed[0] = 0x02;
    compressed[1..].copy_from_slice(x);
    let encoded = k256::EncodedPoint::from_bytes(compressed).ok()?;
    let affine = AffinePoint::from_encoded_point(&encoded);
    if affine.is_some().into() {
        Some(ProjectivePoint::from(affine.unwrap()))
    } else {
        None
    }
}

fn has_even_y(point: &ProjectivePoint) -> bool {
    let affine = point.to_affine();
    let encoded = affine.to_encoded_point(true);
    encoded.as_bytes()[0] == 0x02
}

fn x_bytes(point: &ProjectivePoint) -> [u8; 32] {
    let affine = point.to_affine();
    let bytes = affine.to_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[1..33]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let secret = SecretKey::from_seed(&[1u8; 32]);
        let sig = secret.sign(Watermark::Operation, b"payload");
        assert!(secret
            .public_key()
            .verify(Watermark::Operation, b"payload", &sig));
    }

    #[test]
    fn test_watermark_separates_domains() {
        let secret = SecretKey::from_seed(&[2u8; 32]);
        let sig = secret.sign(Watermark::Endorsement, b"payload");
        assert!(!secret
            .public_key()
            .verify(Watermark::BlockHeader, b"payload", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let a = SecretKey::from_seed(&[3u8; 32]);
        let b = SecretKey::from_seed(&[4u8; 32]);
        let sig = a.sign(Watermark::Operation, b"payload");
        assert!(!b.public_key().verify(Watermark::Operation, b"payload", &sig));
    }

    #[test]
    fn test_public_key_bytes_roundtrip() {
        let secret = SecretKey::from_seed(&[5u8; 32]);
        let restored = PublicKey::from_bytes(secret.public_key().as_bytes()).unwrap();
        assert_eq!(restored.hash(), secret.public_key_hash());

        let sig = secret.sign(Watermark::Operation, b"x");
        assert!(restored.verify(Watermark::Operation, b"x", &sig));
    }

    #[test]
    fn test_deterministic_signing() {
        let secret = SecretKey::from_seed(&[6u8; 32]);
        let s1 = secret.sign(Watermark::Operation, b"m");
        let s2 = secret.sign(Watermark::Operation, b"m");
        assert_eq!(s1, s2);
    }
}
