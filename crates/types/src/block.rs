//! Block headers: the shell/protocol split.
//!
//! The shell header is what every protocol version shares (level, fitness,
//! predecessor, hashes); the protocol data carries the priority, the
//! optional seed-nonce commitment, the proof-of-work nonce and the baker's
//! signature. The signature covers the watermarked bytes of everything
//! except itself.

use crate::{BlockHash, ContextHash, Error, NonceHash, OperationListHash, Result, H256};
use serde::{Deserialize, Serialize};
use stele_crypto::{PublicKey, SecretKey, Signature, Watermark};

/// The protocol-agnostic part of a block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellHeader {
    /// Block level (height); genesis is 0.
    pub level: u32,
    /// Protocol version number.
    pub proto: u8,
    /// Hash of the predecessor block.
    pub predecessor: BlockHash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Number of validation passes.
    pub validation_passes: u8,
    /// Hash of the block's operation lists.
    pub operations_hash: OperationListHash,
    /// Announced fitness after this block.
    pub fitness: u64,
    /// Hash of the resulting context.
    pub context: ContextHash,
}

/// The protocol-specific part of a block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolData {
    /// Baking priority the block claims.
    pub priority: u16,
    /// Seed-nonce commitment, on commitment levels.
    pub seed_nonce_hash: Option<NonceHash>,
    /// Proof-of-work nonce.
    pub proof_of_work_nonce: [u8; 8],
    /// Baker signature over the rest of the header.
    pub signature: Signature,
}

/// A full block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Shell part.
    pub shell: ShellHeader,
    /// Protocol part.
    pub protocol_data: ProtocolData,
}

impl BlockHeader {
    /// The bytes covered by the baker signature: the whole header except
    /// the signature itself.
    pub fn signed_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            &self.shell,
            self.protocol_data.priority,
            &self.protocol_data.seed_nonce_hash,
            &self.protocol_data.proof_of_work_nonce,
        ))
        .unwrap_or_default()
    }

    /// The block hash, covering the signature.
    pub fn hash(&self) -> BlockHash {
        H256::keccak256(&self.encode())
    }

    /// The proof-of-work stamp: the first 8 bytes of the digest of the
    /// signed bytes, big-endian. Valid stamps are numerically at or below
    /// the proof-of-work threshold.
    pub fn pow_stamp(&self) -> u64 {
        let digest = H256::keccak256(&self.signed_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(prefix)
    }

    /// Signs the header with the baker's key, filling in the signature.
    pub fn sign(&mut self, secret: &SecretKey) {
        self.protocol_data.signature = secret.sign(Watermark::BlockHeader, &self.signed_bytes());
    }

    /// Verifies the header signature against `key`.
    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        key.verify(
            Watermark::BlockHeader,
            &self.signed_bytes(),
            &self.protocol_data.signature,
        )
    }

    /// Encodes the header with the tagged binary codec.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decodes a header.
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| Error::Codec(e.to_string()))
    }
}
