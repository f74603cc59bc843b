//! Operation envelopes, contents and results.
//!
//! An operation is a signed envelope: a branch (the block hash it was made
//! on), a contents list, and a signature over the watermark-tagged bytes of
//! everything except the signature itself. A contents list is either one
//! non-manager operation or a linear batch of manager operations.
//!
//! Results mirror the contents tag-for-tag, so the result vector of a batch
//! pairs positionally with its input vector.

use crate::{BlockHash, ContractAddress, Cycle, Error, NonceHash, ProtocolHash, Result, Script, Tez, H256};
use serde::{Deserialize, Serialize};
use std::fmt;
use stele_crypto::{ActivationCode, PublicKey, PublicKeyHash, SecretKey, Signature, Watermark};

/// Domain tag for hashing seed nonces into their commitments.
const NONCE_HASH_DOMAIN: &[u8] = b"stele_nonce_hash";

/// A 32-byte seed nonce, committed to by hash and revealed later.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedNonce(pub [u8; 32]);

impl SeedNonce {
    /// The commitment hash of this nonce.
    pub fn hash(&self) -> NonceHash {
        H256::keccak256_concat(&[NONCE_HASH_DOMAIN, &self.0])
    }
}

impl fmt::Debug for SeedNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The nonce stays secret until revealed.
        f.debug_struct("SeedNonce").finish_non_exhaustive()
    }
}

/// A ballot cast on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ballot {
    /// In favor.
    Yay,
    /// Against.
    Nay,
    /// Abstaining, but counted for quorum.
    Pass,
}

/// One entry of a contents list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contents {
    /// Endorsement of the predecessor block on the given slots.
    Endorsement {
        /// The endorsed block (must be the predecessor).
        block: BlockHash,
        /// The endorsed level (must be the current level minus one).
        level: u32,
        /// The endorsement slots claimed.
        slots: Vec<u16>,
    },
    /// Revelation of a previously committed seed nonce.
    SeedNonceRevelation {
        /// The level whose commitment is being revealed.
        level: u32,
        /// The revealed nonce.
        nonce: SeedNonce,
    },
    /// Evidence that a delegate endorsed two distinct blocks at one level.
    DoubleEndorsementEvidence {
        /// First endorsement operation.
        op1: Box<SignedOperation>,
        /// Second endorsement operation.
        op2: Box<SignedOperation>,
    },
    /// Evidence that a delegate baked two distinct blocks at one level.
    DoubleBakingEvidence {
        /// First block header.
        header1: Box<crate::BlockHeader>,
        /// Second block header.
        header2: Box<crate::BlockHeader>,
    },
    /// Activation of a genesis-committed account.
    ActivateAccount {
        /// The public key hash being activated.
        pkh: PublicKeyHash,
        /// The secret activation code.
        code: ActivationCode,
    },
    /// Protocol proposals by a delegate.
    Proposals {
        /// The proposing delegate.
        source: PublicKeyHash,
        /// The voting period the proposals target.
        period: u32,
        /// Proposed protocol hashes.
        proposals: Vec<ProtocolHash>,
    },
    /// A ballot on the current proposal.
    Ballot {
        /// The voting delegate.
        source: PublicKeyHash,
        /// The voting period the ballot targets.
        period: u32,
        /// The proposal voted on.
        proposal: ProtocolHash,
        /// The vote.
        ballot: Ballot,
    },
    /// A fee-bearing, counter-protected manager operation.
    Manager(ManagerOperation),
}

impl Contents {
    /// Whether this entry is a manager operation.
    pub fn is_manager(&self) -> bool {
        matches!(self, Contents::Manager(_))
    }
}

/// A manager operation: reveal, transaction, origination or delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerOperation {
    /// The paying, signing account.
    pub source: ContractAddress,
    /// Fee paid to the baker.
    pub fee: Tez,
    /// Expected counter: stored counter plus one.
    pub counter: u64,
    /// Gas limit for the content execution.
    pub gas_limit: u64,
    /// Storage-space limit for the content execution.
    pub storage_limit: u64,
    /// The operation payload.
    pub content: ManagerContent,
}

/// Payload of a manager or internal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerContent {
    /// Reveals the manager public key of the source.
    Reveal {
        /// The key whose hash is the source's address.
        public_key: PublicKey,
    },
    /// Transfers tez, running the destination script if there is one.
    Transaction {
        /// Amount transferred.
        amount: Tez,
        /// Parameter passed to a scripted destination.
        parameters: Option<Vec<u8>>,
        /// Destination account.
        destination: ContractAddress,
    },
    /// Creates a new originated account.
    Origination {
        /// Manager key hash of the new account.
        manager: PublicKeyHash,
        /// Initial delegate, if any.
        delegate: Option<PublicKeyHash>,
        /// Script, for a scripted account.
        script: Option<Script>,
        /// Whether the account's funds are spendable by its manager.
        spendable: bool,
        /// Whether the delegate may later be changed.
        delegatable: bool,
        /// Initial balance, debited from the source.
        credit: Tez,
    },
    /// Sets or clears the delegate of the source.
    Delegation {
        /// New delegate; `None` clears it.
        delegate: Option<PublicKeyHash>,
    },
}

impl ManagerContent {
    /// Short kind name, used in logs and failure results.
    pub fn kind(&self) -> &'static str {
        match self {
            ManagerContent::Reveal { .. } => "reveal",
            ManagerContent::Transaction { .. } => "transaction",
            ManagerContent::Origination { .. } => "origination",
            ManagerContent::Delegation { .. } => "delegation",
        }
    }
}

/// An operation emitted by a script during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalOperation {
    /// The emitting contract.
    pub source: ContractAddress,
    /// Per-operation nonce within the block, for replay protection.
    pub nonce: u16,
    /// The operation payload.
    pub content: ManagerContent,
}

/// A signed operation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOperation {
    /// Hash of the block this operation branches from.
    pub branch: BlockHash,
    /// The contents list: one non-manager entry, or a manager batch.
    pub contents: Vec<Contents>,
    /// Signature over the watermarked envelope bytes; `None` while forging.
    pub signature: Option<Signature>,
}

impl SignedOperation {
    /// Builds and signs an envelope.
    pub fn sign(secret: &SecretKey, branch: BlockHash, contents: Vec<Contents>) -> Self {
        let mut op = Self {
            branch,
            contents,
            signature: None,
        };
        let sig = secret.sign(op.watermark(), &op.signed_bytes());
        op.signature = Some(sig);
        op
    }

    /// The watermark domain for this envelope.
    ///
    /// A lone endorsement signs under the endorsement watermark; everything
    /// else signs as a generic operation.
    pub fn watermark(&self) -> Watermark {
        match self.contents.as_slice() {
            [Contents::Endorsement { .. }] => Watermark::Endorsement,
            _ => Watermark::Operation,
        }
    }

    /// The bytes covered by the signature: branch and contents.
    pub fn signed_bytes(&self) -> Vec<u8> {
        // bincode cannot fail on these in-memory values.
        bincode::serialize(&(&self.branch, &self.contents)).unwrap_or_default()
    }

    /// Verifies the envelope signature against `key`.
    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        match &self.signature {
            Some(sig) => key.verify(self.watermark(), &self.signed_bytes(), sig),
            None => false,
        }
    }

    /// The operation hash, covering the signature.
    pub fn hash(&self) -> crate::OperationHash {
        H256::keccak256(&self.encode())
    }

    /// Encodes the envelope with the tagged binary codec.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decodes an envelope.
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| Error::Codec(e.to_string()))
    }

    /// For evidence handling: the single endorsement in this envelope.
    pub fn as_single_endorsement(&self) -> Option<(&BlockHash, u32, &[u16])> {
        match self.contents.as_slice() {
            [Contents::Endorsement { block, level, slots }] => Some((block, *level, slots)),
            _ => None,
        }
    }
}

/// One balance movement caused by an operation.
///
/// Positive `change` credits the target, negative debits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceUpdate {
    /// Spendable balance of an account.
    Contract {
        /// The account.
        contract: ContractAddress,
        /// Signed mutez delta.
        change: i64,
    },
    /// Frozen deposits of a delegate for a cycle.
    Deposits {
        /// The delegate.
        delegate: PublicKeyHash,
        /// The cycle bucket.
        cycle: Cycle,
        /// Signed mutez delta.
        change: i64,
    },
    /// Frozen fees of a delegate for a cycle.
    Fees {
        /// The delegate.
        delegate: PublicKeyHash,
        /// The cycle bucket.
        cycle: Cycle,
        /// Signed mutez delta.
        change: i64,
    },
    /// Frozen rewards of a delegate for a cycle.
    Rewards {
        /// The delegate.
        delegate: PublicKeyHash,
        /// The cycle bucket.
        cycle: Cycle,
        /// Signed mutez delta.
        change: i64,
    },
}

/// A serialized error inside a failure result: stable id plus rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Stable error id, `"domain.name"`.
    pub id: String,
    /// Human-readable description.
    pub message: String,
}

/// Outcome of applying one manager (or internal) content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentOutcome {
    /// Reveal applied (the key was recorded at precheck).
    Reveal,
    /// Transaction applied.
    Transaction {
        /// New storage of a scripted destination.
        storage: Option<Vec<u8>>,
        /// Balance movements of the transfer.
        balance_updates: Vec<BalanceUpdate>,
        /// Gas consumed by script execution.
        consumed_gas: u64,
    },
    /// Origination applied.
    Origination {
        /// Balance movements, including the burned origination fee.
        balance_updates: Vec<BalanceUpdate>,
        /// The newly created account.
        originated: ContractAddress,
        /// Gas consumed.
        consumed_gas: u64,
    },
    /// Delegation applied.
    Delegation,
}

/// Result of one manager (or internal) content execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// Content applied; its side effects are committed.
    Applied(ContentOutcome),
    /// Content failed; its side effects were discarded.
    Failed {
        /// Kind of the failing content.
        kind: String,
        /// The errors, outermost first.
        errors: Vec<ErrorDescriptor>,
    },
    /// Content skipped because an earlier entry failed.
    Skipped,
}

impl OperationResult {
    /// Whether this result is `Applied`.
    pub fn is_applied(&self) -> bool {
        matches!(self, OperationResult::Applied(_))
    }
}

/// Result of one internal operation, paired with the operation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalOperationResult {
    /// The internal operation that ran (or was skipped).
    pub operation: InternalOperation,
    /// Its result.
    pub result: OperationResult,
}

/// Result of a whole manager operation: precheck effects plus execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerOperationResult {
    /// Fee movement from precheck; survives content failure.
    pub balance_updates: Vec<BalanceUpdate>,
    /// Result of the operation's own content.
    pub operation_result: OperationResult,
    /// Results of emitted internal operations, in application order.
    pub internal_operation_results: Vec<InternalOperationResult>,
}

/// Result of one contents-list entry, mirroring [`Contents`] positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentsResult {
    /// Endorsement recorded.
    Endorsement {
        /// The endorsing delegate.
        delegate: PublicKeyHash,
        /// The recorded slots.
        slots: Vec<u16>,
        /// Deposit and reward movements.
        balance_updates: Vec<BalanceUpdate>,
    },
    /// Nonce revealed.
    SeedNonceRevelation {
        /// The revelation tip credited to the baker.
        balance_updates: Vec<BalanceUpdate>,
    },
    /// Double endorsement denounced and slashed.
    DoubleEndorsementEvidence {
        /// Slashed buckets and the accuser reward.
        balance_updates: Vec<BalanceUpdate>,
    },
    /// Double baking denounced and slashed.
    DoubleBakingEvidence {
        /// Slashed buckets and the accuser reward.
        balance_updates: Vec<BalanceUpdate>,
    },
    /// Account activated.
    ActivateAccount {
        /// The activated credit.
        balance_updates: Vec<BalanceUpdate>,
    },
    /// Proposals recorded.
    Proposals,
    /// Ballot recorded.
    Ballot,
    /// Manager operation result.
    Manager(ManagerOperationResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_hash_is_stable() {
        let nonce = SeedNonce([5u8; 32]);
        assert_eq!(nonce.hash(), nonce.hash());
        assert_ne!(nonce.hash(), SeedNonce([6u8; 32]).hash());
    }

    #[test]
    fn test_single_endorsement_watermark() {
        let op = SignedOperation {
            branch: H256::NIL,
            contents: vec![Contents::Endorsement {
                block: H256::NIL,
                level: 1,
                slots: vec![0],
            }],
            signature: None,
        };
        assert_eq!(op.watermark(), Watermark::Endorsement);
    }
}
