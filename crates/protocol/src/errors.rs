//! Protocol errors, their severities and stable ids.
//!
//! Four severities govern mempool propagation:
//!
//! - **Permanent** — the operation can never become valid
//! - **Branch** — possibly valid on a different branch
//! - **Temporary** — possibly valid later on the same branch
//! - **Outdated** — previously valid, now pruned
//!
//! Every variant carries a stable string id of the form `"domain.name"`,
//! which is what failure results serialize.

use stele_context::{ContextError, MeterError};
use stele_crypto::PublicKeyHash;
use stele_types::{ContractAddress, Cycle, ErrorDescriptor, Tez, TezError};
use thiserror::Error;

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Never valid.
    Permanent,
    /// Possibly valid on another branch.
    Branch,
    /// Possibly valid later on this branch.
    Temporary,
    /// Was valid, now pruned.
    Outdated,
}

/// Errors raised by the transition core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // ---- plumbing ----
    /// Context failure (storage, codec, metering, origination nonce).
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Checked tez arithmetic failure.
    #[error(transparent)]
    Tez(#[from] TezError),

    // ---- endorsements ----
    /// The endorsement names a block other than the predecessor.
    #[error("wrong endorsement predecessor")]
    WrongEndorsementPredecessor,

    /// The endorsement level is not the current level minus one.
    #[error("invalid endorsement level: expected {expected}, got {provided}")]
    InvalidEndorsementLevel {
        /// The only accepted level.
        expected: u32,
        /// The level in the operation.
        provided: u32,
    },

    /// A slot in the endorsement was already endorsed in this block.
    #[error("duplicate endorsement for slot {slot}")]
    DuplicateEndorsement {
        /// The slot.
        slot: u16,
    },

    /// A slot at or beyond the per-level slot count.
    #[error("endorsement slot {slot} out of range")]
    EndorsementSlotOutOfRange {
        /// The slot.
        slot: u16,
    },

    /// The endorsement's slots are owned by more than one delegate.
    #[error("endorsement slots owned by {delegate1} and {delegate2}")]
    InconsistentEndorsementSlots {
        /// Owner of the first slot.
        delegate1: PublicKeyHash,
        /// The differing owner.
        delegate2: PublicKeyHash,
    },

    // ---- denunciations ----
    /// The two halves do not form valid double-endorsement evidence.
    #[error("invalid double endorsement evidence")]
    InvalidDoubleEndorsementEvidence,

    /// The two endorsements were made by different delegates.
    #[error("inconsistent double endorsement evidence: {delegate1} vs {delegate2}")]
    InconsistentDoubleEndorsementEvidence {
        /// Signer of the first half.
        delegate1: PublicKeyHash,
        /// Signer of the second half.
        delegate2: PublicKeyHash,
    },

    /// Double-endorsement evidence ahead of the current level.
    #[error("too early double endorsement evidence: level {level}, current {current}")]
    TooEarlyDoubleEndorsementEvidence {
        /// Evidence level.
        level: u32,
        /// Current level.
        current: u32,
    },

    /// Double-endorsement evidence older than the fork window.
    #[error("outdated double endorsement evidence: level {level}, last allowed {last}")]
    OutdatedDoubleEndorsementEvidence {
        /// Evidence level.
        level: u32,
        /// The last allowed fork level.
        last: u32,
    },

    /// The denounced delegate has nothing frozen to slash.
    #[error("unrequired double endorsement evidence")]
    UnrequiredDoubleEndorsementEvidence,

    /// The two headers do not form valid double-baking evidence.
    #[error("invalid double baking evidence: levels {level1} and {level2}")]
    InvalidDoubleBakingEvidence {
        /// Level of the first header.
        level1: u32,
        /// Level of the second header.
        level2: u32,
    },

    /// The two headers were baked by different delegates.
    #[error("inconsistent double baking evidence: {delegate1} vs {delegate2}")]
    InconsistentDoubleBakingEvidence {
        /// Baker of the first header.
        delegate1: PublicKeyHash,
        /// Baker of the second header.
        delegate2: PublicKeyHash,
    },

    /// Double-baking evidence ahead of the current level.
    #[error("too early double baking evidence: level {level}, current {current}")]
    TooEarlyDoubleBakingEvidence {
        /// Evidence level.
        level: u32,
        /// Current level.
        current: u32,
    },

    /// Double-baking evidence older than the fork window.
    #[error("outdated double baking evidence: level {level}, last allowed {last}")]
    OutdatedDoubleBakingEvidence {
        /// Evidence level.
        level: u32,
        /// The last allowed fork level.
        last: u32,
    },

    /// The denounced baker has nothing frozen to slash.
    #[error("unrequired double baking evidence")]
    UnrequiredDoubleBakingEvidence,

    // ---- nonces ----
    /// No commitment at the level, or the nonce does not match it.
    #[error("invalid seed nonce revelation at level {level}")]
    InvalidNonceRevelation {
        /// The claimed commitment level.
        level: u32,
    },

    /// The nonce at this level was already revealed.
    #[error("nonce at level {level} previously revealed")]
    PreviouslyRevealedNonce {
        /// The commitment level.
        level: u32,
    },

    // ---- activation ----
    /// No commitment matches the blinded key.
    #[error("invalid activation for {pkh}")]
    InvalidActivation {
        /// The key that tried to activate.
        pkh: PublicKeyHash,
    },

    // ---- voting ----
    /// The operation targets a voting period other than the current one.
    #[error("wrong voting period: current {current}, provided {provided}")]
    WrongVotingPeriod {
        /// The current period.
        current: u32,
        /// The period in the operation.
        provided: u32,
    },

    /// The voter is not a registered delegate.
    #[error("{pkh} is not a registered delegate")]
    UnregisteredVoter {
        /// The would-be voter.
        pkh: PublicKeyHash,
    },

    /// The delegate exceeded the per-period proposal cap.
    #[error("too many proposals from {pkh}")]
    TooManyProposals {
        /// The proposer.
        pkh: PublicKeyHash,
    },

    /// The delegate already submitted this proposal.
    #[error("duplicate proposal from {pkh}")]
    DuplicateProposal {
        /// The proposer.
        pkh: PublicKeyHash,
    },

    /// A proposal outside a Proposal period.
    #[error("unexpected proposal")]
    UnexpectedProposal,

    /// A ballot outside an Exploration or Promotion period, or on the
    /// wrong proposal.
    #[error("unexpected ballot")]
    UnexpectedBallot,

    /// The delegate already voted this period.
    #[error("{pkh} already cast a ballot this period")]
    DoubleBallot {
        /// The voter.
        pkh: PublicKeyHash,
    },

    // ---- manager operations ----
    /// The source account does not exist.
    #[error("non-existing contract {contract}")]
    NonExistingContract {
        /// The missing account.
        contract: ContractAddress,
    },

    /// The counter is below the expected value (replay).
    #[error("counter in the past for {contract}: expected {expected}, found {found}")]
    CounterInThePast {
        /// The source.
        contract: ContractAddress,
        /// Stored counter plus one.
        expected: u64,
        /// Counter in the operation.
        found: u64,
    },

    /// The counter is ahead of the expected value.
    #[error("counter in the future for {contract}: expected {expected}, found {found}")]
    CounterInTheFuture {
        /// The source.
        contract: ContractAddress,
        /// Stored counter plus one.
        expected: u64,
        /// Counter in the operation.
        found: u64,
    },

    /// The source's manager key has not been revealed.
    #[error("unrevealed manager key for {contract}")]
    UnrevealedManagerKey {
        /// The source.
        contract: ContractAddress,
    },

    /// A second reveal for an already revealed key.
    #[error("multiple revelation for {contract}")]
    MultipleRevelation {
        /// The source.
        contract: ContractAddress,
    },

    /// The revealed key does not hash to the source address.
    #[error("inconsistent reveal for {contract}")]
    InconsistentRevealHash {
        /// The source.
        contract: ContractAddress,
    },

    /// A missing or invalid envelope signature.
    #[error("invalid operation signature")]
    InvalidSignature,

    /// A batch mixing sources, or mixing manager and non-manager contents.
    #[error("malformed contents list")]
    MalformedBatch,

    /// Balance too low for a transfer or deposit.
    #[error("balance of {contract} too low: has {balance}, needs {amount}")]
    BalanceTooLow {
        /// The debited account.
        contract: ContractAddress,
        /// Its balance.
        balance: Tez,
        /// The attempted debit.
        amount: Tez,
    },

    /// Fee cannot be paid.
    #[error("{contract} cannot pay fee {fee}")]
    CannotPayFee {
        /// The source.
        contract: ContractAddress,
        /// The fee.
        fee: Tez,
    },

    /// Internal-operation nonce already recorded this block.
    #[error("internal operation replay, nonce {nonce}")]
    InternalOperationReplay {
        /// The replayed nonce.
        nonce: u16,
    },

    /// Transfer out of a non-spendable contract.
    #[error("contract {contract} is not spendable")]
    NonSpendableContract {
        /// The contract.
        contract: ContractAddress,
    },

    /// Delegate change on a non-delegatable contract.
    #[error("contract {contract} is not delegatable")]
    NonDelegatableContract {
        /// The contract.
        contract: ContractAddress,
    },

    /// Delegation to an unregistered delegate.
    #[error("{pkh} is not a registered delegate")]
    UnregisteredDelegate {
        /// The named delegate.
        pkh: PublicKeyHash,
    },

    /// Parameters passed to an unscripted destination.
    #[error("unexpected parameters for {destination}")]
    UnexpectedParameters {
        /// The destination.
        destination: ContractAddress,
    },

    /// Script execution failed.
    #[error("script failure: {message}")]
    ScriptFailure {
        /// The runner's rendering of the failure.
        message: String,
    },

    // ---- rights and rolls ----
    /// No roll snapshot for the cycle.
    #[error("no roll snapshot for {cycle}")]
    NoRollSnapshotForCycle {
        /// The cycle.
        cycle: Cycle,
    },

    /// The cycle's snapshot contains no rolls to draw from.
    #[error("no rolls in snapshot for {cycle}")]
    NoRollsInSnapshot {
        /// The cycle.
        cycle: Cycle,
    },

    /// No seed recorded for the cycle.
    #[error("unknown seed for {cycle}")]
    UnknownSeed {
        /// The cycle.
        cycle: Cycle,
    },

    // ---- block headers ----
    /// The proof-of-work stamp exceeds the threshold.
    #[error("invalid proof-of-work nonce: stamp {stamp:#x} above threshold {threshold:#x}")]
    InvalidProofOfWorkNonce {
        /// Stamp of the header.
        stamp: u64,
        /// The protocol threshold.
        threshold: u64,
    },

    /// The announced fitness does not progress past the predecessor.
    #[error("invalid fitness: predecessor {predecessor}, provided {provided}")]
    InvalidFitness {
        /// Predecessor fitness.
        predecessor: u64,
        /// Announced fitness.
        provided: u64,
    },

    /// The announced fitness differs from the computed one.
    #[error("wrong fitness: computed {expected}, announced {announced}")]
    WrongFitness {
        /// Computed fitness.
        expected: u64,
        /// Announced fitness.
        announced: u64,
    },

    /// The header signature does not verify against the rights owner.
    #[error("invalid block signature for baker {baker}")]
    InvalidBlockSignature {
        /// The expected baker.
        baker: PublicKeyHash,
    },

    /// A seed-nonce commitment where none is expected, or vice versa.
    #[error("invalid commitment in block header: expected {expected}")]
    InvalidCommitment {
        /// Whether a commitment was expected at this level.
        expected: bool,
    },
}

impl Error {
    /// The propagation severity of this error.
    pub fn severity(&self) -> Severity {
        use Error::*;
        match self {
            WrongEndorsementPredecessor => Severity::Branch,
            InvalidEndorsementLevel { .. } => Severity::Temporary,
            DuplicateEndorsement { .. } => Severity::Branch,
            TooEarlyDoubleEndorsementEvidence { .. } | TooEarlyDoubleBakingEvidence { .. } => {
                Severity::Temporary
            }
            OutdatedDoubleEndorsementEvidence { .. } | OutdatedDoubleBakingEvidence { .. } => {
                Severity::Outdated
            }
            UnrequiredDoubleEndorsementEvidence | UnrequiredDoubleBakingEvidence => {
                Severity::Branch
            }
            WrongVotingPeriod { .. } => Severity::Temporary,
            NonExistingContract { .. } => Severity::Branch,
            CounterInTheFuture { .. } => Severity::Temporary,
            UnrevealedManagerKey { .. } => Severity::Branch,
            BalanceTooLow { .. } | CannotPayFee { .. } => Severity::Temporary,
            _ => Severity::Permanent,
        }
    }

    /// Stable serialization id, `"domain.name"`.
    pub fn id(&self) -> &'static str {
        use Error::*;
        match self {
            Context(ContextError::Meter(MeterError::GasExhausted)) => "gas.exhausted",
            Context(ContextError::Meter(MeterError::StorageLimitExceeded)) => {
                "storage.limit_exceeded"
            }
            Context(_) => "context.storage_error",
            Tez(_) => "tez.arithmetic_error",
            WrongEndorsementPredecessor => "operation.wrong_endorsement_predecessor",
            InvalidEndorsementLevel { .. } => "operation.invalid_endorsement_level",
            DuplicateEndorsement { .. } => "operation.duplicate_endorsement",
            EndorsementSlotOutOfRange { .. } => "operation.endorsement_slot_out_of_range",
            InconsistentEndorsementSlots { .. } => "operation.inconsistent_endorsement_slots",
            InvalidDoubleEndorsementEvidence => "operation.invalid_double_endorsement_evidence",
            InconsistentDoubleEndorsementEvidence { .. } => {
                "operation.inconsistent_double_endorsement_evidence"
            }
            TooEarlyDoubleEndorsementEvidence { .. } => {
                "operation.too_early_double_endorsement_evidence"
            }
            OutdatedDoubleEndorsementEvidence { .. } => {
                "operation.outdated_double_endorsement_evidence"
            }
            UnrequiredDoubleEndorsementEvidence => {
                "operation.unrequired_double_endorsement_evidence"
            }
            InvalidDoubleBakingEvidence { .. } => "operation.invalid_double_baking_evidence",
            InconsistentDoubleBakingEvidence { .. } => {
                "operation.inconsistent_double_baking_evidence"
            }
            TooEarlyDoubleBakingEvidence { .. } => "operation.too_early_double_baking_evidence",
            OutdatedDoubleBakingEvidence { .. } => "operation.outdated_double_baking_evidence",
            UnrequiredDoubleBakingEvidence => "operation.unrequired_double_baking_evidence",
            InvalidNonceRevelation { .. } => "operation.invalid_nonce_revelation",
            PreviouslyRevealedNonce { .. } => "operation.previously_revealed_nonce",
            InvalidActivation { .. } => "operation.invalid_activation",
            WrongVotingPeriod { .. } => "operation.wrong_voting_period",
            UnregisteredVoter { .. } => "operation.unregistered_voter",
            TooManyProposals { .. } => "operation.too_many_proposals",
            DuplicateProposal { .. } => "operation.duplicate_proposal",
            UnexpectedProposal => "operation.unexpected_proposal",
            UnexpectedBallot => "operation.unexpected_ballot",
            DoubleBallot { .. } => "operation.double_ballot",
            NonExistingContract { .. } => "contract.non_existing_contract",
            CounterInThePast { .. } => "contract.counter_in_the_past",
            CounterInTheFuture { .. } => "contract.counter_in_the_future",
            UnrevealedManagerKey { .. } => "contract.unrevealed_manager_key",
            MultipleRevelation { .. } => "contract.multiple_revelation",
            InconsistentRevealHash { .. } => "contract.inconsistent_reveal_hash",
            InvalidSignature => "operation.invalid_signature",
            MalformedBatch => "operation.malformed_batch",
            BalanceTooLow { .. } => "contract.balance_too_low",
            CannotPayFee { .. } => "contract.cannot_pay_fee",
            InternalOperationReplay { .. } => "operation.internal_operation_replay",
            NonSpendableContract { .. } => "contract.non_spendable_contract",
            NonDelegatableContract { .. } => "contract.non_delegatable_contract",
            UnregisteredDelegate { .. } => "contract.unregistered_delegate",
            UnexpectedParameters { .. } => "contract.unexpected_parameters",
            ScriptFailure { .. } => "script.runtime_failure",
            NoRollSnapshotForCycle { .. } => "roll.no_snapshot_for_cycle",
            NoRollsInSnapshot { .. } => "roll.no_rolls_in_snapshot",
            UnknownSeed { .. } => "seed.unknown_seed",
            InvalidProofOfWorkNonce { .. } => "block.invalid_proof_of_work_nonce",
            InvalidFitness { .. } => "block.invalid_fitness",
            WrongFitness { .. } => "block.wrong_fitness",
            InvalidBlockSignature { .. } => "block.invalid_signature",
            InvalidCommitment { .. } => "block.invalid_commitment",
        }
    }

    /// The `{ id, message }` form carried inside failure results.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            id: self.id().to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severities() {
        let err = Error::TooEarlyDoubleEndorsementEvidence { level: 5, current: 5 };
        assert_eq!(err.severity(), Severity::Temporary);

        let err = Error::OutdatedDoubleEndorsementEvidence { level: 1, last: 16 };
        assert_eq!(err.severity(), Severity::Outdated);

        let err = Error::InvalidDoubleEndorsementEvidence;
        assert_eq!(err.severity(), Severity::Permanent);
    }

    #[test]
    fn test_ids_are_namespaced() {
        let err = Error::InvalidActivation {
            pkh: PublicKeyHash::ZERO,
        };
        assert_eq!(err.id(), "operation.invalid_activation");
        assert!(err.descriptor().message.contains("activation"));
    }
}
