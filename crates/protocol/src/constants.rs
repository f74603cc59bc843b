//! Protocol constants.
//!
//! One [`Constants`] value parameterizes every protocol call. The default
//! profile is mainnet-sized; [`Constants::test`] shrinks cycles so suites
//! can cross cycle boundaries in a handful of blocks.

use stele_types::{Cycle, CycleLayout, LayoutError, Level, Tez};

/// The protocol constants, fixed at genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constants {
    /// Retention window, in cycles, for denunciation and rights state.
    pub preserved_cycles: u32,
    /// Block-count layout of cycles, commitments, snapshots and voting.
    pub layout: CycleLayout,
    /// Endorsement slots per level.
    pub endorsers_per_block: u16,
    /// Stake per roll.
    pub tokens_per_roll: Tez,
    /// Frozen deposit per baked block.
    pub block_security_deposit: Tez,
    /// Frozen deposit per endorsement slot.
    pub endorsement_security_deposit: Tez,
    /// Reward per baked block.
    pub block_reward: Tez,
    /// Base reward per endorsement slot; divided by `priority + 1`.
    pub endorsement_reward: Tez,
    /// Tip for revealing a committed seed nonce.
    pub seed_nonce_revelation_tip: Tez,
    /// Burn per origination.
    pub origination_burn: Tez,
    /// Hard cap on per-operation gas.
    pub hard_gas_limit_per_operation: u64,
    /// Hard cap on per-operation storage growth, in bytes.
    pub hard_storage_limit_per_operation: u64,
    /// Upper bound on the proof-of-work stamp of a valid header.
    pub proof_of_work_threshold: u64,
    /// Proposals a delegate may submit within one voting period.
    pub max_proposals_per_delegate: u32,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            preserved_cycles: 5,
            // 4096-block cycles; commitment every 32 blocks, snapshot every
            // 256, voting periods of 8 cycles.
            layout: CycleLayout {
                blocks_per_cycle: 4096,
                blocks_per_commitment: 32,
                blocks_per_roll_snapshot: 256,
                blocks_per_voting_period: 32_768,
            },
            endorsers_per_block: 32,
            tokens_per_roll: Tez::from_mutez(10_000_000_000),
            block_security_deposit: Tez::from_mutez(512_000_000),
            endorsement_security_deposit: Tez::from_mutez(64_000_000),
            block_reward: Tez::from_mutez(16_000_000),
            endorsement_reward: Tez::from_mutez(2_000_000),
            seed_nonce_revelation_tip: Tez::from_mutez(125_000),
            origination_burn: Tez::from_mutez(257_000),
            hard_gas_limit_per_operation: 400_000,
            hard_storage_limit_per_operation: 60_000,
            proof_of_work_threshold: u64::MAX >> 10,
            max_proposals_per_delegate: 20,
        }
    }
}

impl Constants {
    /// A small profile for tests: 16-block cycles, 2 preserved cycles.
    pub fn test() -> Self {
        Self {
            preserved_cycles: 2,
            layout: CycleLayout {
                blocks_per_cycle: 16,
                blocks_per_commitment: 4,
                blocks_per_roll_snapshot: 8,
                blocks_per_voting_period: 32,
            },
            endorsers_per_block: 8,
            tokens_per_roll: Tez::from_mutez(1_000_000_000),
            block_security_deposit: Tez::from_mutez(48_000_000),
            endorsement_security_deposit: Tez::from_mutez(6_000_000),
            block_reward: Tez::from_mutez(8_000_000),
            endorsement_reward: Tez::from_mutez(1_000_000),
            seed_nonce_revelation_tip: Tez::from_mutez(125_000),
            origination_burn: Tez::from_mutez(257_000),
            hard_gas_limit_per_operation: 400_000,
            hard_storage_limit_per_operation: 60_000,
            // Tests never grind proof-of-work.
            proof_of_work_threshold: u64::MAX,
            max_proposals_per_delegate: 20,
        }
    }

    /// Validates the layout; call once at startup.
    pub fn validate(&self) -> Result<(), LayoutError> {
        CycleLayout::new(
            self.layout.blocks_per_cycle,
            self.layout.blocks_per_commitment,
            self.layout.blocks_per_roll_snapshot,
            self.layout.blocks_per_voting_period,
        )
        .map(|_| ())
    }

    /// Expands a raw level.
    pub fn level(&self, raw: u32) -> Level {
        Level::from_raw(raw, &self.layout)
    }

    /// Per-slot endorsement reward for a block at `priority`.
    pub fn endorsement_reward(&self, priority: u16) -> Tez {
        self.endorsement_reward.div_floor(u64::from(priority) + 1)
    }

    /// The first level of `cycle`.
    pub fn first_level_of_cycle(&self, cycle: Cycle) -> u32 {
        cycle.0 * self.layout.blocks_per_cycle
    }

    /// The oldest level still accepted in denunciation evidence, seen from
    /// `current`: the first level of the cycle `preserved_cycles` back.
    pub fn last_allowed_fork_level(&self, current: &Level) -> u32 {
        let cycle = current
            .cycle
            .checked_sub(self.preserved_cycles)
            .unwrap_or(Cycle::ZERO);
        self.first_level_of_cycle(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_valid() {
        assert!(Constants::default().validate().is_ok());
        assert!(Constants::test().validate().is_ok());
    }

    #[test]
    fn test_endorsement_reward_decays_with_priority() {
        let constants = Constants::test();
        let full = constants.endorsement_reward(0);
        assert_eq!(constants.endorsement_reward(1), full.div_floor(2));
        assert_eq!(constants.endorsement_reward(3), full.div_floor(4));
    }

    #[test]
    fn test_last_allowed_fork_level() {
        let constants = Constants::test();
        // Cycle 5, 16-block cycles, 2 preserved: fork floor at cycle 3.
        let level = constants.level(5 * 16 + 3);
        assert_eq!(constants.last_allowed_fork_level(&level), 3 * 16);
        // Early cycles clamp at genesis.
        let level = constants.level(4);
        assert_eq!(constants.last_allowed_fork_level(&level), 0);
    }
}
