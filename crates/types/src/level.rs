//! Cycles, levels and the cycle layout.
//!
//! A raw level (block height) expands into a [`Level`]: its cycle, the
//! position inside the cycle, the voting period coordinates, and whether a
//! seed-nonce commitment is expected at that level. The expansion is pure
//! arithmetic over a validated [`CycleLayout`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum blocks per cycle, keeping cycles long enough to snapshot.
pub const MIN_BLOCKS_PER_CYCLE: u32 = 4;

/// Errors from cycle layout validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Cycle length below the minimum.
    #[error("invalid blocks_per_cycle {0}: must be at least {MIN_BLOCKS_PER_CYCLE}")]
    InvalidBlocksPerCycle(u32),

    /// Commitment interval must divide the cycle length.
    #[error("blocks_per_commitment {commitment} does not divide blocks_per_cycle {cycle}")]
    CommitmentMisaligned {
        /// The commitment interval.
        commitment: u32,
        /// The cycle length.
        cycle: u32,
    },

    /// Snapshot interval must divide the cycle length.
    #[error("blocks_per_roll_snapshot {snapshot} does not divide blocks_per_cycle {cycle}")]
    SnapshotMisaligned {
        /// The snapshot interval.
        snapshot: u32,
        /// The cycle length.
        cycle: u32,
    },
}

/// A cycle number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Cycle(pub u32);

impl Cycle {
    /// The first cycle.
    pub const ZERO: Self = Self(0);

    /// The cycle `offset` cycles after this one.
    pub fn add(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }

    /// The cycle `offset` cycles before this one, if any.
    pub fn checked_sub(self, offset: u32) -> Option<Self> {
        self.0.checked_sub(offset).map(Self)
    }

    /// Successor cycle.
    pub fn succ(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {}", self.0)
    }
}

/// The block-count layout of cycles, commitments and voting periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleLayout {
    /// Blocks per cycle.
    pub blocks_per_cycle: u32,
    /// A seed-nonce commitment is expected every this many blocks.
    pub blocks_per_commitment: u32,
    /// Roll snapshots are taken every this many blocks.
    pub blocks_per_roll_snapshot: u32,
    /// Blocks per voting period.
    pub blocks_per_voting_period: u32,
}

impl CycleLayout {
    /// Validates a layout.
    pub fn new(
        blocks_per_cycle: u32,
        blocks_per_commitment: u32,
        blocks_per_roll_snapshot: u32,
        blocks_per_voting_period: u32,
    ) -> Result<Self, LayoutError> {
        if blocks_per_cycle < MIN_BLOCKS_PER_CYCLE {
            return Err(LayoutError::InvalidBlocksPerCycle(blocks_per_cycle));
        }
        if blocks_per_commitment == 0 || blocks_per_cycle % blocks_per_commitment != 0 {
            return Err(LayoutError::CommitmentMisaligned {
                commitment: blocks_per_commitment,
                cycle: blocks_per_cycle,
            });
        }
        if blocks_per_roll_snapshot == 0 || blocks_per_cycle % blocks_per_roll_snapshot != 0 {
            return Err(LayoutError::SnapshotMisaligned {
                snapshot: blocks_per_roll_snapshot,
                cycle: blocks_per_cycle,
            });
        }
        Ok(Self {
            blocks_per_cycle,
            blocks_per_commitment,
            blocks_per_roll_snapshot,
            blocks_per_voting_period: blocks_per_voting_period.max(1),
        })
    }
}

/// A fully expanded block level.
///
/// Totally ordered by the raw `level`; the remaining fields are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Raw level (block height); genesis is 0.
    pub level: u32,
    /// The cycle containing this level.
    pub cycle: Cycle,
    /// Position of this level inside its cycle.
    pub cycle_position: u32,
    /// Voting period index.
    pub voting_period: u32,
    /// Position inside the voting period.
    pub voting_period_position: u32,
    /// Whether this block must carry a seed-nonce commitment.
    pub expected_commitment: bool,
}

impl Level {
    /// Expands a raw level against a layout.
    pub fn from_raw(raw: u32, layout: &CycleLayout) -> Self {
        let cycle = raw / layout.blocks_per_cycle;
        let cycle_position = raw % layout.blocks_per_cycle;
        Self {
            level: raw,
            cycle: Cycle(cycle),
            cycle_position,
            voting_period: raw / layout.blocks_per_voting_period,
            voting_period_position: raw % layout.blocks_per_voting_period,
            expected_commitment: (cycle_position + 1) % layout.blocks_per_commitment == 0,
        }
    }

    /// The level `offset` blocks after this one.
    pub fn succ(&self, layout: &CycleLayout) -> Self {
        Self::from_raw(self.level + 1, layout)
    }

    /// The predecessor level, or `None` at genesis.
    pub fn pred(&self, layout: &CycleLayout) -> Option<Self> {
        self.level.checked_sub(1).map(|raw| Self::from_raw(raw, layout))
    }

    /// Whether this level is the last of its cycle.
    pub fn last_of_cycle(&self, layout: &CycleLayout) -> bool {
        self.cycle_position == layout.blocks_per_cycle - 1
    }

    /// Whether this level is the last of its voting period.
    pub fn last_of_voting_period(&self, layout: &CycleLayout) -> bool {
        self.voting_period_position == layout.blocks_per_voting_period - 1
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level.cmp(&other.level)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} ({}, pos {})", self.level, self.cycle, self.cycle_position)
    }
}
