//! Baking and endorsement rights selection.
//!
//! Rights for a level are drawn from the frozen roll snapshot of its
//! cycle: a sequence keyed by the cycle seed and a purpose tag draws roll
//! ids below the snapshot bound until one is owned, and the owner holds
//! the right. Priorities and slots map to the sequence offset, so the
//! whole schedule is deterministic and verifiable by anyone with the
//! context.

use crate::errors::{Error, Result};
use crate::{rolls, seeds};
use stele_context::Context;
use stele_crypto::{PublicKeyHash, Sequence};
use stele_types::{Level, Roll};

/// What a right is drawn for; selects the sequence tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Baking priorities.
    Baking,
    /// Endorsement slots.
    Endorsement,
}

impl Purpose {
    fn tag(self) -> &'static [u8] {
        match self {
            Purpose::Baking => b"level baking:",
            Purpose::Endorsement => b"level endorsement:",
        }
    }
}

/// Draw attempts before concluding the snapshot holds no owned roll.
const MAX_DRAWS: u32 = 10_000;

/// The delegate holding the right for (`purpose`, `level`, `offset`).
pub fn owner(
    ctx: &Context,
    purpose: Purpose,
    level: &Level,
    offset: u32,
) -> Result<PublicKeyHash> {
    let cycle = level.cycle;
    let seed = seeds::for_cycle(ctx, cycle)?;
    let index = rolls::snapshot_index(ctx, cycle)?;
    let bound = rolls::last_for_snapshot(ctx, cycle, index)?.index();
    if bound == 0 {
        return Err(Error::NoRollsInSnapshot { cycle });
    }

    let mut sequence = Sequence::init(
        &seed,
        &[purpose.tag(), &level.cycle_position.to_be_bytes()],
    );
    sequence.skip(offset);

    // Unowned draws (rolls in limbo at snapshot time) advance the stream.
    for _ in 0..MAX_DRAWS {
        let roll = Roll(sequence.take_u32(bound));
        if let Some(delegate) = rolls::snapshot_owner(ctx, cycle, index, roll)? {
            return Ok(delegate);
        }
    }
    Err(Error::NoRollsInSnapshot { cycle })
}

/// The delegate with the right to bake `level` at `priority`.
pub fn baking_rights_owner(ctx: &Context, level: &Level, priority: u16) -> Result<PublicKeyHash> {
    owner(ctx, Purpose::Baking, level, u32::from(priority))
}

/// The delegate owning endorsement `slot` at `level`.
pub fn endorsement_rights_owner(ctx: &Context, level: &Level, slot: u16) -> Result<PublicKeyHash> {
    owner(ctx, Purpose::Endorsement, level, u32::from(slot))
}
