//! Cycle seeds and seed-nonce commitments.
//!
//! Every cycle has a 32-byte seed driving its rights selection. Genesis
//! writes deterministic seeds for the first `preserved_cycles + 2` cycles;
//! from then on, the end of cycle `c` folds the nonces revealed during `c`
//! into the seed of cycle `c + preserved_cycles + 2` to produce the seed of
//! cycle `c + preserved_cycles + 3`, and prunes the seed of the cycle
//! falling out of the retention window.
//!
//! Commitments: a block on a commitment level carries a nonce hash; the
//! baker reveals the nonce during the next cycle. Nonces still unrevealed
//! at cycle end forfeit the fees and rewards the block had frozen.

use crate::constants::Constants;
use crate::delegates;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use stele_context::Context;
use stele_crypto::{PublicKeyHash, Seed};
use stele_types::{Cycle, Level, NonceHash, SeedNonce, Tez};
use tracing::{debug, info};

fn seed_key(cycle: Cycle) -> String {
    format!("seeds/for_cycle/{}", cycle.0)
}

fn nonce_key(level: u32) -> String {
    // Zero-padded so prefix iteration yields level order.
    format!("nonces/{level:010}")
}

/// State of the nonce committed at a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonceState {
    /// Committed, not yet revealed.
    Unrevealed {
        /// The committed hash.
        hash: NonceHash,
        /// The baker who committed it.
        delegate: PublicKeyHash,
        /// Fees frozen by the committing block.
        fees: Tez,
        /// Rewards frozen by the committing block.
        rewards: Tez,
    },
    /// Revealed.
    Revealed(SeedNonce),
}

/// The seed of a cycle.
pub fn for_cycle(ctx: &Context, cycle: Cycle) -> Result<Seed> {
    ctx.get_opt(&seed_key(cycle))?
        .ok_or(Error::UnknownSeed { cycle })
}

/// Writes the deterministic genesis seeds for cycles
/// `0 ..= preserved_cycles + 2`.
pub fn init_genesis(ctx: &mut Context, constants: &Constants) -> Result<()> {
    for c in 0..=constants.preserved_cycles + 2 {
        ctx.set(&seed_key(Cycle(c)), &Seed::initial(c))?;
    }
    Ok(())
}

/// Records the commitment carried by a block at `level`.
pub fn record_commitment(ctx: &mut Context, level: &Level, state: &NonceState) -> Result<()> {
    ctx.set(&nonce_key(level.level), state)?;
    Ok(())
}

/// Applies a seed-nonce revelation: checks the nonce against the recorded
/// commitment and marks it revealed. Returns the committing delegate.
pub fn reveal(ctx: &mut Context, level: u32, nonce: &SeedNonce) -> Result<PublicKeyHash> {
    let state: NonceState = ctx
        .get_opt(&nonce_key(level))?
        .ok_or(Error::InvalidNonceRevelation { level })?;
    match state {
        NonceState::Revealed(_) => Err(Error::PreviouslyRevealedNonce { level }),
        NonceState::Unrevealed { hash, delegate, .. } => {
            if nonce.hash() != hash {
                return Err(Error::InvalidNonceRevelation { level });
            }
            ctx.set(&nonce_key(level), &NonceState::Revealed(*nonce))?;
            debug!(level, delegate = %delegate, "seed nonce revealed");
            Ok(delegate)
        }
    }
}

/// Ends a cycle for the seed subsystem.
///
/// Nonces committed during cycle `c` stay revealable through cycle
/// `c + 1`; so the end of `ended` settles the commitments of the cycle
/// before it. Revealed nonces fold, in level order, into a sub-seed of
/// `ended + preserved + 2` to produce the seed of `ended + preserved + 3`;
/// still-unrevealed commitments forfeit the fees and rewards their block
/// froze; every settled nonce row is cleared, and the seed falling out of
/// the retention window is pruned.
pub fn cycle_end(ctx: &mut Context, constants: &Constants, ended: Cycle) -> Result<()> {
    let mut accumulator = for_cycle(ctx, ended.add(constants.preserved_cycles + 2))?
        .nonce(b"cycle seed");
    let mut revealed = 0u32;
    let mut forfeited = 0u32;

    if let Some(settled) = ended.checked_sub(1) {
        let first = constants.first_level_of_cycle(settled);
        let last = first + constants.layout.blocks_per_cycle - 1;

        for key in ctx.keys_with_prefix("nonces/") {
            let level: u32 = match key.rsplit('/').next().and_then(|s| s.parse().ok()) {
                Some(level) => level,
                None => continue,
            };
            if level < first || level > last {
                continue;
            }
            let state: NonceState = ctx.get(&key)?;
            match state {
                NonceState::Revealed(nonce) => {
                    accumulator = accumulator.update(&nonce.0);
                    revealed += 1;
                }
                NonceState::Unrevealed {
                    delegate,
                    fees,
                    rewards,
                    ..
                } => {
                    delegates::forfeit_fees_and_rewards(ctx, &delegate, settled, fees, rewards)?;
                    forfeited += 1;
                }
            }
            ctx.delete(&key);
        }
    }

    let produced = ended.add(constants.preserved_cycles + 3);
    ctx.set(&seed_key(produced), &accumulator)?;

    if let Some(expired) = ended.checked_sub(constants.preserved_cycles) {
        ctx.delete(&seed_key(expired));
    }

    info!(
        cycle = ended.0,
        revealed,
        forfeited,
        produced = produced.0,
        "cycle seeds advanced"
    );
    Ok(())
}
