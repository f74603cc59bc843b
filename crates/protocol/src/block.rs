//! Block lifecycle: begin, apply operations, finalize.
//!
//! `begin_application` validates a received header (proof-of-work stamp,
//! fitness progression, baker rights, signature, commitment expectation)
//! and opens a [`BlockState`]; `begin_construction` opens one for baking.
//! Operations then apply one at a time, and `finalize_application` settles
//! the block: deposits and rewards freeze, the nonce commitment is
//! recorded, rolls snapshot on schedule, and the last block of a cycle
//! runs the cycle-end sequence.
//!
//! Nothing here writes to the backing store; the caller commits the
//! context (or drops it on cancellation) once finalization succeeds.

use crate::constants::Constants;
use crate::contracts;
use crate::delegates;
use crate::errors::{Error, Result};
use crate::rights;
use crate::rolls;
use crate::seeds::{self, NonceState};
use crate::votes;
use stele_context::Context;
use stele_crypto::PublicKeyHash;
use stele_types::{BlockHash, BlockHeader, ContractAddress, Level, NonceHash, Tez};
use tracing::{debug, info};

/// Mutable state carried across the operations of one block.
#[derive(Debug, Clone)]
pub struct BlockState {
    /// The level being applied.
    pub level: Level,
    /// Hash of the predecessor block.
    pub predecessor: BlockHash,
    /// The baker holding the block's priority right.
    pub baker: PublicKeyHash,
    /// The block's priority.
    pub priority: u16,
    /// Fitness accumulated so far (base plus endorsement slots).
    pub fitness: u64,
    /// Manager fees accumulated by precheck.
    pub block_fees: Tez,
    /// The header's seed-nonce commitment, if any.
    pub seed_nonce_hash: Option<NonceHash>,
}

/// Validates a received block header and opens its application.
pub fn begin_application(
    ctx: &Context,
    constants: &Constants,
    header: &BlockHeader,
    predecessor_fitness: u64,
) -> Result<BlockState> {
    let stamp = header.pow_stamp();
    if stamp > constants.proof_of_work_threshold {
        return Err(Error::InvalidProofOfWorkNonce {
            stamp,
            threshold: constants.proof_of_work_threshold,
        });
    }

    if header.shell.fitness <= predecessor_fitness {
        return Err(Error::InvalidFitness {
            predecessor: predecessor_fitness,
            provided: header.shell.fitness,
        });
    }

    let level = constants.level(header.shell.level);
    let priority = header.protocol_data.priority;
    let baker = rights::baking_rights_owner(ctx, &level, priority)?;

    let key = contracts::revealed_key(ctx, &ContractAddress::implicit(baker))?;
    if !header.verify_signature(&key) {
        return Err(Error::InvalidBlockSignature { baker });
    }

    if header.protocol_data.seed_nonce_hash.is_some() != level.expected_commitment {
        return Err(Error::InvalidCommitment {
            expected: level.expected_commitment,
        });
    }

    debug!(level = level.level, baker = %baker, priority, "block application started");
    Ok(BlockState {
        level,
        predecessor: header.shell.predecessor,
        baker,
        priority,
        fitness: predecessor_fitness + 1,
        block_fees: Tez::ZERO,
        seed_nonce_hash: header.protocol_data.seed_nonce_hash,
    })
}

/// Opens a block being constructed by a baker; no header to verify yet.
#[allow(clippy::too_many_arguments)]
pub fn begin_construction(
    ctx: &Context,
    constants: &Constants,
    raw_level: u32,
    predecessor: BlockHash,
    predecessor_fitness: u64,
    priority: u16,
    seed_nonce_hash: Option<NonceHash>,
) -> Result<BlockState> {
    let level = constants.level(raw_level);
    let baker = rights::baking_rights_owner(ctx, &level, priority)?;
    Ok(BlockState {
        level,
        predecessor,
        baker,
        priority,
        fitness: predecessor_fitness + 1,
        block_fees: Tez::ZERO,
        seed_nonce_hash,
    })
}

/// Settles the block and runs cycle-boundary bookkeeping.
///
/// `announced_fitness` is the header's fitness in application mode, `None`
/// during construction.
pub fn finalize_application(
    ctx: &mut Context,
    constants: &Constants,
    state: &BlockState,
    announced_fitness: Option<u64>,
) -> Result<()> {
    if let Some(announced) = announced_fitness {
        if announced != state.fitness {
            return Err(Error::WrongFitness {
                expected: state.fitness,
                announced,
            });
        }
    }

    let cycle = state.level.cycle;
    let baker_contract = ContractAddress::implicit(state.baker);

    // Baker deposit and reward freeze.
    contracts::debit(ctx, constants, &baker_contract, constants.block_security_deposit)?;
    delegates::credit_deposits(ctx, &state.baker, cycle, constants.block_security_deposit)?;
    delegates::credit_rewards(ctx, &state.baker, cycle, constants.block_reward)?;
    delegates::credit_fees(ctx, &state.baker, cycle, state.block_fees)?;
    rolls::set_active(ctx, constants, &state.baker, cycle)?;

    // Record the nonce commitment for later revelation.
    if let Some(hash) = state.seed_nonce_hash {
        seeds::record_commitment(
            ctx,
            &state.level,
            &NonceState::Unrevealed {
                hash,
                delegate: state.baker,
                fees: state.block_fees,
                rewards: constants.block_reward,
            },
        )?;
    }

    ctx.set("chain/last_block_priority", &state.priority)?;

    // Per-block scratch state.
    ctx.delete_prefix("chain/endorsed_slots/");
    ctx.delete_prefix("chain/internal_nonces/");

    // Scheduled roll snapshot for the cycle rights will later be drawn on.
    let snapshot_interval = constants.layout.blocks_per_roll_snapshot;
    if state.level.cycle_position % snapshot_interval == snapshot_interval - 1 {
        rolls::snapshot_rolls_for_cycle(ctx, cycle.add(constants.preserved_cycles + 2))?;
    }

    if state.level.last_of_cycle(&constants.layout) {
        end_cycle(ctx, constants, state)?;
    }

    if state.level.last_of_voting_period(&constants.layout) {
        votes::period_end(ctx)?;
    }

    debug!(
        level = state.level.level,
        fitness = state.fitness,
        fees = %state.block_fees,
        "block finalized"
    );
    Ok(())
}

/// The dawn-of-a-new-cycle sequence.
fn end_cycle(ctx: &mut Context, constants: &Constants, state: &BlockState) -> Result<()> {
    let ended = state.level.cycle;
    info!(cycle = ended.0, "cycle ended");

    // Unrevealed-nonce forfeiture, nonce clearing, next seed.
    seeds::cycle_end(ctx, constants, ended)?;

    // Roll bookkeeping: prune the expired cycle, freeze the upcoming one,
    // open the farthest one.
    if let Some(expired) = ended.checked_sub(constants.preserved_cycles) {
        rolls::clear_cycle(ctx, expired)?;
    }
    rolls::freeze_rolls_for_cycle(ctx, constants, ended.add(constants.preserved_cycles + 1))?;
    rolls::init_cycle(ctx, ended.add(constants.preserved_cycles + 3))?;

    // Unfreeze matured balances and deactivate lapsed delegates.
    delegates::cycle_end(ctx, constants, ended)?;
    Ok(())
}
