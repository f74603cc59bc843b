//! The roll registry.
//!
//! Rolls are the staking units. Each delegate owns a linked list of rolls
//! (`delegate_head` plus the shared `successor` map); freed rolls go to the
//! `limbo` freelist and keep their ids; residual stake below one roll sits
//! in the delegate's `change` accumulator. Each cycle gets numbered
//! ownership snapshots, one of which is frozen for rights selection.
//!
//! Everything lives in the context:
//!
//! ```text
//! rolls/next                              next unallocated roll id
//! rolls/limbo                             head of the freelist
//! rolls/owner/<roll>                      owning delegate
//! rolls/successor/<roll>                  next roll in its list
//! rolls/delegate_head/<pkh>               head of a delegate's list
//! rolls/change/<pkh>                      residual stake below one roll
//! rolls/snapshot_index/<cycle>            next (then frozen) snapshot index
//! rolls/last_for_snapshot/<cycle>/<idx>   next_roll bound at snapshot time
//! ```

use crate::constants::Constants;
use crate::errors::{Error, Result};
use crate::seeds;
use stele_context::Context;
use stele_crypto::{PublicKeyHash, Sequence};
use stele_types::{Cycle, Roll, Tez};
use tracing::{debug, info};

/// Sequence tag for drawing the frozen snapshot index.
const ROLL_SNAPSHOT_TAG: &[u8] = b"roll_snapshot";

fn pkh_key(pkh: &PublicKeyHash) -> String {
    hex::encode(pkh.as_bytes())
}

fn owner_key(roll: Roll) -> String {
    format!("rolls/owner/{}", roll.index())
}

fn successor_key(roll: Roll) -> String {
    format!("rolls/successor/{}", roll.index())
}

fn head_key(pkh: &PublicKeyHash) -> String {
    format!("rolls/delegate_head/{}", pkh_key(pkh))
}

fn change_key(pkh: &PublicKeyHash) -> String {
    format!("rolls/change/{}", pkh_key(pkh))
}

fn inactive_key(pkh: &PublicKeyHash) -> String {
    format!("delegates/inactive/{}", pkh_key(pkh))
}

fn deactivation_key(pkh: &PublicKeyHash) -> String {
    format!("delegates/deactivation/{}", pkh_key(pkh))
}

fn snapshot_index_key(cycle: Cycle) -> String {
    format!("rolls/snapshot_index/{}", cycle.0)
}

fn last_for_snapshot_key(cycle: Cycle, index: u32) -> String {
    format!("rolls/last_for_snapshot/{}/{index}", cycle.0)
}

/// Initializes the registry at genesis.
pub fn init(ctx: &mut Context) -> Result<()> {
    ctx.set("rolls/next", &Roll::FIRST)?;
    Ok(())
}

/// The smallest unallocated roll id.
pub fn next_roll(ctx: &Context) -> Result<Roll> {
    ctx.get("rolls/next").map_err(Error::from)
}

/// The delegate owning `roll`, if any.
pub fn owner_of(ctx: &Context, roll: Roll) -> Result<Option<PublicKeyHash>> {
    ctx.get_opt(&owner_key(roll)).map_err(Error::from)
}

/// The residual sub-roll stake of a delegate.
pub fn change_of(ctx: &Context, delegate: &PublicKeyHash) -> Result<Tez> {
    Ok(ctx.get_opt(&change_key(delegate))?.unwrap_or(Tez::ZERO))
}

/// Whether the delegate is marked inactive.
pub fn is_inactive(ctx: &Context, delegate: &PublicKeyHash) -> Result<bool> {
    Ok(ctx.mem(&inactive_key(delegate)))
}

/// The cycle at whose end the delegate will be deactivated.
pub fn deactivation_cycle(ctx: &Context, delegate: &PublicKeyHash) -> Result<Option<Cycle>> {
    ctx.get_opt(&deactivation_key(delegate)).map_err(Error::from)
}

/// The rolls currently owned by a delegate, head first.
pub fn delegate_rolls(ctx: &Context, delegate: &PublicKeyHash) -> Result<Vec<Roll>> {
    let mut rolls = Vec::new();
    let mut cursor: Option<Roll> = ctx.get_opt(&head_key(delegate))?;
    while let Some(roll) = cursor {
        rolls.push(roll);
        cursor = ctx.get_opt(&successor_key(roll))?;
    }
    Ok(rolls)
}

/// The number of rolls owned by a delegate.
pub fn count_rolls(ctx: &Context, delegate: &PublicKeyHash) -> Result<u64> {
    Ok(delegate_rolls(ctx, delegate)?.len() as u64)
}

/// The limbo freelist, head first. Mostly for suites and invariant checks.
pub fn limbo_rolls(ctx: &Context) -> Result<Vec<Roll>> {
    let mut rolls = Vec::new();
    let mut cursor: Option<Roll> = ctx.get_opt("rolls/limbo")?;
    while let Some(roll) = cursor {
        rolls.push(roll);
        cursor = ctx.get_opt(&successor_key(roll))?;
    }
    Ok(rolls)
}

/// Pops a roll from limbo, or allocates a fresh id.
fn pop_limbo_or_fresh(ctx: &mut Context) -> Result<Roll> {
    match ctx.get_opt::<Roll>("rolls/limbo")? {
        Some(head) => {
            match ctx.get_opt::<Roll>(&successor_key(head))? {
                Some(next) => ctx.set("rolls/limbo", &next)?,
                None => ctx.delete("rolls/limbo"),
            }
            ctx.delete(&successor_key(head));
            Ok(head)
        }
        None => {
            let fresh = next_roll(ctx)?;
            ctx.set("rolls/next", &fresh.succ())?;
            Ok(fresh)
        }
    }
}

/// Pushes a roll onto the limbo freelist.
fn push_limbo(ctx: &mut Context, roll: Roll) -> Result<()> {
    match ctx.get_opt::<Roll>("rolls/limbo")? {
        Some(head) => ctx.set(&successor_key(roll), &head)?,
        None => ctx.delete(&successor_key(roll)),
    }
    ctx.set("rolls/limbo", &roll)?;
    ctx.delete(&owner_key(roll));
    Ok(())
}

/// Prepends a roll to a delegate's list and records ownership.
fn push_delegate(ctx: &mut Context, delegate: &PublicKeyHash, roll: Roll) -> Result<()> {
    match ctx.get_opt::<Roll>(&head_key(delegate))? {
        Some(head) => ctx.set(&successor_key(roll), &head)?,
        None => ctx.delete(&successor_key(roll)),
    }
    ctx.set(&head_key(delegate), &roll)?;
    ctx.set(&owner_key(roll), delegate)?;
    Ok(())
}

/// Pops the head roll of a delegate's list, if any.
fn pop_delegate(ctx: &mut Context, delegate: &PublicKeyHash) -> Result<Option<Roll>> {
    let head = match ctx.get_opt::<Roll>(&head_key(delegate))? {
        Some(head) => head,
        None => return Ok(None),
    };
    match ctx.get_opt::<Roll>(&successor_key(head))? {
        Some(next) => ctx.set(&head_key(delegate), &next)?,
        None => ctx.delete(&head_key(delegate)),
    }
    ctx.delete(&successor_key(head));
    Ok(Some(head))
}

/// Converts accumulated change into rolls while it covers whole rolls.
fn mint_rolls_from_change(
    ctx: &mut Context,
    constants: &Constants,
    delegate: &PublicKeyHash,
    mut change: Tez,
) -> Result<Tez> {
    while change >= constants.tokens_per_roll {
        let roll = pop_limbo_or_fresh(ctx)?;
        push_delegate(ctx, delegate, roll)?;
        change = change.checked_sub(constants.tokens_per_roll)?;
    }
    Ok(change)
}

/// Credits `amount` of stake to a delegate, minting rolls as the change
/// crosses the roll threshold. Inactive delegates accumulate change only.
pub fn add_amount(
    ctx: &mut Context,
    constants: &Constants,
    delegate: &PublicKeyHash,
    amount: Tez,
) -> Result<()> {
    let mut change = change_of(ctx, delegate)?.checked_add(amount)?;
    if !is_inactive(ctx, delegate)? {
        change = mint_rolls_from_change(ctx, constants, delegate, change)?;
    }
    ctx.set(&change_key(delegate), &change)?;
    Ok(())
}

/// Removes `amount` of stake from a delegate, breaking rolls back into
/// change as needed. The delegate row is deleted when fully drained.
pub fn remove_amount(
    ctx: &mut Context,
    constants: &Constants,
    delegate: &PublicKeyHash,
    amount: Tez,
) -> Result<()> {
    let active = !is_inactive(ctx, delegate)?;
    let mut change = change_of(ctx, delegate)?;
    if active {
        while amount > change {
            match pop_delegate(ctx, delegate)? {
                Some(roll) => {
                    push_limbo(ctx, roll)?;
                    change = change.checked_add(constants.tokens_per_roll)?;
                }
                None => break,
            }
        }
    }
    let change = change.checked_sub(amount)?;

    let drained = active
        && change.is_zero()
        && ctx.get_opt::<Roll>(&head_key(delegate))?.is_none();
    if drained {
        ctx.delete(&change_key(delegate));
    } else {
        ctx.set(&change_key(delegate), &change)?;
    }
    Ok(())
}

/// Marks a delegate inactive, draining all its rolls into limbo.
pub fn set_inactive(
    ctx: &mut Context,
    constants: &Constants,
    delegate: &PublicKeyHash,
) -> Result<()> {
    let mut change = change_of(ctx, delegate)?;
    let mut drained = 0u32;
    while let Some(roll) = pop_delegate(ctx, delegate)? {
        push_limbo(ctx, roll)?;
        change = change.checked_add(constants.tokens_per_roll)?;
        drained += 1;
    }
    ctx.set(&inactive_key(delegate), &true)?;
    ctx.set(&change_key(delegate), &change)?;
    info!(delegate = %delegate, drained, "delegate deactivated");
    Ok(())
}

/// Marks a delegate active and extends its deactivation grace cycle.
///
/// Reactivation re-mints rolls out of the accumulated change. Touching an
/// already active delegate only pushes the grace cycle forward.
pub fn set_active(
    ctx: &mut Context,
    constants: &Constants,
    delegate: &PublicKeyHash,
    current_cycle: Cycle,
) -> Result<()> {
    let was_inactive = is_inactive(ctx, delegate)?;
    let grace = current_cycle.add(1 + constants.preserved_cycles);

    if was_inactive {
        ctx.delete(&inactive_key(delegate));
        let change = change_of(ctx, delegate)?;
        let change = mint_rolls_from_change(ctx, constants, delegate, change)?;
        ctx.set(&change_key(delegate), &change)?;
        ctx.set(&deactivation_key(delegate), &grace)?;
        info!(delegate = %delegate, grace = grace.0, "delegate reactivated");
    } else {
        let extended = match deactivation_cycle(ctx, delegate)? {
            Some(existing) if existing >= grace => existing,
            _ => grace,
        };
        ctx.set(&deactivation_key(delegate), &extended)?;
    }
    Ok(())
}

/// Creates the empty snapshot row for a cycle.
pub fn init_cycle(ctx: &mut Context, cycle: Cycle) -> Result<()> {
    ctx.set(&snapshot_index_key(cycle), &0u32)?;
    Ok(())
}

/// The snapshot index of a cycle: the next free index before freezing, the
/// surviving index after.
pub fn snapshot_index(ctx: &Context, cycle: Cycle) -> Result<u32> {
    ctx.get_opt(&snapshot_index_key(cycle))?
        .ok_or(Error::NoRollSnapshotForCycle { cycle })
}

/// The `next_roll` bound recorded with snapshot `(cycle, index)`.
pub fn last_for_snapshot(ctx: &Context, cycle: Cycle, index: u32) -> Result<Roll> {
    ctx.get_opt(&last_for_snapshot_key(cycle, index))?
        .ok_or(Error::NoRollSnapshotForCycle { cycle })
}

/// Takes an ownership snapshot for `cycle` at the next free index.
pub fn snapshot_rolls_for_cycle(ctx: &mut Context, cycle: Cycle) -> Result<()> {
    let index = snapshot_index(ctx, cycle)?;
    ctx.snapshot("rolls/owner", (cycle.0, index))?;
    let bound = next_roll(ctx)?;
    ctx.set(&last_for_snapshot_key(cycle, index), &bound)?;
    ctx.set(&snapshot_index_key(cycle), &(index + 1))?;
    debug!(cycle = cycle.0, index, bound = bound.index(), "roll snapshot taken");
    Ok(())
}

/// Freezes one snapshot of `cycle`, drawn with the cycle seed, and deletes
/// the others. After this call `snapshot_index` names the kept index.
pub fn freeze_rolls_for_cycle(
    ctx: &mut Context,
    constants: &Constants,
    cycle: Cycle,
) -> Result<()> {
    let max_index = snapshot_index(ctx, cycle)?;
    if max_index == 0 {
        return Err(Error::NoRollSnapshotForCycle { cycle });
    }
    let seed = seeds::for_cycle(ctx, cycle)?;
    let mut sequence = Sequence::init(&seed, &[ROLL_SNAPSHOT_TAG]);
    let kept = sequence.take_u32(max_index);

    for index in 0..max_index {
        if index != kept {
            ctx.delete_snapshot((cycle.0, index));
            ctx.delete(&last_for_snapshot_key(cycle, index));
        }
    }
    ctx.set(&snapshot_index_key(cycle), &kept)?;
    info!(cycle = cycle.0, kept, of = max_index, "roll snapshot frozen");
    Ok(())
}

/// Deletes the surviving snapshot and bookkeeping of an expired cycle.
pub fn clear_cycle(ctx: &mut Context, cycle: Cycle) -> Result<()> {
    let index = snapshot_index(ctx, cycle)?;
    ctx.delete_snapshot((cycle.0, index));
    ctx.delete(&last_for_snapshot_key(cycle, index));
    ctx.delete(&snapshot_index_key(cycle));
    debug!(cycle = cycle.0, "roll snapshots cleared");
    Ok(())
}

/// Reads a roll's owner out of the frozen snapshot of a cycle.
pub fn snapshot_owner(
    ctx: &Context,
    cycle: Cycle,
    index: u32,
    roll: Roll,
) -> Result<Option<PublicKeyHash>> {
    ctx.read_snapshot_opt(
        (cycle.0, index),
        &roll.index().to_string(),
    )
    .map_err(Error::from)
}
