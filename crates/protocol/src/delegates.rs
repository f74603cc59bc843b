//! Delegate registration, frozen balances and activity.
//!
//! A delegate is an implicit account that registered by self-delegation.
//! Its escrowed funds live in per-cycle frozen buckets — deposits, fees,
//! rewards — so slashing and unfreezing can target a cycle. Activity is
//! tracked by the roll registry's inactive flag and grace cycle; this
//! module runs the cycle-end sweep.

use crate::constants::Constants;
use crate::contracts;
use crate::errors::{Error, Result};
use crate::rolls;
use serde::{Deserialize, Serialize};
use stele_context::Context;
use stele_crypto::PublicKeyHash;
use stele_types::{ContractAddress, Cycle, Tez};
use tracing::{debug, info};

fn registered_key(pkh: &PublicKeyHash) -> String {
    format!("delegates/registered/{}", hex::encode(pkh.as_bytes()))
}

fn frozen_key(pkh: &PublicKeyHash, cycle: Cycle, bucket: &str) -> String {
    format!(
        "delegates/frozen/{}/{}/{bucket}",
        hex::encode(pkh.as_bytes()),
        cycle.0
    )
}

/// The three frozen buckets of a delegate at one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrozenBalance {
    /// Security deposits.
    pub deposits: Tez,
    /// Escrowed fees.
    pub fees: Tez,
    /// Escrowed rewards.
    pub rewards: Tez,
}

impl FrozenBalance {
    /// Sum of the three buckets.
    pub fn total(&self) -> Result<Tez> {
        Ok(self
            .deposits
            .checked_add(self.fees)?
            .checked_add(self.rewards)?)
    }
}

/// Registers an implicit account as a delegate and activates it.
pub fn register(
    ctx: &mut Context,
    constants: &Constants,
    pkh: &PublicKeyHash,
    current_cycle: Cycle,
) -> Result<()> {
    ctx.set(&registered_key(pkh), &())?;
    rolls::set_active(ctx, constants, pkh, current_cycle)?;
    info!(delegate = %pkh, "delegate registered");
    Ok(())
}

/// Whether `pkh` is a registered delegate.
pub fn registered(ctx: &Context, pkh: &PublicKeyHash) -> bool {
    ctx.mem(&registered_key(pkh))
}

/// Every registered delegate.
pub fn all(ctx: &Context) -> Result<Vec<PublicKeyHash>> {
    let mut delegates = Vec::new();
    for key in ctx.keys_with_prefix("delegates/registered/") {
        let hex_part = key.rsplit('/').next().unwrap_or_default();
        let bytes = hex::decode(hex_part).map_err(|_| {
            Error::Context(stele_context::ContextError::Storage(key.clone()))
        })?;
        if let Ok(pkh) = PublicKeyHash::from_slice(&bytes) {
            delegates.push(pkh);
        }
    }
    Ok(delegates)
}

fn credit_bucket(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
    bucket: &str,
    amount: Tez,
) -> Result<()> {
    let key = frozen_key(pkh, cycle, bucket);
    let current: Tez = ctx.get_opt(&key)?.unwrap_or(Tez::ZERO);
    ctx.set(&key, &current.checked_add(amount)?)?;
    Ok(())
}

fn debit_bucket(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
    bucket: &str,
    amount: Tez,
) -> Result<()> {
    let key = frozen_key(pkh, cycle, bucket);
    let current: Tez = ctx.get_opt(&key)?.unwrap_or(Tez::ZERO);
    // Forfeiture never takes more than is actually frozen.
    let taken = if amount > current { current } else { amount };
    let rest = current.checked_sub(taken)?;
    if rest.is_zero() {
        ctx.delete(&key);
    } else {
        ctx.set(&key, &rest)?;
    }
    Ok(())
}

/// Credits frozen deposits for a cycle.
pub fn credit_deposits(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
    amount: Tez,
) -> Result<()> {
    credit_bucket(ctx, pkh, cycle, "deposits", amount)
}

/// Credits frozen fees for a cycle.
pub fn credit_fees(ctx: &mut Context, pkh: &PublicKeyHash, cycle: Cycle, amount: Tez) -> Result<()> {
    credit_bucket(ctx, pkh, cycle, "fees", amount)
}

/// Credits frozen rewards for a cycle.
pub fn credit_rewards(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
    amount: Tez,
) -> Result<()> {
    credit_bucket(ctx, pkh, cycle, "rewards", amount)
}

/// The frozen balance of a delegate at a cycle.
pub fn frozen_balance(ctx: &Context, pkh: &PublicKeyHash, cycle: Cycle) -> Result<FrozenBalance> {
    Ok(FrozenBalance {
        deposits: ctx
            .get_opt(&frozen_key(pkh, cycle, "deposits"))?
            .unwrap_or(Tez::ZERO),
        fees: ctx
            .get_opt(&frozen_key(pkh, cycle, "fees"))?
            .unwrap_or(Tez::ZERO),
        rewards: ctx
            .get_opt(&frozen_key(pkh, cycle, "rewards"))?
            .unwrap_or(Tez::ZERO),
    })
}

/// Whether the delegate has anything frozen at `cycle`.
pub fn has_frozen_balance(ctx: &Context, pkh: &PublicKeyHash, cycle: Cycle) -> Result<bool> {
    Ok(!frozen_balance(ctx, pkh, cycle)?.total()?.is_zero())
}

/// Removes and returns the whole frozen balance of a delegate at `cycle`.
///
/// This is the slashing primitive: the caller decides where the proceeds
/// go (half to the accuser, the rest burned).
pub fn forfeit_frozen(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
) -> Result<FrozenBalance> {
    let frozen = frozen_balance(ctx, pkh, cycle)?;
    ctx.delete(&frozen_key(pkh, cycle, "deposits"));
    ctx.delete(&frozen_key(pkh, cycle, "fees"));
    ctx.delete(&frozen_key(pkh, cycle, "rewards"));
    info!(
        delegate = %pkh,
        cycle = cycle.0,
        total = %frozen.total().unwrap_or(Tez::ZERO),
        "frozen balance forfeited"
    );
    Ok(frozen)
}

/// Forfeits part of the frozen fees and rewards (unrevealed-nonce penalty).
pub fn forfeit_fees_and_rewards(
    ctx: &mut Context,
    pkh: &PublicKeyHash,
    cycle: Cycle,
    fees: Tez,
    rewards: Tez,
) -> Result<()> {
    debit_bucket(ctx, pkh, cycle, "fees", fees)?;
    debit_bucket(ctx, pkh, cycle, "rewards", rewards)?;
    debug!(delegate = %pkh, cycle = cycle.0, "unrevealed nonce penalty applied");
    Ok(())
}

/// Returns the frozen balance of `cycle` to the delegate's spendable
/// balance, routing the stake back through the roll registry.
pub fn unfreeze(
    ctx: &mut Context,
    constants: &Constants,
    pkh: &PublicKeyHash,
    cycle: Cycle,
) -> Result<()> {
    let frozen = forfeit_frozen(ctx, pkh, cycle)?;
    let total = frozen.total()?;
    if !total.is_zero() {
        contracts::credit(ctx, constants, &ContractAddress::implicit(*pkh), total)?;
        debug!(delegate = %pkh, cycle = cycle.0, amount = %total, "frozen balance unfrozen");
    }
    Ok(())
}

/// Cycle-end sweep for delegates.
///
/// Unfreezes the buckets of the cycle leaving the preservation window and
/// deactivates every delegate whose grace cycle has passed.
pub fn cycle_end(ctx: &mut Context, constants: &Constants, ended: Cycle) -> Result<()> {
    let delegates = all(ctx)?;

    if let Some(unfrozen_cycle) = ended.checked_sub(constants.preserved_cycles) {
        for delegate in &delegates {
            unfreeze(ctx, constants, delegate, unfrozen_cycle)?;
        }
    }

    for delegate in &delegates {
        if rolls::is_inactive(ctx, delegate)? {
            continue;
        }
        match rolls::deactivation_cycle(ctx, delegate)? {
            Some(grace) if grace > ended.succ() => {}
            _ => rolls::set_inactive(ctx, constants, delegate)?,
        }
    }
    Ok(())
}
