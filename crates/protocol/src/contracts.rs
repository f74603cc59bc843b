//! Accounts: implicit and originated contracts.
//!
//! Every account has a spendable balance and a counter; implicit accounts
//! additionally carry a manager-key state (hash until revealed, then the
//! key), originated accounts carry the spendable/delegatable flags and an
//! optional script. Balance changes route the stake delta to the account's
//! delegate through the roll registry, which is what keeps rolls and
//! balances consistent.

use crate::constants::Constants;
use crate::errors::{Error, Result};
use crate::rolls;
use serde::{Deserialize, Serialize};
use stele_context::Context;
use stele_crypto::{PublicKey, PublicKeyHash};
use stele_types::{ContractAddress, Script, Tez};
use tracing::debug;

fn row(addr: &ContractAddress, field: &str) -> String {
    format!("contracts/{}/{field}", addr.storage_key())
}

/// Manager-key state of an implicit account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerKey {
    /// Only the hash is known; the account cannot sign yet.
    Hash(PublicKeyHash),
    /// The key was revealed.
    Revealed(PublicKey),
}

/// Whether the account exists.
pub fn exists(ctx: &Context, addr: &ContractAddress) -> bool {
    ctx.mem(&row(addr, "balance"))
}

/// The spendable balance; zero for absent accounts.
pub fn balance(ctx: &Context, addr: &ContractAddress) -> Result<Tez> {
    Ok(ctx.get_opt(&row(addr, "balance"))?.unwrap_or(Tez::ZERO))
}

/// The current counter; zero for absent accounts.
pub fn counter(ctx: &Context, addr: &ContractAddress) -> Result<u64> {
    Ok(ctx.get_opt(&row(addr, "counter"))?.unwrap_or(0))
}

/// Checks a manager operation's counter against the stored one.
pub fn check_counter(ctx: &Context, addr: &ContractAddress, provided: u64) -> Result<()> {
    let expected = counter(ctx, addr)? + 1;
    if provided < expected {
        return Err(Error::CounterInThePast {
            contract: *addr,
            expected,
            found: provided,
        });
    }
    if provided > expected {
        return Err(Error::CounterInTheFuture {
            contract: *addr,
            expected,
            found: provided,
        });
    }
    Ok(())
}

/// Bumps the stored counter by one.
pub fn increment_counter(ctx: &mut Context, addr: &ContractAddress) -> Result<()> {
    let next = counter(ctx, addr)? + 1;
    ctx.set(&row(addr, "counter"), &next)?;
    Ok(())
}

/// The account's delegate, if any.
pub fn delegate_of(ctx: &Context, addr: &ContractAddress) -> Result<Option<PublicKeyHash>> {
    ctx.get_opt(&row(addr, "delegate")).map_err(Error::from)
}

/// The manager-key state of an implicit account.
pub fn manager_key(ctx: &Context, addr: &ContractAddress) -> Result<Option<ManagerKey>> {
    ctx.get_opt(&row(addr, "manager")).map_err(Error::from)
}

/// The revealed manager key, or the unrevealed-key error.
pub fn revealed_key(ctx: &Context, addr: &ContractAddress) -> Result<PublicKey> {
    match manager_key(ctx, addr)? {
        Some(ManagerKey::Revealed(key)) => Ok(key),
        _ => Err(Error::UnrevealedManagerKey { contract: *addr }),
    }
}

/// Records a revealed manager key.
///
/// Fails when the key was already revealed or does not hash to the
/// account's address.
pub fn reveal_key(ctx: &mut Context, addr: &ContractAddress, key: &PublicKey) -> Result<()> {
    match manager_key(ctx, addr)? {
        Some(ManagerKey::Revealed(_)) => Err(Error::MultipleRevelation { contract: *addr }),
        Some(ManagerKey::Hash(hash)) => {
            if key.hash() != hash {
                return Err(Error::InconsistentRevealHash { contract: *addr });
            }
            ctx.set(&row(addr, "manager"), &ManagerKey::Revealed(key.clone()))?;
            Ok(())
        }
        None => Err(Error::NonExistingContract { contract: *addr }),
    }
}

/// The script of an originated account, if any.
pub fn script(ctx: &Context, addr: &ContractAddress) -> Result<Option<Script>> {
    ctx.get_opt(&row(addr, "script")).map_err(Error::from)
}

/// Replaces the storage part of an account's script.
pub fn set_script_storage(ctx: &mut Context, addr: &ContractAddress, storage: Vec<u8>) -> Result<()> {
    let mut current = script(ctx, addr)?.ok_or(Error::UnexpectedParameters {
        destination: *addr,
    })?;
    current.storage = storage;
    ctx.set(&row(addr, "script"), &current)?;
    Ok(())
}

/// Applies one big-map write of a script execution.
pub fn write_big_map(
    ctx: &mut Context,
    addr: &ContractAddress,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<()> {
    let map_key = format!("contracts/{}/big_map/{}", addr.storage_key(), hex::encode(key));
    match value {
        Some(bytes) => ctx.set(&map_key, &bytes.to_vec())?,
        None => ctx.delete(&map_key),
    }
    Ok(())
}

/// Whether the account's funds are spendable by external manager
/// operations. Implicit accounts always are.
pub fn is_spendable(ctx: &Context, addr: &ContractAddress) -> Result<bool> {
    if addr.is_implicit() {
        return Ok(true);
    }
    Ok(ctx.get_opt(&row(addr, "spendable"))?.unwrap_or(false))
}

/// Whether the account's delegate may be changed.
pub fn is_delegatable(ctx: &Context, addr: &ContractAddress) -> Result<bool> {
    if addr.is_implicit() {
        return Ok(true);
    }
    Ok(ctx.get_opt(&row(addr, "delegatable"))?.unwrap_or(false))
}

/// Credits an account, allocating implicit accounts on first credit and
/// routing the stake to the account's delegate.
pub fn credit(
    ctx: &mut Context,
    constants: &Constants,
    addr: &ContractAddress,
    amount: Tez,
) -> Result<()> {
    if !exists(ctx, addr) {
        match addr {
            ContractAddress::Implicit(pkh) => {
                ctx.set(&row(addr, "balance"), &Tez::ZERO)?;
                ctx.set(&row(addr, "counter"), &0u64)?;
                ctx.set(&row(addr, "manager"), &ManagerKey::Hash(*pkh))?;
                debug!(contract = %addr, "implicit account allocated");
            }
            ContractAddress::Originated(_) => {
                return Err(Error::NonExistingContract { contract: *addr });
            }
        }
    }
    let new_balance = balance(ctx, addr)?.checked_add(amount)?;
    ctx.set(&row(addr, "balance"), &new_balance)?;
    if let Some(delegate) = delegate_of(ctx, addr)? {
        rolls::add_amount(ctx, constants, &delegate, amount)?;
    }
    Ok(())
}

/// Debits an account, routing the stake delta away from its delegate.
pub fn debit(
    ctx: &mut Context,
    constants: &Constants,
    addr: &ContractAddress,
    amount: Tez,
) -> Result<()> {
    if !exists(ctx, addr) {
        return Err(Error::NonExistingContract { contract: *addr });
    }
    let current = balance(ctx, addr)?;
    if amount > current {
        return Err(Error::BalanceTooLow {
            contract: *addr,
            balance: current,
            amount,
        });
    }
    let new_balance = current.checked_sub(amount)?;
    ctx.set(&row(addr, "balance"), &new_balance)?;
    if let Some(delegate) = delegate_of(ctx, addr)? {
        rolls::remove_amount(ctx, constants, &delegate, amount)?;
    }
    Ok(())
}

/// Writes a freshly originated account.
///
/// The caller credits the initial balance afterwards so the stake routes
/// through the delegate like any other credit.
pub fn originate(
    ctx: &mut Context,
    addr: &ContractAddress,
    manager: PublicKeyHash,
    delegate: Option<PublicKeyHash>,
    script_value: Option<&Script>,
    spendable: bool,
    delegatable: bool,
) -> Result<()> {
    ctx.set(&row(addr, "balance"), &Tez::ZERO)?;
    ctx.set(&row(addr, "counter"), &0u64)?;
    ctx.set(&row(addr, "manager"), &ManagerKey::Hash(manager))?;
    ctx.set(&row(addr, "spendable"), &spendable)?;
    ctx.set(&row(addr, "delegatable"), &delegatable)?;
    if let Some(delegate) = delegate {
        ctx.set(&row(addr, "delegate"), &delegate)?;
    }
    if let Some(script) = script_value {
        ctx.set(&row(addr, "script"), script)?;
    }
    debug!(contract = %addr, "account originated");
    Ok(())
}

/// Changes the delegate of an account, moving its whole balance's stake
/// between the old and new delegates.
pub fn set_delegate(
    ctx: &mut Context,
    constants: &Constants,
    addr: &ContractAddress,
    new_delegate: Option<PublicKeyHash>,
) -> Result<()> {
    if !exists(ctx, addr) {
        return Err(Error::NonExistingContract { contract: *addr });
    }
    let old = delegate_of(ctx, addr)?;
    if old == new_delegate {
        return Ok(());
    }
    if !is_delegatable(ctx, addr)? {
        return Err(Error::NonDelegatableContract { contract: *addr });
    }

    let stake = balance(ctx, addr)?;
    if let Some(old) = old {
        rolls::remove_amount(ctx, constants, &old, stake)?;
    }
    match new_delegate {
        Some(delegate) => {
            ctx.set(&row(addr, "delegate"), &delegate)?;
            rolls::add_amount(ctx, constants, &delegate, stake)?;
        }
        None => ctx.delete(&row(addr, "delegate")),
    }
    debug!(contract = %addr, "delegate changed");
    Ok(())
}
