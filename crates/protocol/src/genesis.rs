//! Genesis bootstrap: preparing the context for the first block.
//!
//! Writes everything the first cycles need before any block applies:
//! deterministic seeds, the roll registry, frozen-and-snapshotted rights
//! state for the cycles whose freeze boundary lies before the first
//! cycle end, bootstrap delegates with revealed keys and self-delegated
//! stake, the activation commitment table, and the voting tables.

use crate::constants::Constants;
use crate::contracts::{self, ManagerKey};
use crate::delegates;
use crate::errors::Result;
use crate::rolls;
use crate::seeds;
use crate::votes;
use stele_context::Context;
use stele_crypto::{BlindedPublicKeyHash, PublicKey};
use stele_types::{ContractAddress, Cycle, Tez};
use tracing::info;

/// One bootstrap delegate: a revealed key and its initial balance.
#[derive(Debug, Clone)]
pub struct BootstrapDelegate {
    /// The delegate's public key.
    pub public_key: PublicKey,
    /// Its initial spendable balance.
    pub balance: Tez,
}

/// One activation commitment seeded at genesis.
#[derive(Debug, Clone)]
pub struct Commitment {
    /// The blinded public key hash.
    pub blinded: BlindedPublicKeyHash,
    /// The claimable amount.
    pub amount: Tez,
}

/// Prepares an empty context for block application.
///
/// Commits the result to the backing store: genesis is a block of its own.
pub fn init(
    ctx: &mut Context,
    constants: &Constants,
    delegates_init: &[BootstrapDelegate],
    commitments: &[Commitment],
) -> Result<()> {
    rolls::init(ctx)?;
    seeds::init_genesis(ctx, constants)?;

    // Bootstrap delegates: allocated, revealed, self-delegated, active.
    for bootstrap in delegates_init {
        let pkh = bootstrap.public_key.hash();
        let contract = ContractAddress::implicit(pkh);

        contracts::credit(ctx, constants, &contract, Tez::ZERO)?;
        ctx.set(
            &format!("contracts/{}/manager", contract.storage_key()),
            &ManagerKey::Revealed(bootstrap.public_key.clone()),
        )?;
        delegates::register(ctx, constants, &pkh, Cycle::ZERO)?;
        ctx.set(
            &format!("contracts/{}/delegate", contract.storage_key()),
            &pkh,
        )?;
        contracts::credit(ctx, constants, &contract, bootstrap.balance)?;
    }

    // Rights state. The freeze at the end of cycle `c` covers cycle
    // `c + preserved + 1`, so every cycle up to `preserved` must arrive
    // frozen from genesis, `preserved + 1` snapshotted but not frozen,
    // and `preserved + 2` merely open.
    for c in 0..=constants.preserved_cycles {
        let cycle = Cycle(c);
        rolls::init_cycle(ctx, cycle)?;
        rolls::snapshot_rolls_for_cycle(ctx, cycle)?;
        rolls::freeze_rolls_for_cycle(ctx, constants, cycle)?;
    }
    let snapshotted = Cycle(constants.preserved_cycles + 1);
    rolls::init_cycle(ctx, snapshotted)?;
    rolls::snapshot_rolls_for_cycle(ctx, snapshotted)?;
    rolls::init_cycle(ctx, Cycle(constants.preserved_cycles + 2))?;

    // Activation commitments.
    for commitment in commitments {
        ctx.set(
            &format!("commitments/{}", hex::encode(commitment.blinded.0)),
            &commitment.amount,
        )?;
    }

    // Voting starts in a Proposal period with fresh listings.
    ctx.set("votes/period_kind", &votes::PeriodKind::Proposal)?;
    votes::init_listings(ctx)?;

    ctx.set("chain/last_block_priority", &0u16)?;
    ctx.commit_block();

    info!(
        delegates = delegates_init.len(),
        commitments = commitments.len(),
        "genesis context prepared"
    );
    Ok(())
}
