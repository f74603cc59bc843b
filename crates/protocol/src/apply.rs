//! The operation pipeline: precheck and apply for every operation kind.
//!
//! Non-manager operations apply alone. Manager operations batch: the whole
//! batch is prechecked first (counters, reveals, signature, fees), then
//! each entry applies its content in a forked context. Precheck effects —
//! fee taken, counter bumped — survive later failures; content effects are
//! discarded with the fork. Internal operations emitted by scripts run off
//! a FIFO worklist with per-block nonce replay protection, and a failure
//! anywhere in the tree discards the whole content fork.

use crate::block::BlockState;
use crate::constants::Constants;
use crate::contracts;
use crate::delegates;
use crate::errors::{Error, Result};
use crate::michelson::ScriptRunner;
use crate::rights;
use crate::rolls;
use crate::seeds;
use crate::votes;
use std::collections::VecDeque;
use stele_context::Context;
use stele_crypto::{blinded_pkh, PublicKeyHash};
use stele_types::{
    BalanceUpdate, BlockHash, ContentOutcome, Contents, ContentsResult, ContractAddress,
    InternalOperation, InternalOperationResult, Level, ManagerContent, ManagerOperation,
    ManagerOperationResult, OperationResult, SignedOperation, Tez,
};
use tracing::{debug, warn};

fn endorsed_slot_key(slot: u16) -> String {
    format!("chain/endorsed_slots/{slot}")
}

fn internal_nonce_key(nonce: u16) -> String {
    format!("chain/internal_nonces/{nonce}")
}

fn commitment_key(blinded: &stele_crypto::BlindedPublicKeyHash) -> String {
    format!("commitments/{}", hex::encode(blinded.0))
}

fn mutez_delta(amount: Tez) -> i64 {
    amount.mutez() as i64
}

/// Applies one signed operation inside a block.
///
/// Brackets the application with the origination nonce for `block_hash`
/// and resets metering afterwards, whatever the outcome. The whole
/// operation runs in its own fork, so a rejected operation leaves no
/// partial writes behind.
pub fn apply_operation(
    ctx: &mut Context,
    constants: &Constants,
    state: &mut BlockState,
    runner: &dyn ScriptRunner,
    block_hash: BlockHash,
    op: &SignedOperation,
) -> Result<Vec<ContentsResult>> {
    ctx.init_origination_nonce(*block_hash.as_fixed_bytes());

    let saved = state.clone();
    let mut fork = ctx.fork();
    let result = apply_contents_list(&mut fork, constants, state, runner, op);
    match &result {
        Ok(_) => ctx.commit(fork),
        Err(_) => *state = saved,
    }

    ctx.set_gas_unlimited();
    ctx.set_storage_unlimited();
    ctx.unset_origination_nonce();
    result
}

/// Dispatches a contents list: one non-manager entry, or a manager batch.
fn apply_contents_list(
    ctx: &mut Context,
    constants: &Constants,
    state: &mut BlockState,
    runner: &dyn ScriptRunner,
    op: &SignedOperation,
) -> Result<Vec<ContentsResult>> {
    if op.contents.is_empty() {
        return Err(Error::MalformedBatch);
    }
    if op.contents.iter().all(Contents::is_manager) {
        return apply_manager_batch(ctx, constants, state, runner, op);
    }
    if op.contents.len() != 1 {
        return Err(Error::MalformedBatch);
    }

    let result = match &op.contents[0] {
        Contents::Endorsement { block, level, slots } => {
            apply_endorsement(ctx, constants, state, op, block, *level, slots)?
        }
        Contents::SeedNonceRevelation { level, nonce } => {
            let delegate = seeds::reveal(ctx, *level, nonce)?;
            let tip = constants.seed_nonce_revelation_tip;
            delegates::credit_rewards(ctx, &state.baker, state.level.cycle, tip)?;
            debug!(level, delegate = %delegate, "nonce revelation rewarded");
            ContentsResult::SeedNonceRevelation {
                balance_updates: vec![BalanceUpdate::Rewards {
                    delegate: state.baker,
                    cycle: state.level.cycle,
                    change: mutez_delta(tip),
                }],
            }
        }
        Contents::DoubleEndorsementEvidence { op1, op2 } => {
            apply_double_endorsement_evidence(ctx, constants, state, op1, op2)?
        }
        Contents::DoubleBakingEvidence { header1, header2 } => {
            apply_double_baking_evidence(ctx, constants, state, header1, header2)?
        }
        Contents::ActivateAccount { pkh, code } => {
            let blinded = blinded_pkh(code, pkh);
            let key = commitment_key(&blinded);
            let amount: Tez = ctx
                .get_opt(&key)?
                .ok_or(Error::InvalidActivation { pkh: *pkh })?;
            let contract = ContractAddress::implicit(*pkh);
            contracts::credit(ctx, constants, &contract, amount)?;
            ctx.delete(&key);
            debug!(pkh = %pkh, amount = %amount, "account activated");
            ContentsResult::ActivateAccount {
                balance_updates: vec![BalanceUpdate::Contract {
                    contract,
                    change: mutez_delta(amount),
                }],
            }
        }
        Contents::Proposals {
            source,
            period,
            proposals,
        } => {
            check_voting_envelope(ctx, state, op, *source, *period)?;
            votes::record_proposals(ctx, constants, source, proposals)?;
            ContentsResult::Proposals
        }
        Contents::Ballot {
            source,
            period,
            proposal,
            ballot,
        } => {
            check_voting_envelope(ctx, state, op, *source, *period)?;
            votes::record_ballot(ctx, source, proposal, *ballot)?;
            ContentsResult::Ballot
        }
        Contents::Manager(_) => unreachable!("manager contents handled as a batch"),
    };
    Ok(vec![result])
}

/// Shared checks for voting operations: period match, registration,
/// wrapper signature by the voter.
fn check_voting_envelope(
    ctx: &Context,
    state: &BlockState,
    op: &SignedOperation,
    source: PublicKeyHash,
    period: u32,
) -> Result<()> {
    if period != state.level.voting_period {
        return Err(Error::WrongVotingPeriod {
            current: state.level.voting_period,
            provided: period,
        });
    }
    if !delegates::registered(ctx, &source) {
        return Err(Error::UnregisteredVoter { pkh: source });
    }
    let key = contracts::revealed_key(ctx, &ContractAddress::implicit(source))?;
    if !op.verify_signature(&key) {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}

fn apply_endorsement(
    ctx: &mut Context,
    constants: &Constants,
    state: &mut BlockState,
    op: &SignedOperation,
    block: &BlockHash,
    level: u32,
    slots: &[u16],
) -> Result<ContentsResult> {
    if *block != state.predecessor {
        return Err(Error::WrongEndorsementPredecessor);
    }
    let expected = state.level.level.checked_sub(1).unwrap_or(0);
    if level != expected {
        return Err(Error::InvalidEndorsementLevel {
            expected,
            provided: level,
        });
    }
    if slots.is_empty() {
        return Err(Error::MalformedBatch);
    }
    for slot in slots {
        if *slot >= constants.endorsers_per_block {
            return Err(Error::EndorsementSlotOutOfRange { slot: *slot });
        }
        if ctx.mem(&endorsed_slot_key(*slot)) {
            return Err(Error::DuplicateEndorsement { slot: *slot });
        }
    }

    let endorsed_level = constants.level(level);
    let delegate = slot_owner(ctx, &endorsed_level, slots)?;
    let key = contracts::revealed_key(ctx, &ContractAddress::implicit(delegate))?;
    if !op.verify_signature(&key) {
        return Err(Error::InvalidSignature);
    }

    for slot in slots {
        ctx.set(&endorsed_slot_key(*slot), &delegate)?;
    }
    state.fitness += slots.len() as u64;

    let contract = ContractAddress::implicit(delegate);
    let deposit = constants
        .endorsement_security_deposit
        .checked_mul(slots.len() as u64)?;
    contracts::debit(ctx, constants, &contract, deposit)?;
    delegates::credit_deposits(ctx, &delegate, state.level.cycle, deposit)?;

    let reward = constants
        .endorsement_reward(state.priority)
        .checked_mul(slots.len() as u64)?;
    delegates::credit_rewards(ctx, &delegate, state.level.cycle, reward)?;

    rolls::set_active(ctx, constants, &delegate, state.level.cycle)?;

    Ok(ContentsResult::Endorsement {
        delegate,
        slots: slots.to_vec(),
        balance_updates: vec![
            BalanceUpdate::Contract {
                contract,
                change: -mutez_delta(deposit),
            },
            BalanceUpdate::Deposits {
                delegate,
                cycle: state.level.cycle,
                change: mutez_delta(deposit),
            },
            BalanceUpdate::Rewards {
                delegate,
                cycle: state.level.cycle,
                change: mutez_delta(reward),
            },
        ],
    })
}

/// The single delegate owning all of `slots` at `level`.
fn slot_owner(ctx: &Context, level: &Level, slots: &[u16]) -> Result<PublicKeyHash> {
    let first = rights::endorsement_rights_owner(ctx, level, slots[0])?;
    for slot in &slots[1..] {
        let other = rights::endorsement_rights_owner(ctx, level, *slot)?;
        if other != first {
            return Err(Error::InconsistentEndorsementSlots {
                delegate1: first,
                delegate2: other,
            });
        }
    }
    Ok(first)
}

/// Checks the denunciation staleness window and returns nothing or the
/// matching error, parameterized per evidence kind by the constructors.
fn check_denunciation_window(
    constants: &Constants,
    state: &BlockState,
    level: u32,
    too_early: fn(u32, u32) -> Error,
    outdated: fn(u32, u32) -> Error,
) -> Result<()> {
    let current = state.level.level;
    if level >= current {
        return Err(too_early(level, current));
    }
    let last = constants.last_allowed_fork_level(&state.level);
    if level < last {
        return Err(outdated(level, last));
    }
    Ok(())
}

/// Slashes the whole frozen balance of `offender` at `cycle`, crediting
/// half to the accusing baker and burning the remainder. Returns the
/// balance-update list.
fn slash(
    ctx: &mut Context,
    state: &BlockState,
    offender: PublicKeyHash,
    cycle: stele_types::Cycle,
) -> Result<Vec<BalanceUpdate>> {
    let frozen = delegates::forfeit_frozen(ctx, &offender, cycle)?;
    let total = frozen.total()?;
    let reward = total.div_floor(2);
    delegates::credit_rewards(ctx, &state.baker, state.level.cycle, reward)?;
    warn!(
        offender = %offender,
        cycle = cycle.0,
        slashed = %total,
        accuser = %state.baker,
        "delegate slashed"
    );
    Ok(vec![
        BalanceUpdate::Deposits {
            delegate: offender,
            cycle,
            change: -mutez_delta(frozen.deposits),
        },
        BalanceUpdate::Fees {
            delegate: offender,
            cycle,
            change: -mutez_delta(frozen.fees),
        },
        BalanceUpdate::Rewards {
            delegate: offender,
            cycle,
            change: -mutez_delta(frozen.rewards),
        },
        BalanceUpdate::Rewards {
            delegate: state.baker,
            cycle: state.level.cycle,
            change: mutez_delta(reward),
        },
    ])
}

fn apply_double_endorsement_evidence(
    ctx: &mut Context,
    constants: &Constants,
    state: &BlockState,
    op1: &SignedOperation,
    op2: &SignedOperation,
) -> Result<ContentsResult> {
    let (block1, level1, slots1) = op1
        .as_single_endorsement()
        .ok_or(Error::InvalidDoubleEndorsementEvidence)?;
    let (block2, level2, slots2) = op2
        .as_single_endorsement()
        .ok_or(Error::InvalidDoubleEndorsementEvidence)?;

    if level1 != level2 || block1 == block2 || slots1.is_empty() || slots2.is_empty() {
        return Err(Error::InvalidDoubleEndorsementEvidence);
    }
    check_denunciation_window(
        constants,
        state,
        level1,
        |level, current| Error::TooEarlyDoubleEndorsementEvidence { level, current },
        |level, last| Error::OutdatedDoubleEndorsementEvidence { level, last },
    )?;

    let endorsed_level = constants.level(level1);
    let delegate1 = slot_owner(ctx, &endorsed_level, slots1)?;
    let delegate2 = slot_owner(ctx, &endorsed_level, slots2)?;

    let key1 = contracts::revealed_key(ctx, &ContractAddress::implicit(delegate1))?;
    if !op1.verify_signature(&key1) {
        return Err(Error::InvalidDoubleEndorsementEvidence);
    }
    let key2 = contracts::revealed_key(ctx, &ContractAddress::implicit(delegate2))?;
    if !op2.verify_signature(&key2) {
        return Err(Error::InvalidDoubleEndorsementEvidence);
    }

    if delegate1 != delegate2 {
        return Err(Error::InconsistentDoubleEndorsementEvidence {
            delegate1,
            delegate2,
        });
    }

    let cycle = endorsed_level.cycle;
    if !delegates::has_frozen_balance(ctx, &delegate1, cycle)? {
        return Err(Error::UnrequiredDoubleEndorsementEvidence);
    }

    let balance_updates = slash(ctx, state, delegate1, cycle)?;
    Ok(ContentsResult::DoubleEndorsementEvidence { balance_updates })
}

fn apply_double_baking_evidence(
    ctx: &mut Context,
    constants: &Constants,
    state: &BlockState,
    header1: &stele_types::BlockHeader,
    header2: &stele_types::BlockHeader,
) -> Result<ContentsResult> {
    let level1 = header1.shell.level;
    let level2 = header2.shell.level;
    if level1 != level2 || header1.hash() == header2.hash() {
        return Err(Error::InvalidDoubleBakingEvidence { level1, level2 });
    }
    check_denunciation_window(
        constants,
        state,
        level1,
        |level, current| Error::TooEarlyDoubleBakingEvidence { level, current },
        |level, last| Error::OutdatedDoubleBakingEvidence { level, last },
    )?;

    let baked_level = constants.level(level1);
    let baker1 =
        rights::baking_rights_owner(ctx, &baked_level, header1.protocol_data.priority)?;
    let key1 = contracts::revealed_key(ctx, &ContractAddress::implicit(baker1))?;
    if !header1.verify_signature(&key1) {
        return Err(Error::InvalidDoubleBakingEvidence { level1, level2 });
    }
    let baker2 =
        rights::baking_rights_owner(ctx, &baked_level, header2.protocol_data.priority)?;
    let key2 = contracts::revealed_key(ctx, &ContractAddress::implicit(baker2))?;
    if !header2.verify_signature(&key2) {
        return Err(Error::InvalidDoubleBakingEvidence { level1, level2 });
    }

    if baker1 != baker2 {
        return Err(Error::InconsistentDoubleBakingEvidence {
            delegate1: baker1,
            delegate2: baker2,
        });
    }

    let cycle = baked_level.cycle;
    if !delegates::has_frozen_balance(ctx, &baker1, cycle)? {
        return Err(Error::UnrequiredDoubleBakingEvidence);
    }

    let balance_updates = slash(ctx, state, baker1, cycle)?;
    Ok(ContentsResult::DoubleBakingEvidence { balance_updates })
}

// ---- manager batches ----

fn apply_manager_batch(
    ctx: &mut Context,
    constants: &Constants,
    state: &mut BlockState,
    runner: &dyn ScriptRunner,
    op: &SignedOperation,
) -> Result<Vec<ContentsResult>> {
    let entries: Vec<&ManagerOperation> = op
        .contents
        .iter()
        .map(|c| match c {
            Contents::Manager(m) => m,
            _ => unreachable!("checked by the dispatcher"),
        })
        .collect();

    let source = entries[0].source;
    if entries.iter().any(|m| m.source != source) {
        return Err(Error::MalformedBatch);
    }

    // Precheck the whole batch; any failure rejects the envelope and
    // nothing below is kept.
    let fee_updates = precheck_manager_batch(ctx, constants, state, op, &source, &entries)?;

    // Apply entry by entry; the first failure skips the rest.
    let mut results = Vec::with_capacity(entries.len());
    let mut failed = false;
    for (entry, fees) in entries.iter().zip(fee_updates) {
        if failed {
            results.push(ContentsResult::Manager(ManagerOperationResult {
                balance_updates: fees,
                operation_result: OperationResult::Skipped,
                internal_operation_results: Vec::new(),
            }));
            continue;
        }

        ctx.set_gas_limit(entry.gas_limit.min(constants.hard_gas_limit_per_operation));
        ctx.set_storage_limit(
            entry
                .storage_limit
                .min(constants.hard_storage_limit_per_operation),
        );

        let mut fork = ctx.fork();
        match execute_content_tree(
            &mut fork,
            constants,
            state,
            runner,
            source,
            source,
            &entry.content,
        ) {
            Ok((outcome, internal_results)) => {
                ctx.commit(fork);
                results.push(ContentsResult::Manager(ManagerOperationResult {
                    balance_updates: fees,
                    operation_result: OperationResult::Applied(outcome),
                    internal_operation_results: internal_results,
                }));
            }
            Err((error, internal_results)) => {
                // Fork dropped: content effects gone, precheck effects kept.
                failed = true;
                debug!(kind = entry.content.kind(), error = %error, "manager content failed");
                results.push(ContentsResult::Manager(ManagerOperationResult {
                    balance_updates: fees,
                    operation_result: OperationResult::Failed {
                        kind: entry.content.kind().to_string(),
                        errors: vec![error.descriptor()],
                    },
                    internal_operation_results: internal_results,
                }));
            }
        }
    }
    Ok(results)
}

/// Prechecks a batch: allocation, counters, reveals, signature, fees.
/// Returns the per-entry fee balance updates.
fn precheck_manager_batch(
    ctx: &mut Context,
    constants: &Constants,
    state: &mut BlockState,
    op: &SignedOperation,
    source: &ContractAddress,
    entries: &[&ManagerOperation],
) -> Result<Vec<Vec<BalanceUpdate>>> {
    if !contracts::exists(ctx, source) {
        return Err(Error::NonExistingContract { contract: *source });
    }

    let mut signature_checked = false;
    let mut fee_updates = Vec::with_capacity(entries.len());
    for entry in entries {
        contracts::check_counter(ctx, source, entry.counter)?;

        if let ManagerContent::Reveal { public_key } = &entry.content {
            contracts::reveal_key(ctx, source, public_key)?;
        }
        let key = contracts::revealed_key(ctx, source)?;
        if !signature_checked {
            if !op.verify_signature(&key) {
                return Err(Error::InvalidSignature);
            }
            signature_checked = true;
        }

        contracts::increment_counter(ctx, source)?;

        let fee = entry.fee;
        if !fee.is_zero() {
            contracts::debit(ctx, constants, source, fee).map_err(|e| match e {
                Error::BalanceTooLow { .. } => Error::CannotPayFee {
                    contract: *source,
                    fee,
                },
                other => other,
            })?;
        }
        state.block_fees = state.block_fees.checked_add(fee)?;
        fee_updates.push(if fee.is_zero() {
            Vec::new()
        } else {
            vec![BalanceUpdate::Contract {
                contract: *source,
                change: -mutez_delta(fee),
            }]
        });
    }
    Ok(fee_updates)
}

type TreeOutcome = (ContentOutcome, Vec<InternalOperationResult>);
type TreeFailure = (Error, Vec<InternalOperationResult>);

/// Executes a manager content and, on success, the whole tree of internal
/// operations it emits. All effects land in `fork`; any failure returns
/// the partial result list and the caller drops the fork.
fn execute_content_tree(
    fork: &mut Context,
    constants: &Constants,
    state: &BlockState,
    runner: &dyn ScriptRunner,
    source: ContractAddress,
    payer: ContractAddress,
    content: &ManagerContent,
) -> std::result::Result<TreeOutcome, TreeFailure> {
    let (outcome, emitted) =
        apply_content(fork, constants, state, runner, source, payer, content, true)
            .map_err(|e| (e, Vec::new()))?;

    let mut worklist: VecDeque<InternalOperation> = emitted.into();
    let mut results: Vec<InternalOperationResult> = Vec::new();

    while let Some(internal) = worklist.pop_front() {
        if let Err(error) = record_internal_nonce(fork, internal.nonce) {
            results.push(InternalOperationResult {
                operation: internal,
                result: OperationResult::Failed {
                    kind: "internal".to_string(),
                    errors: vec![error.descriptor()],
                },
            });
            skip_worklist(&mut worklist, &mut results);
            return Err((error, results));
        }

        match apply_content(
            fork,
            constants,
            state,
            runner,
            internal.source,
            payer,
            &internal.content,
            false,
        ) {
            Ok((outcome, emitted)) => {
                results.push(InternalOperationResult {
                    operation: internal,
                    result: OperationResult::Applied(outcome),
                });
                worklist.extend(emitted);
            }
            Err(error) => {
                results.push(InternalOperationResult {
                    operation: internal.clone(),
                    result: OperationResult::Failed {
                        kind: internal.content.kind().to_string(),
                        errors: vec![error.descriptor()],
                    },
                });
                skip_worklist(&mut worklist, &mut results);
                return Err((error, results));
            }
        }
    }
    Ok((outcome, results))
}

fn record_internal_nonce(fork: &mut Context, nonce: u16) -> Result<()> {
    let key = internal_nonce_key(nonce);
    if fork.mem(&key) {
        return Err(Error::InternalOperationReplay { nonce });
    }
    fork.set(&key, &())?;
    Ok(())
}

fn skip_worklist(
    worklist: &mut VecDeque<InternalOperation>,
    results: &mut Vec<InternalOperationResult>,
) {
    for skipped in worklist.drain(..) {
        results.push(InternalOperationResult {
            operation: skipped,
            result: OperationResult::Skipped,
        });
    }
}

/// Applies one content (external or internal) in the given context.
/// Returns the outcome and the internal operations it emitted.
#[allow(clippy::too_many_arguments)]
fn apply_content(
    ctx: &mut Context,
    constants: &Constants,
    state: &BlockState,
    runner: &dyn ScriptRunner,
    source: ContractAddress,
    payer: ContractAddress,
    content: &ManagerContent,
    external: bool,
) -> Result<(ContentOutcome, Vec<InternalOperation>)> {
    match content {
        // The key was recorded during precheck.
        ManagerContent::Reveal { .. } => Ok((ContentOutcome::Reveal, Vec::new())),

        ManagerContent::Transaction {
            amount,
            parameters,
            destination,
        } => {
            if external && !contracts::is_spendable(ctx, &source)? {
                return Err(Error::NonSpendableContract { contract: source });
            }
            contracts::debit(ctx, constants, &source, *amount)?;
            contracts::credit(ctx, constants, destination, *amount)?;

            let mut balance_updates = vec![
                BalanceUpdate::Contract {
                    contract: source,
                    change: -mutez_delta(*amount),
                },
                BalanceUpdate::Contract {
                    contract: *destination,
                    change: mutez_delta(*amount),
                },
            ];

            match contracts::script(ctx, destination)? {
                None => {
                    if parameters.is_some() {
                        return Err(Error::UnexpectedParameters {
                            destination: *destination,
                        });
                    }
                    Ok((
                        ContentOutcome::Transaction {
                            storage: None,
                            balance_updates,
                            consumed_gas: 0,
                        },
                        Vec::new(),
                    ))
                }
                Some(script) => {
                    let gas_before = ctx.gas_checkpoint();
                    let execution = runner
                        .execute(
                            ctx,
                            &source,
                            &payer,
                            destination,
                            &script,
                            *amount,
                            parameters.as_deref(),
                        )
                        .map_err(|e| Error::ScriptFailure {
                            message: e.to_string(),
                        })?;
                    ctx.consume_gas(execution.consumed_gas)?;

                    let grown = (execution.storage.len() as u64)
                        .saturating_sub(script.storage.len() as u64)
                        + execution
                            .big_map_diff
                            .iter()
                            .filter_map(|(_, v)| v.as_ref())
                            .map(|v| v.len() as u64)
                            .sum::<u64>();
                    ctx.consume_storage(grown)?;

                    contracts::set_script_storage(ctx, destination, execution.storage.clone())?;
                    for (key, value) in &execution.big_map_diff {
                        contracts::write_big_map(ctx, destination, key, value.as_deref())?;
                    }

                    Ok((
                        ContentOutcome::Transaction {
                            storage: Some(execution.storage),
                            balance_updates,
                            consumed_gas: ctx.gas_consumed_since(gas_before),
                        },
                        execution.operations,
                    ))
                }
            }
        }

        ManagerContent::Origination {
            manager,
            delegate,
            script,
            spendable,
            delegatable,
            credit,
        } => {
            if external && !contracts::is_spendable(ctx, &source)? {
                return Err(Error::NonSpendableContract { contract: source });
            }
            if let Some(delegate) = delegate {
                if !delegates::registered(ctx, delegate) {
                    return Err(Error::UnregisteredDelegate { pkh: *delegate });
                }
            }

            let address = ContractAddress::Originated(ctx.fresh_contract_address()?);
            contracts::originate(
                ctx,
                &address,
                *manager,
                *delegate,
                script.as_ref(),
                *spendable,
                *delegatable,
            )?;
            if let Some(script) = script {
                let bytes = (script.code.len() + script.storage.len()) as u64;
                ctx.consume_storage(bytes)?;
            }

            contracts::debit(ctx, constants, &source, *credit)?;
            contracts::credit(ctx, constants, &address, *credit)?;

            let burn = constants.origination_burn;
            contracts::debit(ctx, constants, &source, burn)?;

            Ok((
                ContentOutcome::Origination {
                    balance_updates: vec![
                        BalanceUpdate::Contract {
                            contract: source,
                            change: -mutez_delta(*credit),
                        },
                        BalanceUpdate::Contract {
                            contract: address,
                            change: mutez_delta(*credit),
                        },
                        BalanceUpdate::Contract {
                            contract: source,
                            change: -mutez_delta(burn),
                        },
                    ],
                    originated: address,
                    consumed_gas: 0,
                },
                Vec::new(),
            ))
        }

        ManagerContent::Delegation { delegate } => {
            apply_delegation(ctx, constants, state, source, *delegate)?;
            Ok((ContentOutcome::Delegation, Vec::new()))
        }
    }
}

fn apply_delegation(
    ctx: &mut Context,
    constants: &Constants,
    state: &BlockState,
    source: ContractAddress,
    delegate: Option<PublicKeyHash>,
) -> Result<()> {
    match delegate {
        Some(target) => {
            if source.as_implicit() == Some(target) {
                // Self-delegation registers the delegate.
                if !delegates::registered(ctx, &target) {
                    delegates::register(ctx, constants, &target, state.level.cycle)?;
                } else {
                    rolls::set_active(ctx, constants, &target, state.level.cycle)?;
                }
                contracts::set_delegate(ctx, constants, &source, Some(target))?;
            } else {
                if !delegates::registered(ctx, &target) {
                    return Err(Error::UnregisteredDelegate { pkh: target });
                }
                contracts::set_delegate(ctx, constants, &source, Some(target))?;
                rolls::set_active(ctx, constants, &target, state.level.cycle)?;
            }
        }
        None => {
            // A registered delegate cannot resign by clearing itself.
            if let Some(pkh) = source.as_implicit() {
                if delegates::registered(ctx, &pkh) {
                    return Err(Error::NonDelegatableContract { contract: source });
                }
            }
            contracts::set_delegate(ctx, constants, &source, None)?;
        }
    }
    Ok(())
}
