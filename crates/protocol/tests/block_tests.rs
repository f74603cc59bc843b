//! Integration tests for the block lifecycle.

mod common;

use common::{assert_roll_invariants, TestChain};
use stele_protocol::{
    begin_application, contracts, delegates, finalize_application, rolls, votes, Error,
};
use stele_types::{
    Ballot, BlockHeader, Contents, ContractAddress, Cycle, ProtocolData, ShellHeader,
    SignedOperation, H256,
};

/// Builds a valid next header for the chain, signed by the rights owner.
fn next_header(chain: &TestChain, priority: u16) -> BlockHeader {
    let raw = chain.head_level + 1;
    let level = chain.level(raw);
    let baker = stele_protocol::rights::baking_rights_owner(&chain.ctx, &level, priority)
        .expect("baking rights");

    let mut header = BlockHeader {
        shell: ShellHeader {
            level: raw,
            proto: 1,
            predecessor: chain.head_hash,
            timestamp: 1_000 + u64::from(raw),
            validation_passes: 4,
            operations_hash: H256::NIL,
            fitness: chain.fitness + 1,
            context: H256::NIL,
        },
        protocol_data: ProtocolData {
            priority,
            seed_nonce_hash: level
                .expected_commitment
                .then(|| common::nonce_for_level(raw).hash()),
            proof_of_work_nonce: [0u8; 8],
            signature: stele_crypto::Signature::ZERO,
        },
    };
    header.sign(chain.secret_for(&baker));
    header
}

#[test]
fn test_begin_apply_finalize_roundtrip() {
    let mut chain = TestChain::new(3);
    let header = next_header(&chain, 0);

    let state =
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness).unwrap();
    assert_eq!(state.level.level, 1);
    assert_eq!(state.fitness, chain.fitness + 1);

    finalize_application(
        &mut chain.ctx,
        &chain.constants,
        &state,
        Some(header.shell.fitness),
    )
    .unwrap();
    chain.ctx.commit_block();

    // The baker's deposit and reward are frozen for the cycle.
    let frozen = delegates::frozen_balance(&chain.ctx, &state.baker, state.level.cycle).unwrap();
    assert_eq!(frozen.deposits, chain.constants.block_security_deposit);
    assert_eq!(frozen.rewards, chain.constants.block_reward);
}

#[test]
fn test_header_signed_by_wrong_key_rejected() {
    let chain = TestChain::new(3);
    let mut header = next_header(&chain, 0);

    // Re-sign with a delegate that does not own the priority-0 right.
    let level = chain.level(chain.head_level + 1);
    let baker = stele_protocol::rights::baking_rights_owner(&chain.ctx, &level, 0).unwrap();
    let imposter = chain.delegates.iter().find(|d| **d != baker).unwrap();
    header.sign(chain.secret_for(imposter));

    assert!(matches!(
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness),
        Err(Error::InvalidBlockSignature { .. })
    ));
}

#[test]
fn test_fitness_must_progress() {
    let chain = TestChain::new(3);
    let mut header = next_header(&chain, 0);
    header.shell.fitness = chain.fitness;
    let level = chain.level(chain.head_level + 1);
    let baker = stele_protocol::rights::baking_rights_owner(&chain.ctx, &level, 0).unwrap();
    header.sign(chain.secret_for(&baker));

    assert!(matches!(
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness),
        Err(Error::InvalidFitness { .. })
    ));
}

#[test]
fn test_announced_fitness_checked_at_finalize() {
    let mut chain = TestChain::new(3);
    let header = next_header(&chain, 0);
    let state =
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness).unwrap();

    assert!(matches!(
        finalize_application(
            &mut chain.ctx,
            &chain.constants,
            &state,
            Some(header.shell.fitness + 7),
        ),
        Err(Error::WrongFitness { .. })
    ));
}

#[test]
fn test_unexpected_commitment_rejected() {
    let chain = TestChain::new(3);
    let mut header = next_header(&chain, 0);
    // Level 1 is not a commitment level under the test layout.
    header.protocol_data.seed_nonce_hash = Some(H256::keccak256(b"surprise"));
    let level = chain.level(chain.head_level + 1);
    let baker = stele_protocol::rights::baking_rights_owner(&chain.ctx, &level, 0).unwrap();
    header.sign(chain.secret_for(&baker));

    assert!(matches!(
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness),
        Err(Error::InvalidCommitment { expected: false })
    ));
}

#[test]
fn test_pow_threshold_enforced() {
    let mut chain = TestChain::new(3);
    chain.constants.proof_of_work_threshold = 0;
    let header = next_header(&chain, 0);

    assert!(matches!(
        begin_application(&chain.ctx, &chain.constants, &header, chain.fitness),
        Err(Error::InvalidProofOfWorkNonce { .. })
    ));
}

#[test]
fn test_cycle_end_maintains_snapshot_window() {
    let mut chain = TestChain::new(3);
    let preserved = chain.constants.preserved_cycles;

    chain.bake_to_cycle_end();
    // Head is the last block of cycle 0; cycle-end bookkeeping ran.
    let current = chain.head().cycle;
    assert_eq!(current, Cycle(0));

    // Snapshot rows exist out to current + preserved + 3 (opened at the
    // cycle end), and the freeze for current + preserved + 1 kept one.
    for c in 0..=preserved + 3 {
        assert!(
            rolls::snapshot_index(&chain.ctx, Cycle(c)).is_ok(),
            "missing snapshot row for cycle {c}"
        );
    }
    assert_roll_invariants(&chain);
}

#[test]
fn test_frozen_balances_unfreeze_after_preserved_cycles() {
    let mut chain = TestChain::new(2);
    let bpc = chain.constants.layout.blocks_per_cycle;

    // Cross cycles 0 and 1, then stop one block short of the end of
    // cycle 2, where cycle 0 unfreezes.
    chain.bake_to_cycle_end();
    chain.bake_to_cycle_end();
    while chain.head_level % bpc != bpc - 2 {
        chain.bake_empty(1);
    }

    // Watch a delegate that froze something in cycle 0 and does not bake
    // the final block, so the unfreeze is the only balance change.
    let final_baker = chain.next_baker();
    let holder = chain
        .delegates
        .iter()
        .find(|d| {
            **d != final_baker
                && !delegates::frozen_balance(&chain.ctx, d, Cycle(0))
                    .unwrap()
                    .total()
                    .unwrap()
                    .is_zero()
        })
        .copied()
        .expect("a non-baking delegate froze funds in cycle 0");

    let holder_addr = ContractAddress::implicit(holder);
    let balance_before = contracts::balance(&chain.ctx, &holder_addr).unwrap();
    let frozen_before = delegates::frozen_balance(&chain.ctx, &holder, Cycle(0))
        .unwrap()
        .total()
        .unwrap();

    chain.bake_empty(1);

    let frozen = delegates::frozen_balance(&chain.ctx, &holder, Cycle(0)).unwrap();
    assert!(frozen.total().unwrap().is_zero());
    assert_eq!(
        contracts::balance(&chain.ctx, &holder_addr).unwrap(),
        balance_before.checked_add(frozen_before).unwrap()
    );

    assert_roll_invariants(&chain);
}

#[test]
fn test_lapsed_delegate_is_deactivated() {
    let mut chain = TestChain::new(3);
    let bpc = chain.constants.layout.blocks_per_cycle;

    // Stop one block short of the cycle end and pick a victim that does
    // not bake the final block, so nothing re-extends its grace cycle.
    while chain.head_level % bpc != bpc - 2 {
        chain.bake_empty(1);
    }
    let final_baker = chain.next_baker();
    let victim = *chain
        .delegates
        .iter()
        .find(|d| **d != final_baker)
        .unwrap();

    chain
        .ctx
        .set(
            &format!("delegates/deactivation/{}", hex::encode(victim.as_bytes())),
            &Cycle(0),
        )
        .unwrap();
    chain.ctx.commit_block();

    chain.bake_empty(1);

    assert!(rolls::is_inactive(&chain.ctx, &victim).unwrap());
    assert_eq!(rolls::count_rolls(&chain.ctx, &victim).unwrap(), 0);
    assert_roll_invariants(&chain);
}

#[test]
fn test_unrevealed_commitments_are_settled_next_cycle() {
    let mut chain = TestChain::new(3);
    chain.bake_to_cycle_end();

    // Commitment rows from cycle 0 are still present.
    assert!(chain.ctx.mem("nonces/0000000003"));

    // They settle (forfeit, here: nothing revealed) at the end of cycle 1.
    chain.bake_to_cycle_end();
    assert!(!chain.ctx.mem("nonces/0000000003"));
    assert_roll_invariants(&chain);
}

#[test]
fn test_voting_period_advances_on_proposal() {
    let mut chain = TestChain::new(3);
    chain.bake_empty(1);
    assert_eq!(votes::period_kind(&chain.ctx).unwrap(), votes::PeriodKind::Proposal);

    let proposal = H256::keccak256(b"protocol upgrade");
    let proposer = chain.delegates[0];
    let op = SignedOperation::sign(
        chain.secret_for(&proposer),
        chain.head_hash,
        vec![Contents::Proposals {
            source: proposer,
            period: chain.head().voting_period,
            proposals: vec![proposal],
        }],
    );
    chain.bake_with_ops(&[op]).unwrap();

    // Bake through the end of the voting period (two test cycles).
    let bpv = chain.constants.layout.blocks_per_voting_period;
    while chain.head_level % bpv != bpv - 1 {
        chain.bake_empty(1);
    }
    assert_eq!(
        votes::period_kind(&chain.ctx).unwrap(),
        votes::PeriodKind::Exploration
    );
    assert_eq!(votes::current_proposal(&chain.ctx).unwrap(), Some(proposal));

    // Everyone votes yay; the next period end moves to Testing. The
    // ballots land in the first block of the new period.
    let period = chain.level(chain.head_level + 1).voting_period;
    let ballots: Vec<SignedOperation> = chain
        .delegates
        .clone()
        .into_iter()
        .map(|d| {
            SignedOperation::sign(
                chain.secret_for(&d),
                chain.head_hash,
                vec![Contents::Ballot {
                    source: d,
                    period,
                    proposal,
                    ballot: Ballot::Yay,
                }],
            )
        })
        .collect();
    chain.bake_with_ops(&ballots).unwrap();

    while chain.head_level % bpv != bpv - 1 {
        chain.bake_empty(1);
    }
    assert_eq!(
        votes::period_kind(&chain.ctx).unwrap(),
        votes::PeriodKind::Testing
    );
}

#[test]
fn test_ballot_in_wrong_period_rejected() {
    let mut chain = TestChain::new(3);
    chain.bake_empty(1);

    let voter = chain.delegates[0];
    let op = SignedOperation::sign(
        chain.secret_for(&voter),
        chain.head_hash,
        vec![Contents::Ballot {
            source: voter,
            period: chain.head().voting_period,
            proposal: H256::keccak256(b"nope"),
            ballot: Ballot::Yay,
        }],
    );
    assert!(matches!(
        chain.bake_with_ops(&[op]),
        Err(Error::UnexpectedBallot)
    ));
}
