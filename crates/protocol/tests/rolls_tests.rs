//! Integration tests for the roll registry.

mod common;

use common::{assert_roll_invariants, TestChain};
use stele_context::Context;
use stele_crypto::PublicKeyHash;
use stele_protocol::{rolls, Constants};
use stele_types::{Cycle, Roll, Tez};

fn fresh_registry() -> (Context, Constants) {
    let mut ctx = Context::new();
    let constants = Constants::test();
    rolls::init(&mut ctx).unwrap();
    (ctx, constants)
}

fn delegate(byte: u8) -> PublicKeyHash {
    PublicKeyHash::new([byte; 20])
}

fn rolls_worth(constants: &Constants, n: u64) -> Tez {
    constants.tokens_per_roll.checked_mul(n).unwrap()
}

#[test]
fn test_add_amount_mints_rolls() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);

    // 2.5 rolls worth of stake.
    let amount = rolls_worth(&constants, 2)
        .checked_add(constants.tokens_per_roll.div_floor(2))
        .unwrap();
    rolls::add_amount(&mut ctx, &constants, &d, amount).unwrap();

    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 2);
    assert_eq!(
        rolls::change_of(&ctx, &d).unwrap(),
        constants.tokens_per_roll.div_floor(2)
    );
    assert_eq!(rolls::next_roll(&ctx).unwrap(), Roll(2));
}

#[test]
fn test_roll_conservation_scenario() {
    // Add 2.5 rolls, remove 1.5: one roll left, change zero, one roll in
    // limbo, next_roll advanced by the two allocations.
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);
    let half = constants.tokens_per_roll.div_floor(2);

    let credit = rolls_worth(&constants, 2).checked_add(half).unwrap();
    rolls::add_amount(&mut ctx, &constants, &d, credit).unwrap();

    let debit = constants.tokens_per_roll.checked_add(half).unwrap();
    rolls::remove_amount(&mut ctx, &constants, &d, debit).unwrap();

    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 1);
    assert_eq!(rolls::change_of(&ctx, &d).unwrap(), Tez::ZERO);
    assert_eq!(rolls::limbo_rolls(&ctx).unwrap().len(), 1);
    assert_eq!(rolls::next_roll(&ctx).unwrap(), Roll(2));
}

#[test]
fn test_add_remove_roundtrip_restores_change() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);

    let base = rolls_worth(&constants, 1)
        .checked_add(Tez::from_mutez(123))
        .unwrap();
    rolls::add_amount(&mut ctx, &constants, &d, base).unwrap();
    let change_before = rolls::change_of(&ctx, &d).unwrap();
    let rolls_before = rolls::count_rolls(&ctx, &d).unwrap();

    let amount = rolls_worth(&constants, 1)
        .checked_add(Tez::from_mutez(7))
        .unwrap();
    rolls::add_amount(&mut ctx, &constants, &d, amount).unwrap();
    rolls::remove_amount(&mut ctx, &constants, &d, amount).unwrap();

    assert_eq!(rolls::change_of(&ctx, &d).unwrap(), change_before);
    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), rolls_before);
}

#[test]
fn test_limbo_rolls_are_reused_before_fresh() {
    let (mut ctx, constants) = fresh_registry();
    let a = delegate(1);
    let b = delegate(2);

    rolls::add_amount(&mut ctx, &constants, &a, rolls_worth(&constants, 2)).unwrap();
    rolls::remove_amount(&mut ctx, &constants, &a, rolls_worth(&constants, 2)).unwrap();
    assert_eq!(rolls::limbo_rolls(&ctx).unwrap().len(), 2);

    rolls::add_amount(&mut ctx, &constants, &b, rolls_worth(&constants, 2)).unwrap();
    // No new ids were allocated; limbo drained instead.
    assert_eq!(rolls::next_roll(&ctx).unwrap(), Roll(2));
    assert!(rolls::limbo_rolls(&ctx).unwrap().is_empty());
}

#[test]
fn test_fully_drained_delegate_row_is_deleted() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);

    rolls::add_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 1)).unwrap();
    rolls::remove_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 1)).unwrap();

    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 0);
    assert_eq!(rolls::change_of(&ctx, &d).unwrap(), Tez::ZERO);
    assert!(!ctx.mem(&format!(
        "rolls/change/{}",
        hex::encode(d.as_bytes())
    )));
}

#[test]
fn test_set_inactive_drains_rolls_into_change() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);

    rolls::add_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 3)).unwrap();
    rolls::set_inactive(&mut ctx, &constants, &d).unwrap();

    assert!(rolls::is_inactive(&ctx, &d).unwrap());
    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 0);
    assert_eq!(rolls::change_of(&ctx, &d).unwrap(), rolls_worth(&constants, 3));
    assert_eq!(rolls::limbo_rolls(&ctx).unwrap().len(), 3);

    // Credits while inactive accumulate as change only.
    rolls::add_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 1)).unwrap();
    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 0);
}

#[test]
fn test_set_active_remints_rolls() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);

    rolls::add_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 3)).unwrap();
    rolls::set_inactive(&mut ctx, &constants, &d).unwrap();
    rolls::set_active(&mut ctx, &constants, &d, Cycle(4)).unwrap();

    assert!(!rolls::is_inactive(&ctx, &d).unwrap());
    assert_eq!(rolls::count_rolls(&ctx, &d).unwrap(), 3);
    assert_eq!(
        rolls::deactivation_cycle(&ctx, &d).unwrap(),
        Some(Cycle(4 + 1 + constants.preserved_cycles))
    );
}

#[test]
fn test_snapshot_then_freeze_leaves_exactly_one() {
    let (mut ctx, constants) = fresh_registry();
    let d = delegate(1);
    rolls::add_amount(&mut ctx, &constants, &d, rolls_worth(&constants, 2)).unwrap();

    // Freezing needs a seed for the cycle.
    ctx.set("seeds/for_cycle/7", &stele_crypto::Seed::initial(7))
        .unwrap();

    let cycle = Cycle(7);
    rolls::init_cycle(&mut ctx, cycle).unwrap();
    for _ in 0..4 {
        rolls::snapshot_rolls_for_cycle(&mut ctx, cycle).unwrap();
    }
    assert_eq!(rolls::snapshot_index(&ctx, cycle).unwrap(), 4);

    rolls::freeze_rolls_for_cycle(&mut ctx, &constants, cycle).unwrap();
    let kept = rolls::snapshot_index(&ctx, cycle).unwrap();
    assert!(kept < 4);

    // Only the kept snapshot and its bound survive.
    for index in 0..4 {
        let exists = ctx.snapshot_exists((cycle.0, index));
        assert_eq!(exists, index == kept);
        let bound = rolls::last_for_snapshot(&ctx, cycle, index);
        assert_eq!(bound.is_ok(), index == kept);
    }

    // The kept snapshot matches the live owner map.
    assert_eq!(
        rolls::snapshot_owner(&ctx, cycle, kept, Roll(0)).unwrap(),
        Some(d)
    );

    rolls::clear_cycle(&mut ctx, cycle).unwrap();
    assert!(!ctx.snapshot_exists((cycle.0, kept)));
    assert!(rolls::snapshot_index(&ctx, cycle).is_err());
}

#[test]
fn test_invariants_hold_across_cycles() {
    let mut chain = TestChain::new(3);
    assert_roll_invariants(&chain);

    chain.bake_to_cycle_end();
    assert_roll_invariants(&chain);

    chain.bake_to_cycle_end();
    chain.bake_empty(3);
    assert_roll_invariants(&chain);
}
