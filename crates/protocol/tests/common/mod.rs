//! Shared test harness: a small chain driven block by block.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use stele_context::Context;
use stele_crypto::{PublicKeyHash, SecretKey};
use stele_protocol::michelson::{RejectingRunner, ScriptRunner};
use stele_protocol::{
    apply_operation, begin_construction, finalize_application, genesis, rights, BlockState,
    BootstrapDelegate, Constants, Result,
};
use stele_types::{
    BlockHash, Contents, ContentsResult, Level, SeedNonce, SignedOperation, Tez, H256,
};

/// A test chain: a context, the bootstrap keys, and the current head.
pub struct TestChain {
    pub ctx: Context,
    pub constants: Constants,
    pub keys: HashMap<PublicKeyHash, SecretKey>,
    pub delegates: Vec<PublicKeyHash>,
    pub head_level: u32,
    pub head_hash: BlockHash,
    pub fitness: u64,
    /// Nonces committed by baked blocks, for revelation tests.
    pub committed_nonces: HashMap<u32, SeedNonce>,
}

/// The deterministic nonce a test block commits at `level`.
pub fn nonce_for_level(level: u32) -> SeedNonce {
    SeedNonce(*H256::keccak256(&level.to_be_bytes()).as_fixed_bytes())
}

impl TestChain {
    /// Boots a chain with `n` equally funded delegates.
    pub fn new(n: usize) -> Self {
        Self::with_commitments(n, &[])
    }

    /// Boots a chain with `n` delegates and seeded activation commitments.
    pub fn with_commitments(n: usize, commitments: &[genesis::Commitment]) -> Self {
        let constants = Constants::test();
        let mut ctx = Context::new();

        let mut keys = HashMap::new();
        let mut delegates = Vec::new();
        let mut bootstrap = Vec::new();
        for i in 0..n {
            let mut seed = [0u8; 32];
            seed[0] = (i + 1) as u8;
            let secret = SecretKey::from_seed(&seed);
            let pkh = secret.public_key_hash();
            bootstrap.push(BootstrapDelegate {
                public_key: secret.public_key().clone(),
                balance: Tez::from_mutez(8_000_000_000),
            });
            delegates.push(pkh);
            keys.insert(pkh, secret);
        }

        genesis::init(&mut ctx, &constants, &bootstrap, commitments).expect("genesis");

        Self {
            ctx,
            constants,
            keys,
            delegates,
            head_level: 0,
            head_hash: H256::keccak256(b"genesis"),
            fitness: 0,
            committed_nonces: HashMap::new(),
        }
    }

    pub fn secret_for(&self, pkh: &PublicKeyHash) -> &SecretKey {
        self.keys.get(pkh).expect("known delegate")
    }

    pub fn level(&self, raw: u32) -> Level {
        self.constants.level(raw)
    }

    pub fn head(&self) -> Level {
        self.level(self.head_level)
    }

    /// The priority-0 baker of the next block.
    pub fn next_baker(&self) -> PublicKeyHash {
        let level = self.level(self.head_level + 1);
        rights::baking_rights_owner(&self.ctx, &level, 0).expect("baking rights")
    }

    /// Bakes the next block at priority 0 with the given operations.
    pub fn bake_with_ops(&mut self, ops: &[SignedOperation]) -> Result<Vec<Vec<ContentsResult>>> {
        self.bake_block(0, ops, &RejectingRunner)
    }

    /// Bakes the next block at the given priority.
    pub fn bake_block(
        &mut self,
        priority: u16,
        ops: &[SignedOperation],
        runner: &dyn ScriptRunner,
    ) -> Result<Vec<Vec<ContentsResult>>> {
        let raw = self.head_level + 1;
        let level = self.level(raw);
        let nonce_hash = if level.expected_commitment {
            let nonce = nonce_for_level(raw);
            self.committed_nonces.insert(raw, nonce);
            Some(nonce.hash())
        } else {
            None
        };

        let mut state: BlockState = begin_construction(
            &self.ctx,
            &self.constants,
            raw,
            self.head_hash,
            self.fitness,
            priority,
            nonce_hash,
        )?;

        let block_hash = H256::keccak256_concat(&[b"block", &raw.to_be_bytes()]);
        let mut results = Vec::new();
        for op in ops {
            results.push(apply_operation(
                &mut self.ctx,
                &self.constants,
                &mut state,
                runner,
                block_hash,
                op,
            )?);
        }

        finalize_application(&mut self.ctx, &self.constants, &state, None)?;
        self.ctx.commit_block();

        self.head_level = raw;
        self.head_hash = block_hash;
        self.fitness = state.fitness;
        Ok(results)
    }

    /// Bakes `n` empty blocks.
    pub fn bake_empty(&mut self, n: u32) {
        for _ in 0..n {
            self.bake_with_ops(&[]).expect("empty block");
        }
    }

    /// Bakes empty blocks through the next cycle-end block.
    pub fn bake_to_cycle_end(&mut self) {
        let bpc = self.constants.layout.blocks_per_cycle;
        self.bake_empty(1);
        while self.head_level % bpc != bpc - 1 {
            self.bake_empty(1);
        }
    }

    /// The endorsement slots owned by `delegate` at `level`.
    pub fn slots_for(&self, delegate: &PublicKeyHash, level: &Level) -> Vec<u16> {
        (0..self.constants.endorsers_per_block)
            .filter(|slot| {
                rights::endorsement_rights_owner(&self.ctx, level, *slot)
                    .map(|owner| owner == *delegate)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Some delegate owning at least one endorsement slot at `level`,
    /// together with its slots.
    pub fn some_endorser(&self, level: &Level) -> (PublicKeyHash, Vec<u16>) {
        for delegate in &self.delegates {
            let slots = self.slots_for(delegate, level);
            if !slots.is_empty() {
                return (*delegate, slots);
            }
        }
        panic!("no delegate owns a slot at {level:?}");
    }

    /// A signed endorsement of `block` at `level` by `delegate` on `slots`.
    pub fn endorsement(
        &self,
        delegate: &PublicKeyHash,
        block: BlockHash,
        level: u32,
        slots: Vec<u16>,
    ) -> SignedOperation {
        SignedOperation::sign(
            self.secret_for(delegate),
            self.head_hash,
            vec![Contents::Endorsement {
                block,
                level,
                slots,
            }],
        )
    }
}

/// Asserts the quantified roll invariants.
pub fn assert_roll_invariants(chain: &TestChain) {
    use stele_protocol::rolls;

    let ctx = &chain.ctx;
    let constants = &chain.constants;

    // Every allocated roll is owned by exactly one delegate or in limbo.
    let next = rolls::next_roll(ctx).unwrap().index();
    let mut seen = vec![false; next as usize];
    for delegate in stele_protocol::delegates::all(ctx).unwrap() {
        for roll in rolls::delegate_rolls(ctx, &delegate).unwrap() {
            assert!(
                !std::mem::replace(&mut seen[roll.index() as usize], true),
                "{roll} owned twice"
            );
            assert_eq!(
                rolls::owner_of(ctx, roll).unwrap(),
                Some(delegate),
                "owner map out of sync for {roll}"
            );
        }
    }
    for roll in rolls::limbo_rolls(ctx).unwrap() {
        assert!(
            !std::mem::replace(&mut seen[roll.index() as usize], true),
            "{roll} both owned and in limbo"
        );
        assert_eq!(rolls::owner_of(ctx, roll).unwrap(), None);
    }
    assert!(seen.iter().all(|s| *s), "unreachable roll id");

    // change + rolls * tokens_per_roll == delegated stake, per delegate.
    let mut delegated: HashMap<PublicKeyHash, Tez> = HashMap::new();
    for key in ctx.keys_with_prefix("contracts/") {
        if !key.ends_with("/delegate") {
            continue;
        }
        let delegate: PublicKeyHash = ctx.get(&key).unwrap();
        let balance_key = key.replace("/delegate", "/balance");
        let balance: Tez = ctx.get_opt(&balance_key).unwrap().unwrap_or(Tez::ZERO);
        let entry = delegated.entry(delegate).or_insert(Tez::ZERO);
        *entry = entry.checked_add(balance).unwrap();
    }
    for delegate in stele_protocol::delegates::all(ctx).unwrap() {
        let rolls_value = constants
            .tokens_per_roll
            .checked_mul(rolls::count_rolls(ctx, &delegate).unwrap())
            .unwrap();
        let staked = rolls::change_of(ctx, &delegate)
            .unwrap()
            .checked_add(rolls_value)
            .unwrap();
        let expected = delegated.get(&delegate).copied().unwrap_or(Tez::ZERO);
        assert_eq!(staked, expected, "stake accounting broken for {delegate}");

        // Inactive delegates hold everything as change.
        if rolls::is_inactive(ctx, &delegate).unwrap() {
            assert_eq!(rolls::count_rolls(ctx, &delegate).unwrap(), 0);
        }
    }
}
