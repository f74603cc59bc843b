//! The voting subsystem: periods, proposals and ballots.
//!
//! Voting advances through four period kinds. During a Proposal period
//! delegates submit protocol hashes; the most supported one (by roll
//! weight at period start) moves to an Exploration vote. Exploration and
//! Promotion require an 80% supermajority of yay over yay-plus-nay;
//! Testing advances unconditionally. Protocol activation itself is outside
//! the core, so a successful Promotion resets to Proposal.

use crate::constants::Constants;
use crate::errors::{Error, Result};
use crate::{delegates, rolls};
use serde::{Deserialize, Serialize};
use stele_context::Context;
use stele_crypto::PublicKeyHash;
use stele_types::{Ballot, ProtocolHash};
use tracing::info;

/// Supermajority numerator: 80% of cast yay-plus-nay.
const SUPERMAJORITY_PERCENT: u64 = 80;

fn pkh_key(pkh: &PublicKeyHash) -> String {
    hex::encode(pkh.as_bytes())
}

fn listing_key(pkh: &PublicKeyHash) -> String {
    format!("votes/listings/{}", pkh_key(pkh))
}

fn proposal_key(proposal: &ProtocolHash, pkh: &PublicKeyHash) -> String {
    format!(
        "votes/proposals/{}/{}",
        hex::encode(proposal.as_bytes()),
        pkh_key(pkh)
    )
}

fn proposal_count_key(pkh: &PublicKeyHash) -> String {
    format!("votes/proposal_count/{}", pkh_key(pkh))
}

fn ballot_key(pkh: &PublicKeyHash) -> String {
    format!("votes/ballots/{}", pkh_key(pkh))
}

/// The kind of the current voting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodKind {
    /// Delegates submit proposals.
    Proposal,
    /// First vote on the leading proposal.
    Exploration,
    /// The proposal is under test.
    Testing,
    /// Final vote.
    Promotion,
}

/// A recorded ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    /// The proposal voted on.
    pub proposal: ProtocolHash,
    /// The vote cast.
    pub ballot: Ballot,
}

/// The current period kind.
pub fn period_kind(ctx: &Context) -> Result<PeriodKind> {
    Ok(ctx.get_opt("votes/period_kind")?.unwrap_or(PeriodKind::Proposal))
}

/// The proposal currently under vote or test, if any.
pub fn current_proposal(ctx: &Context) -> Result<Option<ProtocolHash>> {
    ctx.get_opt("votes/current_proposal").map_err(Error::from)
}

/// The roll weight of a delegate in the current period's listings.
fn listing_weight(ctx: &Context, pkh: &PublicKeyHash) -> Result<u64> {
    Ok(ctx.get_opt(&listing_key(pkh))?.unwrap_or(0))
}

/// Rebuilds the listings from current roll ownership.
pub fn init_listings(ctx: &mut Context) -> Result<()> {
    ctx.delete_prefix("votes/listings/");
    for delegate in delegates::all(ctx)? {
        let weight = rolls::count_rolls(ctx, &delegate)?;
        if weight > 0 {
            ctx.set(&listing_key(&delegate), &weight)?;
        }
    }
    Ok(())
}

/// Records a delegate's proposals.
pub fn record_proposals(
    ctx: &mut Context,
    constants: &Constants,
    source: &PublicKeyHash,
    proposals: &[ProtocolHash],
) -> Result<()> {
    if period_kind(ctx)? != PeriodKind::Proposal {
        return Err(Error::UnexpectedProposal);
    }
    if !delegates::registered(ctx, source) {
        return Err(Error::UnregisteredVoter { pkh: *source });
    }
    let mut count: u32 = ctx.get_opt(&proposal_count_key(source))?.unwrap_or(0);
    for proposal in proposals {
        if ctx.mem(&proposal_key(proposal, source)) {
            return Err(Error::DuplicateProposal { pkh: *source });
        }
        count += 1;
        if count > constants.max_proposals_per_delegate {
            return Err(Error::TooManyProposals { pkh: *source });
        }
        ctx.set(&proposal_key(proposal, source), &())?;
    }
    ctx.set(&proposal_count_key(source), &count)?;
    Ok(())
}

/// Records a delegate's ballot on the current proposal.
pub fn record_ballot(
    ctx: &mut Context,
    source: &PublicKeyHash,
    proposal: &ProtocolHash,
    ballot: Ballot,
) -> Result<()> {
    match period_kind(ctx)? {
        PeriodKind::Exploration | PeriodKind::Promotion => {}
        _ => return Err(Error::UnexpectedBallot),
    }
    if !delegates::registered(ctx, source) {
        return Err(Error::UnregisteredVoter { pkh: *source });
    }
    match current_proposal(ctx)? {
        Some(current) if current == *proposal => {}
        _ => return Err(Error::UnexpectedBallot),
    }
    if ctx.mem(&ballot_key(source)) {
        return Err(Error::DoubleBallot { pkh: *source });
    }
    ctx.set(
        &ballot_key(source),
        &BallotRecord {
            proposal: *proposal,
            ballot,
        },
    )?;
    Ok(())
}

/// Tallies ballots by listing weight: `(yay, nay, pass)`.
fn tally(ctx: &Context) -> Result<(u64, u64, u64)> {
    let (mut yay, mut nay, mut pass) = (0u64, 0u64, 0u64);
    for key in ctx.keys_with_prefix("votes/ballots/") {
        let record: BallotRecord = ctx.get(&key)?;
        let hex_part = key.rsplit('/').next().unwrap_or_default();
        let pkh = hex::decode(hex_part)
            .ok()
            .and_then(|b| PublicKeyHash::from_slice(&b).ok());
        let weight = match pkh {
            Some(pkh) => listing_weight(ctx, &pkh)?,
            None => 0,
        };
        match record.ballot {
            Ballot::Yay => yay += weight,
            Ballot::Nay => nay += weight,
            Ballot::Pass => pass += weight,
        }
    }
    Ok((yay, nay, pass))
}

/// The proposal with the highest summed proposer weight, if any.
fn leading_proposal(ctx: &Context) -> Result<Option<ProtocolHash>> {
    let mut best: Option<(ProtocolHash, u64)> = None;
    let mut current: Option<(ProtocolHash, u64)> = None;

    for key in ctx.keys_with_prefix("votes/proposals/") {
        let mut parts = key.rsplit('/');
        let voter_hex = parts.next().unwrap_or_default();
        let proposal_hex = parts.next().unwrap_or_default();
        let proposal: ProtocolHash = match hex::decode(proposal_hex)
            .ok()
            .and_then(|b| stele_types::H256::from_slice(&b).ok())
        {
            Some(hash) => hash,
            None => continue,
        };
        let weight = hex::decode(voter_hex)
            .ok()
            .and_then(|b| PublicKeyHash::from_slice(&b).ok())
            .map(|pkh| listing_weight(ctx, &pkh))
            .transpose()?
            .unwrap_or(0);

        match &mut current {
            Some((hash, total)) if *hash == proposal => *total += weight,
            _ => {
                if let Some((hash, total)) = current.take() {
                    if best.as_ref().map_or(true, |(_, b)| total > *b) {
                        best = Some((hash, total));
                    }
                }
                current = Some((proposal, weight));
            }
        }
    }
    if let Some((hash, total)) = current {
        if best.as_ref().map_or(true, |(_, b)| total > *b) {
            best = Some((hash, total));
        }
    }
    Ok(best.filter(|(_, total)| *total > 0).map(|(hash, _)| hash))
}

fn clear_period(ctx: &mut Context) {
    ctx.delete_prefix("votes/proposals/");
    ctx.delete_prefix("votes/proposal_count/");
    ctx.delete_prefix("votes/ballots/");
}

/// Ends the current voting period and starts the next one.
pub fn period_end(ctx: &mut Context) -> Result<()> {
    let kind = period_kind(ctx)?;
    let next = match kind {
        PeriodKind::Proposal => match leading_proposal(ctx)? {
            Some(winner) => {
                ctx.set("votes/current_proposal", &winner)?;
                PeriodKind::Exploration
            }
            None => PeriodKind::Proposal,
        },
        PeriodKind::Exploration => {
            let (yay, nay, _) = tally(ctx)?;
            if supermajority(yay, nay) {
                PeriodKind::Testing
            } else {
                ctx.delete("votes/current_proposal");
                PeriodKind::Proposal
            }
        }
        PeriodKind::Testing => PeriodKind::Promotion,
        PeriodKind::Promotion => {
            let (yay, nay, _) = tally(ctx)?;
            if supermajority(yay, nay) {
                info!("promotion vote passed; activation handled outside the core");
            }
            ctx.delete("votes/current_proposal");
            PeriodKind::Proposal
        }
    };

    clear_period(ctx);
    ctx.set("votes/period_kind", &next)?;
    init_listings(ctx)?;
    info!(from = ?kind, to = ?next, "voting period advanced");
    Ok(())
}

fn supermajority(yay: u64, nay: u64) -> bool {
    let cast = yay + nay;
    cast > 0 && yay * 100 >= cast * SUPERMAJORITY_PERCENT
}
