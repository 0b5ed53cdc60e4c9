//! Ticket statistics - a pure function from ledger snapshot to lottery entries.

use crate::error::{LotteryError, Result};
use crate::genealogy::GenealogyIndex;
use rhizone_ledger::{LedgerSnapshot, MemberId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// What to do when every eligible member ends up with zero tickets.
///
/// This happens whenever all eligible members share the same maxima, e.g. a
/// fresh community where nobody has taken part in a grant yet. A single
/// eligible member always scores zero, since its own counts are the maxima,
/// so under `Reject` a pool of one can never be drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPoolPolicy {
    /// Every eligible member weighs equally.
    #[default]
    Uniform,
    /// Treat the pool as empty.
    Reject,
}

/// A member as seen by the lottery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub member: MemberId,
    /// Holds the "active" capability
    pub active: bool,
    /// Non-member identity (bot)
    pub bot: bool,
}

impl Candidate {
    /// A human member.
    pub fn member(member: MemberId, active: bool) -> Self {
        Self {
            member,
            active,
            bot: false,
        }
    }
}

/// Per-member statistics the ticket count is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    /// Last grant the member took part in, on either side (0 if none)
    pub touch: u64,
    /// `touch`, raised to the last grant the member lapsed under
    pub effective_touch: u64,
    /// Grants where the member was custodian
    pub bestowals: u64,
    /// Members admitted through the member's line
    pub descendants: u64,
}

/// One member's standing in a draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryEntry {
    pub member: MemberId,
    pub stats: TicketStats,
    pub tickets: u64,
    pub probability: f64,
}

/// Members allowed to receive the token.
///
/// Active humans other than the custodian of the most recent grant, in id
/// order.
pub fn eligible_members(candidates: &[Candidate], snapshot: &LedgerSnapshot) -> Vec<MemberId> {
    let last = snapshot.most_recent_custodian();
    candidates
        .iter()
        .filter(|c| c.active && !c.bot && Some(c.member) != last)
        .map(|c| c.member)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn collect_stats(
    snapshot: &LedgerSnapshot,
    index: &GenealogyIndex,
    eligible: &[MemberId],
) -> Vec<(MemberId, TicketStats)> {
    let mut touch: HashMap<MemberId, u64> = HashMap::new();
    let mut bestowals: HashMap<MemberId, u64> = HashMap::new();
    for grant in &snapshot.grants {
        touch.insert(grant.custodian, grant.id.0);
        if let Some(grantee) = grant.grantee {
            touch.insert(grantee, grant.id.0);
        }
        *bestowals.entry(grant.custodian).or_default() += 1;
    }

    let mut lapsed: HashMap<MemberId, u64> = HashMap::new();
    for mark in &snapshot.marks {
        let slot = lapsed.entry(mark.member).or_default();
        *slot = (*slot).max(mark.grant.0);
    }

    eligible
        .iter()
        .map(|&member| {
            let touch = touch.get(&member).copied().unwrap_or(0);
            let stats = TicketStats {
                touch,
                effective_touch: touch.max(lapsed.get(&member).copied().unwrap_or(0)),
                bestowals: bestowals.get(&member).copied().unwrap_or(0),
                descendants: index.progeny_count(member),
            };
            (member, stats)
        })
        .collect()
}

/// Ticket counts and win probabilities for every eligible member.
///
/// Grants are visited in ascending order, so the last write to `touch` is
/// the most recent grant.
pub fn compute_entries(
    snapshot: &LedgerSnapshot,
    index: &GenealogyIndex,
    eligible: &[MemberId],
    policy: ZeroPoolPolicy,
) -> Result<Vec<LotteryEntry>> {
    if eligible.is_empty() {
        return Err(LotteryError::NoEligibleCandidates);
    }

    let stats = collect_stats(snapshot, index, eligible);

    let max_touch = stats.iter().map(|(_, s)| s.touch).max().unwrap_or(0);
    let max_bestowals = stats.iter().map(|(_, s)| s.bestowals).max().unwrap_or(0);
    let max_descendants = stats.iter().map(|(_, s)| s.descendants).max().unwrap_or(0);
    let baseline = i128::from(max_touch) + i128::from(max_bestowals) + i128::from(max_descendants);

    let mut tickets: Vec<u64> = stats
        .iter()
        .map(|(_, s)| {
            let raw = baseline
                - i128::from(s.effective_touch)
                - i128::from(s.bestowals)
                - i128::from(s.descendants);
            u64::try_from(raw.max(0)).unwrap_or(u64::MAX)
        })
        .collect();

    if tickets.iter().all(|&t| t == 0) {
        match policy {
            ZeroPoolPolicy::Reject => return Err(LotteryError::NoEligibleCandidates),
            ZeroPoolPolicy::Uniform => tickets.iter_mut().for_each(|t| *t = 1),
        }
    }

    let total: u128 = tickets.iter().map(|&t| u128::from(t)).sum();
    Ok(stats
        .into_iter()
        .zip(tickets)
        .map(|((member, stats), tickets)| LotteryEntry {
            member,
            stats,
            tickets,
            probability: tickets as f64 / total as f64,
        })
        .collect())
}
