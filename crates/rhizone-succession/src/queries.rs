//! Read-only views for the operator command surface.
//!
//! Everything here returns plain data; formatting replies is the
//! dispatcher's job.

use crate::controller::SuccessionState;
use crate::platform::{Capability, Member};
use rhizone_ledger::{CustodyGrant, GrantId, LedgerSnapshot, MemberId};
use rhizone_lottery::{GenealogyIndex, LotteryEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How much the stats command reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsDetail {
    /// State and counts
    #[default]
    Summary,
    /// Also every lottery entry
    Full,
}

/// Answer to `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub state: SuccessionState,
    pub active_grant: Option<CustodyGrant>,
    pub total_grants: u64,
    pub admitted: usize,
    pub eligible: usize,
    /// Lottery standings, most tickets first (only with [`StatsDetail::Full`])
    pub entries: Vec<LotteryEntry>,
}

/// One step of a lineage, root first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageStep {
    pub member: MemberId,
    /// Grant that admitted this member (none for the root)
    pub admitted_by: Option<GrantId>,
}

/// Answer to `lineage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub member: MemberId,
    pub steps: Vec<LineageStep>,
}

/// One member below the queried member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descendant {
    pub member: MemberId,
    pub depth: usize,
    pub active: bool,
}

/// Answer to `progeny`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progeny {
    pub member: MemberId,
    /// Direct children, most recent first
    pub children: Vec<MemberId>,
    pub descendants: Vec<Descendant>,
}

/// Root-to-member ancestry.
pub fn lineage(snapshot: &LedgerSnapshot, member: MemberId) -> Lineage {
    let index = GenealogyIndex::from_snapshot(snapshot);
    let steps = index
        .lineage_of(member)
        .into_iter()
        .map(|m| LineageStep {
            member: m,
            admitted_by: index.parent_of(m).map(|(grant, _)| grant),
        })
        .collect();
    Lineage { member, steps }
}

/// Everyone admitted through `member`'s line.
///
/// Without `include_inactive`, only descendants currently holding "active"
/// (and still present on the platform) are listed.
pub fn progeny(
    snapshot: &LedgerSnapshot,
    members: &[Member],
    member: MemberId,
    include_inactive: bool,
) -> Progeny {
    let index = GenealogyIndex::from_snapshot(snapshot);
    let active: HashMap<MemberId, bool> = members
        .iter()
        .map(|m| (m.id, m.has(Capability::Active)))
        .collect();

    let descendants = index
        .descendants_of(member)
        .into_iter()
        .map(|(m, depth)| Descendant {
            member: m,
            depth,
            active: active.get(&m).copied().unwrap_or(false),
        })
        .filter(|d| include_inactive || d.active)
        .collect();

    Progeny {
        member,
        children: index.children_of(member).iter().map(|&(_, c)| c).collect(),
        descendants,
    }
}
