//! Weighted draw over lottery entries.

use crate::error::{LotteryError, Result};
use crate::tickets::LotteryEntry;
use rand::Rng;
use rhizone_ledger::MemberId;

/// Pick a member with probability proportional to their tickets.
///
/// Equivalent to laying out `tickets` slots per member and choosing one slot
/// uniformly. Members with zero tickets can never be picked.
pub fn draw<R: Rng + ?Sized>(entries: &[LotteryEntry], rng: &mut R) -> Result<MemberId> {
    let total: u128 = entries.iter().map(|e| u128::from(e.tickets)).sum();
    if total == 0 {
        return Err(LotteryError::NoEligibleCandidates);
    }

    let mut slot = rng.gen_range(0..total);
    for entry in entries {
        let tickets = u128::from(entry.tickets);
        if slot < tickets {
            return Ok(entry.member);
        }
        slot -= tickets;
    }

    // Unreachable: slot < total = sum of tickets
    Err(LotteryError::NoEligibleCandidates)
}
