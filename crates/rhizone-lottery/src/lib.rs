//! Custody Lottery and Admission Genealogy
//!
//! Who receives the admission token next is decided by a weighted lottery
//! over the members currently eligible. Weights favour members who have not
//! held or passed on the token recently and whose admission line is still
//! small.
//!
//! # Tickets
//!
//! For each eligible member:
//!
//! ```text
//! touch           = last grant the member took part in (either side)
//! effective_touch = max(touch, last grant they lapsed under)
//! bestowals       = grants where the member was custodian
//! descendants     = members admitted through their line
//!
//! tickets = max(touch) + max(bestowals) + max(descendants)
//!         - effective_touch - bestowals - descendants
//! ```
//!
//! Maxima range over the eligible set. Negative counts clamp to zero; a pool
//! where every count is zero follows the configured [`ZeroPoolPolicy`].
//!
//! # Genealogy
//!
//! Every redeemed grant whose grantee differs from its custodian is an edge
//! custodian → grantee. The edges form a forest: a member's own grants always
//! carry larger sequence ids than the grant that admitted them. Traversals
//! still keep a visited set so a corrupted ledger cannot loop them.
//!
//! All computations here are pure functions of a [`LedgerSnapshot`].
//!
//! [`LedgerSnapshot`]: rhizone_ledger::LedgerSnapshot

mod draw;
mod error;
mod genealogy;
mod tickets;

pub use draw::draw;
pub use error::{LotteryError, Result};
pub use genealogy::GenealogyIndex;
pub use tickets::{
    compute_entries, eligible_members, Candidate, LotteryEntry, TicketStats, ZeroPoolPolicy,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rhizone_ledger::{CustodyGrant, GrantId, LedgerSnapshot, MemberId};

    fn redeemed(id: u64, custodian: u64, grantee: u64) -> CustodyGrant {
        let mut grant = CustodyGrant::new(GrantId(id), MemberId(custodian), id);
        grant.grantee = Some(MemberId(grantee));
        grant.resolved_at = Some(id);
        grant
    }

    #[test]
    fn draw_from_ledger_history() {
        // 1 founded, admitted 2 and 3; 2 admitted 4. 1 held the last grant.
        let snapshot = LedgerSnapshot::new(
            vec![
                redeemed(1, 1, 1),
                redeemed(2, 1, 2),
                redeemed(3, 2, 4),
                redeemed(4, 1, 3),
            ],
            vec![],
        );
        let index = GenealogyIndex::from_snapshot(&snapshot);
        let candidates: Vec<_> = (1..=4)
            .map(|id| Candidate::member(MemberId(id), true))
            .collect();
        let eligible = eligible_members(&candidates, &snapshot);
        assert!(!eligible.contains(&MemberId(1)));

        let entries =
            compute_entries(&snapshot, &index, &eligible, ZeroPoolPolicy::Reject).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let winner = draw(&entries, &mut rng).unwrap();
        assert_ne!(winner, MemberId(1));
    }
}
