//! Admission genealogy: custodian → grantee edges.

use rhizone_ledger::{GrantId, LedgerSnapshot, MemberId};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Ancestor/descendant index over redeemed grants.
///
/// Built once per snapshot. Self grants and grants closed without a grantee
/// contribute no edge.
#[derive(Debug, Clone, Default)]
pub struct GenealogyIndex {
    /// Children per member, most recent grant first.
    children: HashMap<MemberId, Vec<(GrantId, MemberId)>>,
    /// The grant that admitted each member, with its custodian.
    parents: HashMap<MemberId, (GrantId, MemberId)>,
}

impl GenealogyIndex {
    /// Index every custodian → grantee edge in the snapshot.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Self {
        Self::from_edges(snapshot.grants.iter().filter_map(|g| {
            g.edge()
                .map(|(custodian, grantee)| (g.id, custodian, grantee))
        }))
    }

    /// Index raw `(grant, parent, child)` edges.
    ///
    /// A child with several admitting grants keeps the earliest.
    pub fn from_edges(edges: impl IntoIterator<Item = (GrantId, MemberId, MemberId)>) -> Self {
        let mut index = Self::default();

        for (grant, parent, child) in edges {
            index
                .children
                .entry(parent)
                .or_default()
                .push((grant, child));

            match index.parents.get(&child) {
                Some((existing, _)) if *existing <= grant => {
                    warn!(
                        "Member {} admitted twice (grants #{} and #{}), keeping the first",
                        child, existing, grant
                    );
                }
                _ => {
                    index.parents.insert(child, (grant, parent));
                }
            }
        }

        for list in index.children.values_mut() {
            list.sort_by(|a, b| b.0.cmp(&a.0));
        }

        index
    }

    /// Members admitted directly by `member`, most recent first.
    pub fn children_of(&self, member: MemberId) -> &[(GrantId, MemberId)] {
        self.children
            .get(&member)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The grant that admitted `member` and its custodian.
    pub fn parent_of(&self, member: MemberId) -> Option<(GrantId, MemberId)> {
        self.parents.get(&member).copied()
    }

    /// Number of members reachable below `member`.
    pub fn progeny_count(&self, member: MemberId) -> u64 {
        let mut visited = HashSet::from([member]);
        let mut stack = vec![member];
        let mut count = 0;

        while let Some(current) = stack.pop() {
            for &(_, child) in self.children_of(current) {
                if visited.insert(child) {
                    count += 1;
                    stack.push(child);
                }
            }
        }

        count
    }

    /// Every member below `member` with its depth, breadth-first.
    pub fn descendants_of(&self, member: MemberId) -> Vec<(MemberId, usize)> {
        let mut visited = HashSet::from([member]);
        let mut queue = VecDeque::from([(member, 0usize)]);
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            for &(_, child) in self.children_of(current) {
                if visited.insert(child) {
                    out.push((child, depth + 1));
                    queue.push_back((child, depth + 1));
                }
            }
        }

        out
    }

    /// Path from the root of `member`'s line down to `member` itself.
    pub fn lineage_of(&self, member: MemberId) -> Vec<MemberId> {
        let mut visited = HashSet::from([member]);
        let mut line = vec![member];
        let mut current = member;

        while let Some((_, parent)) = self.parent_of(current) {
            if !visited.insert(parent) {
                warn!("Cycle in admission genealogy at member {}", parent);
                break;
            }
            line.push(parent);
            current = parent;
        }

        line.reverse();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhizone_ledger::CustodyGrant;

    fn chain() -> GenealogyIndex {
        // A(1) -> B(2) -> C(3) -> D(4)
        GenealogyIndex::from_edges([
            (GrantId(2), MemberId(1), MemberId(2)),
            (GrantId(3), MemberId(2), MemberId(3)),
            (GrantId(4), MemberId(3), MemberId(4)),
        ])
    }

    #[test]
    fn four_generation_progeny() {
        let index = chain();
        assert_eq!(index.progeny_count(MemberId(1)), 3);
        assert_eq!(index.progeny_count(MemberId(2)), 2);
        assert_eq!(index.progeny_count(MemberId(3)), 1);
        assert_eq!(index.progeny_count(MemberId(4)), 0);
    }

    #[test]
    fn four_generation_lineage() {
        let index = chain();
        assert_eq!(
            index.lineage_of(MemberId(4)),
            vec![MemberId(1), MemberId(2), MemberId(3), MemberId(4)]
        );
        assert_eq!(index.lineage_of(MemberId(1)), vec![MemberId(1)]);
    }

    #[test]
    fn unknown_member_is_its_own_line() {
        let index = chain();
        assert_eq!(index.lineage_of(MemberId(99)), vec![MemberId(99)]);
        assert_eq!(index.progeny_count(MemberId(99)), 0);
        assert!(index.children_of(MemberId(99)).is_empty());
    }

    #[test]
    fn children_most_recent_first() {
        let index = GenealogyIndex::from_edges([
            (GrantId(2), MemberId(1), MemberId(2)),
            (GrantId(5), MemberId(1), MemberId(5)),
            (GrantId(3), MemberId(1), MemberId(3)),
        ]);
        let children: Vec<_> = index.children_of(MemberId(1)).iter().map(|c| c.0).collect();
        assert_eq!(children, vec![GrantId(5), GrantId(3), GrantId(2)]);
    }

    #[test]
    fn descendants_carry_depth() {
        let index = GenealogyIndex::from_edges([
            (GrantId(2), MemberId(1), MemberId(2)),
            (GrantId(3), MemberId(1), MemberId(3)),
            (GrantId(4), MemberId(2), MemberId(4)),
        ]);
        let descendants = index.descendants_of(MemberId(1));
        assert_eq!(descendants.len(), 3);
        assert!(descendants.contains(&(MemberId(4), 2)));
        assert!(descendants.contains(&(MemberId(3), 1)));
    }

    #[test]
    fn cyclic_edges_terminate() {
        let index = GenealogyIndex::from_edges([
            (GrantId(2), MemberId(1), MemberId(2)),
            (GrantId(3), MemberId(2), MemberId(3)),
            (GrantId(4), MemberId(3), MemberId(1)),
        ]);
        assert_eq!(index.progeny_count(MemberId(1)), 2);
        assert_eq!(index.descendants_of(MemberId(2)).len(), 2);
        let line = index.lineage_of(MemberId(3));
        assert_eq!(line.len(), 3);
        assert_eq!(line.last(), Some(&MemberId(3)));
    }

    #[test]
    fn self_and_closed_grants_make_no_edges() {
        let mut founder = CustodyGrant::new(GrantId(1), MemberId(1), 0);
        founder.grantee = Some(MemberId(1));
        founder.resolved_at = Some(0);
        let mut skipped = CustodyGrant::new(GrantId(2), MemberId(1), 10);
        skipped.resolved_at = Some(20);
        let open = CustodyGrant::new(GrantId(3), MemberId(1), 30);

        let snapshot = LedgerSnapshot::new(vec![founder, skipped, open], vec![]);
        let index = GenealogyIndex::from_snapshot(&snapshot);
        assert_eq!(index.progeny_count(MemberId(1)), 0);
        assert_eq!(index.parent_of(MemberId(1)), None);
    }

    #[test]
    fn deep_chain_is_iterative() {
        let edges = (1..50_000u64).map(|i| (GrantId(i + 1), MemberId(i), MemberId(i + 1)));
        let index = GenealogyIndex::from_edges(edges);
        assert_eq!(index.progeny_count(MemberId(1)), 49_999);
        assert_eq!(index.lineage_of(MemberId(50_000)).len(), 50_000);
    }
}
