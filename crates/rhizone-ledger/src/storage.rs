//! Persistent ledger using RocksDB.
//!
//! Key layout:
//!
//! ```text
//! activity:{member}                 ActivityRecord
//! grant:{id:020}                    CustodyGrant
//! mark:{grant:020}:{member}         InactivityMark
//! meta:grant_seq                    last issued grant id
//! meta:suspension                   Suspension
//! ```
//!
//! Grant ids are zero-padded so prefix iteration yields sequence order.
//! Every operation touches one record, except `append_grant` which writes
//! the grant and the sequence counter in a single batch.

use crate::error::{LedgerError, Result};
use crate::models::{
    ActivityRecord, CustodyGrant, GrantId, InactivityMark, LedgerSnapshot, MemberId, Suspension,
    Timestamp,
};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

const GRANT_SEQ_KEY: &[u8] = b"meta:grant_seq";
const SUSPENSION_KEY: &[u8] = b"meta:suspension";

/// The custody ledger.
pub struct Ledger {
    db: DB,
}

impl Ledger {
    /// Open or create the ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    fn grant_key(id: GrantId) -> String {
        format!("grant:{}", id.sort_key())
    }

    fn put_grant(&self, grant: &CustodyGrant) -> Result<()> {
        let value = serde_json::to_vec(grant)?;
        self.db.put(Self::grant_key(grant.id).as_bytes(), value)?;
        Ok(())
    }

    // --- Activity ---

    /// Record that a member was seen. Latest write wins.
    pub fn upsert_activity(&self, member: MemberId, at: Timestamp) -> Result<()> {
        let key = format!("activity:{}", member);
        let value = serde_json::to_vec(&ActivityRecord {
            member,
            last_seen: at,
        })?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Last activity of a member.
    pub fn activity(&self, member: MemberId) -> Result<Option<ActivityRecord>> {
        self.get_json(format!("activity:{}", member).as_bytes())
    }

    /// All activity records.
    pub fn list_activity(&self) -> Result<Vec<ActivityRecord>> {
        self.scan_prefix(b"activity:")
    }

    // --- Grants ---

    /// Id of the most recently issued grant (0 if none).
    pub fn last_grant_id(&self) -> Result<u64> {
        match self.db.get(GRANT_SEQ_KEY)? {
            Some(data) => String::from_utf8_lossy(&data)
                .parse()
                .map_err(|_| LedgerError::Storage("Invalid grant sequence".into())),
            None => Ok(0),
        }
    }

    /// Get a grant by id.
    pub fn grant(&self, id: GrantId) -> Result<Option<CustodyGrant>> {
        self.get_json(Self::grant_key(id).as_bytes())
    }

    /// All grants in sequence order.
    pub fn list_grants(&self) -> Result<Vec<CustodyGrant>> {
        self.scan_prefix(b"grant:")
    }

    /// The most recently appended grant.
    pub fn most_recent_grant(&self) -> Result<Option<CustodyGrant>> {
        match self.last_grant_id()? {
            0 => Ok(None),
            id => self.grant(GrantId(id)),
        }
    }

    /// The open grant, if any.
    pub fn active_grant(&self) -> Result<Option<CustodyGrant>> {
        Ok(self.most_recent_grant()?.filter(|g| g.is_open()))
    }

    /// Custodian of the most recent grant.
    pub fn most_recent_custodian(&self) -> Result<Option<MemberId>> {
        Ok(self.most_recent_grant()?.map(|g| g.custodian))
    }

    /// Number of grants where the member was custodian.
    pub fn grant_count_by(&self, custodian: MemberId) -> Result<u64> {
        Ok(self
            .list_grants()?
            .iter()
            .filter(|g| g.custodian == custodian)
            .count() as u64)
    }

    fn insert_grant(&self, grant: &CustodyGrant) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(Self::grant_key(grant.id).as_bytes(), serde_json::to_vec(grant)?);
        batch.put(GRANT_SEQ_KEY, grant.id.0.to_string().as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    /// Open a new grant for `custodian`.
    ///
    /// Refused while another grant is open.
    pub fn append_grant(&self, custodian: MemberId, at: Timestamp) -> Result<GrantId> {
        if let Some(open) = self.active_grant()? {
            return Err(LedgerError::GrantOutstanding(open.id));
        }

        let id = GrantId(self.last_grant_id()? + 1);
        self.insert_grant(&CustodyGrant::new(id, custodian, at))?;
        info!("Appended grant #{} to custodian {}", id, custodian);
        Ok(id)
    }

    /// Record the founding member as a resolved self grant.
    ///
    /// Only legal on an empty ledger. Gives the founder an admission record
    /// without creating a genealogy edge.
    pub fn bootstrap(&self, founder: MemberId, at: Timestamp) -> Result<GrantId> {
        let existing = self.last_grant_id()?;
        if existing > 0 {
            return Err(LedgerError::AlreadyBootstrapped(existing));
        }

        let mut grant = CustodyGrant::new(GrantId(1), founder, at);
        grant.grantee = Some(founder);
        grant.resolved_at = Some(at);
        self.insert_grant(&grant)?;
        info!("Bootstrapped ledger with founder {}", founder);
        Ok(grant.id)
    }

    fn require_active(&self, id: GrantId) -> Result<CustodyGrant> {
        match self.active_grant()? {
            Some(grant) if grant.id == id => Ok(grant),
            _ => Err(LedgerError::GrantNotActive(id)),
        }
    }

    /// Redeem the active grant: `grantee` joined with its token.
    pub fn resolve_grant(&self, id: GrantId, grantee: MemberId, at: Timestamp) -> Result<()> {
        let mut grant = self.require_active(id)?;
        grant.grantee = Some(grantee);
        grant.resolved_at = Some(at);
        self.put_grant(&grant)?;
        info!("Resolved grant #{}: {} -> {}", id, grant.custodian, grantee);
        Ok(())
    }

    /// Close the active grant without a grantee (skip or lapse).
    pub fn close_grant(&self, id: GrantId, at: Timestamp) -> Result<()> {
        let mut grant = self.require_active(id)?;
        grant.resolved_at = Some(at);
        self.put_grant(&grant)?;
        info!("Closed grant #{} without grantee", id);
        Ok(())
    }

    /// Store the token code issued for the active grant.
    pub fn attach_token(&self, id: GrantId, token: &str) -> Result<()> {
        let mut grant = self.require_active(id)?;
        if grant.token.is_some() {
            return Err(LedgerError::TokenAlreadyAttached(id));
        }
        grant.token = Some(token.to_string());
        self.put_grant(&grant)
    }

    /// Mark the active grant's token as publicly released.
    ///
    /// Returns `false` if it was already released.
    pub fn mark_released(&self, id: GrantId, at: Timestamp) -> Result<bool> {
        let mut grant = match self.grant(id)? {
            Some(grant) => grant,
            None => return Err(LedgerError::GrantNotFound(id)),
        };

        if grant.released_at.is_some() {
            debug!("Grant #{} already released", id);
            return Ok(false);
        }
        if !grant.is_open() {
            return Err(LedgerError::GrantNotActive(id));
        }

        grant.released_at = Some(at);
        self.put_grant(&grant)?;
        Ok(true)
    }

    // --- Inactivity marks ---

    /// Record that `member` lapsed while `grant` was open.
    ///
    /// Returns `false` if the pair was already recorded.
    pub fn record_inactivity(&self, grant: GrantId, member: MemberId) -> Result<bool> {
        let key = format!("mark:{}:{}", grant.sort_key(), member);
        if self.db.get(key.as_bytes())?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_vec(&InactivityMark { grant, member })?;
        self.db.put(key.as_bytes(), value)?;
        debug!("Recorded inactivity of {} under grant #{}", member, grant);
        Ok(true)
    }

    /// All inactivity marks in grant order.
    pub fn list_marks(&self) -> Result<Vec<InactivityMark>> {
        self.scan_prefix(b"mark:")
    }

    // --- Genealogy edges ---

    /// Members admitted by `member`, most recent first.
    pub fn children_of(&self, member: MemberId) -> Result<Vec<(GrantId, MemberId)>> {
        let mut children: Vec<_> = self
            .list_grants()?
            .iter()
            .filter_map(|g| match g.edge() {
                Some((custodian, grantee)) if custodian == member => Some((g.id, grantee)),
                _ => None,
            })
            .collect();
        children.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(children)
    }

    /// The grant that admitted `member`, with its custodian.
    pub fn parent_of(&self, member: MemberId) -> Result<Option<(GrantId, MemberId)>> {
        let mut parents = self.list_grants()?.into_iter().filter_map(|g| match g.edge() {
            Some((custodian, grantee)) if grantee == member => Some((g.id, custodian)),
            _ => None,
        });
        let parent = parents.next();
        if parents.next().is_some() {
            warn!("Member {} has more than one admitting grant", member);
        }
        Ok(parent)
    }

    /// Members holding a grantee record.
    pub fn admitted_members(&self) -> Result<HashSet<MemberId>> {
        Ok(self.list_grants()?.iter().filter_map(|g| g.grantee).collect())
    }

    /// Grants and marks in one pass.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        Ok(LedgerSnapshot::new(self.list_grants()?, self.list_marks()?))
    }

    // --- Suspension ---

    /// Current suspension, if automatic succession is halted.
    pub fn suspension(&self) -> Result<Option<Suspension>> {
        self.get_json(SUSPENSION_KEY)
    }

    /// Halt automatic succession.
    pub fn set_suspension(&self, reason: &str, at: Timestamp) -> Result<()> {
        let value = serde_json::to_vec(&Suspension {
            reason: reason.to_string(),
            since: at,
        })?;
        self.db.put(SUSPENSION_KEY, value)?;
        Ok(())
    }

    /// Resume automatic succession.
    pub fn clear_suspension(&self) -> Result<()> {
        self.db.delete(SUSPENSION_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, Ledger) {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn activity_latest_write_wins() {
        let (_dir, ledger) = open();
        ledger.upsert_activity(MemberId(1), 100).unwrap();
        ledger.upsert_activity(MemberId(1), 50).unwrap();
        ledger.upsert_activity(MemberId(2), 70).unwrap();

        assert_eq!(ledger.activity(MemberId(1)).unwrap().unwrap().last_seen, 50);
        assert_eq!(ledger.list_activity().unwrap().len(), 2);
        assert!(ledger.activity(MemberId(3)).unwrap().is_none());
    }

    #[test]
    fn grant_ids_are_sequential() {
        let (_dir, ledger) = open();
        assert_eq!(ledger.bootstrap(MemberId(1), 10).unwrap(), GrantId(1));
        let second = ledger.append_grant(MemberId(1), 20).unwrap();
        assert_eq!(second, GrantId(2));
        ledger.resolve_grant(second, MemberId(2), 30).unwrap();
        assert_eq!(ledger.append_grant(MemberId(2), 40).unwrap(), GrantId(3));
        assert_eq!(ledger.last_grant_id().unwrap(), 3);
    }

    #[test]
    fn second_open_grant_refused() {
        let (_dir, ledger) = open();
        let first = ledger.append_grant(MemberId(1), 10).unwrap();
        let err = ledger.append_grant(MemberId(2), 20).unwrap_err();
        assert!(matches!(err, LedgerError::GrantOutstanding(id) if id == first));
    }

    #[test]
    fn resolve_only_active_grant() {
        let (_dir, ledger) = open();
        let first = ledger.append_grant(MemberId(1), 10).unwrap();
        ledger.resolve_grant(first, MemberId(2), 20).unwrap();

        let again = ledger.resolve_grant(first, MemberId(3), 30).unwrap_err();
        assert!(matches!(again, LedgerError::GrantNotActive(_)));
        let grant = ledger.grant(first).unwrap().unwrap();
        assert_eq!(grant.grantee, Some(MemberId(2)));
        assert_eq!(grant.resolved_at, Some(20));
    }

    #[test]
    fn bootstrap_only_on_empty_ledger() {
        let (_dir, ledger) = open();
        ledger.append_grant(MemberId(1), 10).unwrap();
        assert!(matches!(
            ledger.bootstrap(MemberId(1), 20),
            Err(LedgerError::AlreadyBootstrapped(1))
        ));
    }

    #[test]
    fn close_leaves_no_grantee() {
        let (_dir, ledger) = open();
        let id = ledger.append_grant(MemberId(1), 10).unwrap();
        ledger.close_grant(id, 15).unwrap();
        let grant = ledger.grant(id).unwrap().unwrap();
        assert!(!grant.is_open());
        assert_eq!(grant.grantee, None);
        assert!(ledger.active_grant().unwrap().is_none());
        assert!(ledger.admitted_members().unwrap().is_empty());
    }

    #[test]
    fn release_is_idempotent() {
        let (_dir, ledger) = open();
        let id = ledger.append_grant(MemberId(1), 10).unwrap();
        assert!(ledger.mark_released(id, 100).unwrap());
        assert!(!ledger.mark_released(id, 200).unwrap());
        assert_eq!(ledger.grant(id).unwrap().unwrap().released_at, Some(100));
    }

    #[test]
    fn token_attached_once() {
        let (_dir, ledger) = open();
        let id = ledger.append_grant(MemberId(1), 10).unwrap();
        ledger.attach_token(id, "abc").unwrap();
        assert!(matches!(
            ledger.attach_token(id, "def"),
            Err(LedgerError::TokenAlreadyAttached(_))
        ));
        assert_eq!(ledger.grant(id).unwrap().unwrap().token.as_deref(), Some("abc"));
    }

    #[test]
    fn inactivity_marks_are_unique() {
        let (_dir, ledger) = open();
        let id = ledger.append_grant(MemberId(1), 10).unwrap();
        assert!(ledger.record_inactivity(id, MemberId(4)).unwrap());
        assert!(!ledger.record_inactivity(id, MemberId(4)).unwrap());
        assert!(ledger.record_inactivity(id, MemberId(5)).unwrap());
        assert_eq!(ledger.list_marks().unwrap().len(), 2);
    }

    #[test]
    fn edges_and_counts() {
        let (_dir, ledger) = open();
        ledger.bootstrap(MemberId(1), 0).unwrap();
        for (custodian, grantee) in [(1, 2), (2, 3), (1, 4)] {
            let id = ledger.append_grant(MemberId(custodian), 10).unwrap();
            ledger.resolve_grant(id, MemberId(grantee), 20).unwrap();
        }

        let children = ledger.children_of(MemberId(1)).unwrap();
        assert_eq!(children, vec![(GrantId(4), MemberId(4)), (GrantId(2), MemberId(2))]);
        assert_eq!(ledger.parent_of(MemberId(3)).unwrap(), Some((GrantId(3), MemberId(2))));
        assert_eq!(ledger.parent_of(MemberId(1)).unwrap(), None);
        assert_eq!(ledger.grant_count_by(MemberId(1)).unwrap(), 3);
        assert_eq!(ledger.most_recent_custodian().unwrap(), Some(MemberId(1)));
    }

    #[test]
    fn suspension_roundtrip() {
        let (_dir, ledger) = open();
        assert!(ledger.suspension().unwrap().is_none());
        ledger.set_suspension("ambiguous", 99).unwrap();
        let suspension = ledger.suspension().unwrap().unwrap();
        assert_eq!(suspension.reason, "ambiguous");
        ledger.clear_suspension().unwrap();
        assert!(ledger.suspension().unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger.append_grant(MemberId(9), 10).unwrap();
        }
        let ledger = Ledger::open(dir.path()).unwrap();
        let active = ledger.active_grant().unwrap().unwrap();
        assert_eq!(active.custodian, MemberId(9));
    }
}
