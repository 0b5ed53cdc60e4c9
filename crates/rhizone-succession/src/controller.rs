//! Succession controller - the custody state machine.
//!
//! ```text
//!            draw                      resolve / skip
//!   Idle ───────────▶ Granted ──────────────────────────▶ Idle ─▶ draw
//!                       │  ▲
//!                       └──┘ timeout release (side effect only)
//!
//!   any ──anomaly──▶ Suspended ──operator clear──▶ Idle | Granted
//! ```
//!
//! The in-memory state only moves after the ledger write backing it has
//! succeeded, and is re-derived from the ledger on load. Platform calls that
//! follow a persisted write are best effort: a failure is logged and alerted
//! and the next audit tick repairs the platform side.

use crate::config::SuccessionConfig;
use crate::error::{Error, Result};
use crate::notice::Notice;
use crate::platform::{Capability, Member, MembershipPlatform, NotificationSink};
use crate::queries::{StatsDetail, StatsReport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rhizone_ledger::{GrantId, Ledger, LedgerSnapshot, MemberId, Timestamp};
use rhizone_lottery::{
    compute_entries, draw, eligible_members, Candidate, GenealogyIndex, LotteryEntry,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The single authoritative succession state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SuccessionState {
    /// No open grant
    Idle,
    /// One open grant awaiting resolution, skip or release
    Granted { grant: GrantId, custodian: MemberId },
    /// Automatic succession disabled pending manual review
    Suspended { reason: String },
}

impl SuccessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Granted { .. } => "granted",
            Self::Suspended { .. } => "suspended",
        }
    }

    /// The open grant, when in `Granted`.
    pub fn active_grant(&self) -> Option<GrantId> {
        match self {
            Self::Granted { grant, .. } => Some(*grant),
            _ => None,
        }
    }

    /// Read the state the ledger implies.
    pub fn derive(ledger: &Ledger) -> Result<Self> {
        if let Some(suspension) = ledger.suspension()? {
            return Ok(Self::Suspended {
                reason: suspension.reason,
            });
        }
        Ok(match ledger.active_grant()? {
            Some(grant) => Self::Granted {
                grant: grant.id,
                custodian: grant.custodian,
            },
            None => Self::Idle,
        })
    }
}

impl std::fmt::Display for SuccessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scoped in-progress marker for draws.
///
/// Acquisition fails while another guard is alive; dropping the guard
/// releases it on every exit path.
#[derive(Debug)]
pub struct DrawGuard {
    flag: Arc<AtomicBool>,
}

impl DrawGuard {
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::DrawInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for DrawGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A successful draw.
#[derive(Debug, Clone, Serialize)]
pub struct DrawOutcome {
    pub grant: GrantId,
    pub custodian: MemberId,
    pub token: String,
    pub entries: Vec<LotteryEntry>,
}

/// A redeemed grant and the draw that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub grant: GrantId,
    pub custodian: MemberId,
    pub grantee: MemberId,
    pub next: Option<DrawOutcome>,
}

/// A skipped grant and the draw that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct SkipOutcome {
    pub grant: GrantId,
    pub custodian: MemberId,
    pub next: Option<DrawOutcome>,
}

/// Orchestrates grant → resolution / skip / release → next grant.
pub struct SuccessionController {
    ledger: Arc<Ledger>,
    platform: Arc<dyn MembershipPlatform>,
    notifier: Arc<dyn NotificationSink>,
    config: SuccessionConfig,
    state: SuccessionState,
    drawing: Arc<AtomicBool>,
    rng: StdRng,
    last_alert: Option<String>,
    draw_attempts: u64,
}

impl SuccessionController {
    /// Create a controller, deriving its state from the ledger.
    pub fn load(
        ledger: Arc<Ledger>,
        platform: Arc<dyn MembershipPlatform>,
        notifier: Arc<dyn NotificationSink>,
        config: SuccessionConfig,
    ) -> Result<Self> {
        let state = SuccessionState::derive(&ledger)?;
        info!("Succession controller loaded in state {}", state);
        Ok(Self {
            ledger,
            platform,
            notifier,
            config,
            state,
            drawing: Arc::new(AtomicBool::new(false)),
            rng: StdRng::from_entropy(),
            last_alert: None,
            draw_attempts: 0,
        })
    }

    /// Use a deterministic random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &SuccessionState {
        &self.state
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn platform(&self) -> &Arc<dyn MembershipPlatform> {
        &self.platform
    }

    /// Draws started since load, successful or not.
    pub fn draw_attempts(&self) -> u64 {
        self.draw_attempts
    }

    /// Shared in-progress flag guarding draws.
    pub fn draw_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.drawing)
    }

    // --- Notifications ---

    async fn notify(&self, notice: Notice) {
        let text = notice.to_string();
        if let Some(member) = notice.recipient() {
            self.notifier.send_to(member, &text).await;
        } else if notice.is_public() {
            self.notifier.send_public(&text).await;
        } else {
            self.notifier.send_private(&text).await;
        }
    }

    /// Private alert, collapsed when identical to the previous one.
    async fn alert(&mut self, text: String) {
        if self.last_alert.as_deref() == Some(text.as_str()) {
            debug!("Suppressing repeated alert: {}", text);
            return;
        }
        self.notify(Notice::Alert(text.clone())).await;
        self.last_alert = Some(text);
    }

    async fn retire_token(&self, token: Option<String>) {
        if let Some(code) = token {
            if let Err(e) = self.platform.revoke_token(&code).await {
                warn!("Failed to revoke token {}: {}", code, e);
            }
        }
    }

    async fn drop_custodian(&self, member: MemberId) {
        if let Err(e) = self
            .platform
            .revoke_capability(member, Capability::Custodian)
            .await
        {
            warn!("Failed to revoke custodian capability from {}: {}", member, e);
        }
    }

    fn require_granted(&self) -> Result<(GrantId, MemberId)> {
        match &self.state {
            SuccessionState::Granted { grant, custodian } => Ok((*grant, *custodian)),
            SuccessionState::Suspended { reason } => Err(Error::Suspended(reason.clone())),
            SuccessionState::Idle => Err(Error::InvalidState {
                expected: "granted",
                actual: "idle",
            }),
        }
    }

    fn token_of(&self, grant: GrantId) -> Result<Option<String>> {
        Ok(self.ledger.grant(grant)?.and_then(|g| g.token))
    }

    // --- Lottery ---

    fn lottery_entries(
        &self,
        snapshot: &LedgerSnapshot,
        members: &[Member],
    ) -> Result<Vec<LotteryEntry>> {
        let index = GenealogyIndex::from_snapshot(snapshot);
        let candidates: Vec<Candidate> = members.iter().map(Member::candidate).collect();
        let eligible = eligible_members(&candidates, snapshot);
        Ok(compute_entries(
            snapshot,
            &index,
            &eligible,
            self.config.zero_pool,
        )?)
    }

    // --- Transitions ---

    /// Idle → Granted.
    pub async fn draw(&mut self, now: Timestamp) -> Result<DrawOutcome> {
        match &self.state {
            SuccessionState::Idle => {}
            SuccessionState::Granted { .. } => {
                return Err(Error::InvalidState {
                    expected: "idle",
                    actual: "granted",
                })
            }
            SuccessionState::Suspended { reason } => return Err(Error::Suspended(reason.clone())),
        }

        let _guard = DrawGuard::acquire(&self.drawing)?;
        self.draw_attempts += 1;

        let members = self.platform.list_members().await?;
        for member in members.iter().filter(|m| m.has(Capability::Custodian)) {
            self.platform
                .revoke_capability(member.id, Capability::Custodian)
                .await?;
            debug!("Revoked leftover custodian capability from {}", member.id);
        }

        let snapshot = self.ledger.snapshot()?;
        let entries = self.lottery_entries(&snapshot, &members)?;
        let custodian = draw(&entries, &mut self.rng)?;

        let grant = self.ledger.append_grant(custodian, now)?;
        self.state = SuccessionState::Granted { grant, custodian };

        let token = self.platform.create_token(self.config.token_ttl).await?;
        self.ledger.attach_token(grant, &token.code)?;
        self.platform
            .grant_capability(custodian, Capability::Custodian)
            .await?;

        info!("Drew custodian {} for grant #{}", custodian, grant);
        self.notify(Notice::NewCustodian { grant, custodian }).await;
        self.notify(Notice::CustodyToken {
            grant,
            custodian,
            token: token.code.clone(),
        })
        .await;
        self.last_alert = None;

        Ok(DrawOutcome {
            grant,
            custodian,
            token: token.code,
            entries,
        })
    }

    /// Draw, alerting instead of failing on recoverable errors.
    ///
    /// Every failure is alerted; only non-recoverable ones are returned.
    pub async fn attempt_draw(&mut self, now: Timestamp) -> Result<Option<DrawOutcome>> {
        match self.draw(now).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_recoverable() => {
                warn!("Draw skipped: {}", e);
                self.alert(format!("Draw skipped: {}", e)).await;
                Ok(None)
            }
            Err(e) => {
                error!("Draw failed in state {}: {}", self.state, e);
                self.alert(format!("Draw failed: {}", e)).await;
                Err(e)
            }
        }
    }

    /// Granted → Idle: `grantee` joined with the token. Draws again.
    pub async fn resolve(&mut self, grantee: MemberId, now: Timestamp) -> Result<Resolution> {
        let (grant, custodian) = self.require_granted()?;
        let token = self.token_of(grant)?;

        self.ledger.resolve_grant(grant, grantee, now)?;
        self.state = SuccessionState::Idle;

        self.retire_token(token).await;
        self.drop_custodian(custodian).await;
        self.notify(Notice::Welcome {
            grant,
            custodian,
            grantee,
        })
        .await;

        let next = self.attempt_draw(now).await.ok().flatten();
        Ok(Resolution {
            grant,
            custodian,
            grantee,
            next,
        })
    }

    /// Granted → Idle: the custodian passes. Draws again.
    pub async fn skip(&mut self, requester: MemberId, now: Timestamp) -> Result<SkipOutcome> {
        let (grant, custodian) = self.require_granted()?;
        if requester != custodian {
            return Err(Error::NotCustodian { requester });
        }
        let token = self.token_of(grant)?;

        self.ledger.close_grant(grant, now)?;
        self.state = SuccessionState::Idle;

        self.retire_token(token).await;
        self.drop_custodian(custodian).await;
        info!("Custodian {} skipped grant #{}", custodian, grant);
        self.notify(Notice::Abstained { grant, custodian }).await;

        let next = self.attempt_draw(now).await.ok().flatten();
        Ok(SkipOutcome {
            grant,
            custodian,
            next,
        })
    }

    /// Publish the open grant's token. Returns `false` if nothing changed.
    pub async fn release(&mut self, now: Timestamp) -> Result<bool> {
        let (grant, _) = self.require_granted()?;
        let Some(token) = self.token_of(grant)? else {
            warn!("Grant #{} has no token to release", grant);
            return Ok(false);
        };

        if !self.ledger.mark_released(grant, now)? {
            return Ok(false);
        }
        info!("Released token of grant #{}", grant);
        self.notify(Notice::Released { grant, token }).await;
        Ok(true)
    }

    /// Close a stale open grant and draw afresh.
    ///
    /// Used when no outstanding token backs the active grant (expired,
    /// never issued, or lost to a restart mid-draw).
    pub async fn force_draw(&mut self, now: Timestamp) -> Result<Option<DrawOutcome>> {
        match self.state.clone() {
            SuccessionState::Suspended { reason } => return Err(Error::Suspended(reason)),
            SuccessionState::Granted { grant, custodian } => {
                let token = self.token_of(grant)?;
                self.ledger.close_grant(grant, now)?;
                self.state = SuccessionState::Idle;
                self.retire_token(token).await;
                self.drop_custodian(custodian).await;
                info!("Grant #{} lapsed without a live token", grant);
            }
            SuccessionState::Idle => {}
        }
        self.attempt_draw(now).await
    }

    /// Any → Suspended. Returns `false` if already suspended.
    pub async fn suspend(&mut self, reason: &str, now: Timestamp) -> Result<bool> {
        if matches!(self.state, SuccessionState::Suspended { .. }) {
            return Ok(false);
        }
        self.ledger.set_suspension(reason, now)?;
        self.state = SuccessionState::Suspended {
            reason: reason.to_string(),
        };
        error!("Succession suspended: {}", reason);
        self.notify(Notice::Suspended {
            reason: reason.to_string(),
        })
        .await;
        Ok(true)
    }

    /// Suspended → Idle | Granted, by operator decision.
    pub async fn clear_suspension(&mut self) -> Result<bool> {
        if !matches!(self.state, SuccessionState::Suspended { .. }) {
            return Ok(false);
        }
        self.ledger.clear_suspension()?;
        self.state = SuccessionState::derive(&self.ledger)?;
        self.last_alert = None;
        info!("Suspension cleared, now {}", self.state);
        self.notify(Notice::Resumed).await;
        Ok(true)
    }

    /// A member joined the community.
    ///
    /// Bots, exempt identities, strangers and previously admitted members are
    /// ignored. Outside `Granted` the join is left for the auditor to
    /// reconcile.
    pub async fn on_member_joined(
        &mut self,
        member: MemberId,
        now: Timestamp,
    ) -> Result<Option<Resolution>> {
        match self.platform.member(member).await? {
            Some(m) if !m.bot => {}
            _ => {
                debug!("Ignoring join of non-member identity {}", member);
                return Ok(None);
            }
        }
        if self.config.exempt.contains(&member) {
            debug!("Ignoring join of exempt identity {}", member);
            return Ok(None);
        }
        if self.ledger.admitted_members()?.contains(&member) {
            debug!("Member {} rejoined; already admitted", member);
            return Ok(None);
        }
        if !matches!(self.state, SuccessionState::Granted { .. }) {
            info!("Member {} joined while {}; leaving to audit", member, self.state);
            return Ok(None);
        }
        self.resolve(member, now).await.map(Some)
    }

    // --- Queries ---

    /// Current standings.
    pub async fn stats(&self, detail: StatsDetail) -> Result<StatsReport> {
        let members = self.platform.list_members().await?;
        let snapshot = self.ledger.snapshot()?;

        let mut entries = match self.lottery_entries(&snapshot, &members) {
            Ok(entries) => entries,
            Err(e) if e.is_recoverable() => Vec::new(),
            Err(e) => return Err(e),
        };
        let eligible = entries.len();
        entries.sort_by(|a, b| b.tickets.cmp(&a.tickets).then(a.member.cmp(&b.member)));
        if detail == StatsDetail::Summary {
            entries.clear();
        }

        Ok(StatsReport {
            state: self.state.clone(),
            active_grant: snapshot.active_grant().cloned(),
            total_grants: snapshot.grants.len() as u64,
            admitted: snapshot.admitted().len(),
            eligible,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MemoryPlatform, RecordingSink};
    use rhizone_ledger::LedgerError;
    use rhizone_lottery::{LotteryError, ZeroPoolPolicy};
    use tempfile::tempdir;

    struct Harness {
        _dir: tempfile::TempDir,
        ledger: Arc<Ledger>,
        platform: Arc<MemoryPlatform>,
        sink: Arc<RecordingSink>,
        controller: SuccessionController,
    }

    async fn harness(active: &[u64], founder: u64) -> Harness {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        ledger.bootstrap(MemberId(founder), 0).unwrap();

        let platform = Arc::new(MemoryPlatform::new());
        platform.set_clock(1_000).await;
        platform
            .add_member(Member::new(MemberId(founder), "founder", 0).with_capability(Capability::Active))
            .await;
        for &id in active {
            platform
                .add_member(Member::new(MemberId(id), format!("m{}", id), 0).with_capability(Capability::Active))
                .await;
        }
        let sink = Arc::new(RecordingSink::new());

        let controller = SuccessionController::load(
            Arc::clone(&ledger),
            platform.clone(),
            sink.clone(),
            SuccessionConfig::default(),
        )
        .unwrap()
        .with_seed(5);

        Harness {
            _dir: dir,
            ledger,
            platform,
            sink,
            controller,
        }
    }

    #[tokio::test]
    async fn draw_grants_custody() {
        let mut h = harness(&[2, 3], 1).await;
        let outcome = h.controller.draw(1_000).await.unwrap();

        assert_ne!(outcome.custodian, MemberId(1));
        assert_eq!(outcome.grant, GrantId(2));
        assert_eq!(
            h.controller.state(),
            &SuccessionState::Granted {
                grant: GrantId(2),
                custodian: outcome.custodian
            }
        );
        let stored = h.ledger.grant(GrantId(2)).unwrap().unwrap();
        assert_eq!(stored.token.as_deref(), Some(outcome.token.as_str()));
        assert_eq!(
            h.platform.holders_of(Capability::Custodian).await,
            vec![outcome.custodian]
        );

        let public = h.sink.public().await;
        assert_eq!(public.len(), 1);
        assert!(!public[0].contains(&outcome.token));
        let direct = h.sink.direct().await;
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].0, outcome.custodian);
        assert!(direct[0].1.contains(&outcome.token));
    }

    #[tokio::test]
    async fn draw_never_repeats_last_custodian() {
        for seed in 0..20 {
            let mut h = harness(&[2, 3], 1).await;
            h.controller = h.controller.with_seed(seed);
            let first = h.controller.draw(1_000).await.unwrap();
            let second = h
                .controller
                .skip(first.custodian, 1_001)
                .await
                .unwrap()
                .next
                .unwrap();
            assert_ne!(second.custodian, first.custodian);
        }
    }

    #[tokio::test]
    async fn no_candidates_leaves_idle() {
        let mut h = harness(&[], 1).await;
        let err = h.controller.draw(1_000).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Lottery(LotteryError::NoEligibleCandidates)
        ));
        assert_eq!(h.controller.state(), &SuccessionState::Idle);
        assert_eq!(h.ledger.last_grant_id().unwrap(), 1);
        assert_eq!(h.platform.issued_tokens().await, 0);
    }

    #[tokio::test]
    async fn repeated_no_candidate_alerts_collapse() {
        let mut h = harness(&[], 1).await;
        assert!(h.controller.attempt_draw(1_000).await.unwrap().is_none());
        assert!(h.controller.attempt_draw(1_060).await.unwrap().is_none());
        assert_eq!(h.sink.private().await.len(), 1);
    }

    #[tokio::test]
    async fn rejecting_zero_pool_blocks_draw() {
        let mut h = harness(&[2, 3], 1).await;
        h.controller.config.zero_pool = ZeroPoolPolicy::Reject;
        assert!(h.controller.draw(1_000).await.is_err());
        assert_eq!(h.controller.state(), &SuccessionState::Idle);
    }

    #[tokio::test]
    async fn draw_guard_blocks_reentry() {
        let mut h = harness(&[2, 3], 1).await;
        let flag = h.controller.draw_flag();
        let held = DrawGuard::acquire(&flag).unwrap();
        assert!(matches!(
            h.controller.draw(1_000).await,
            Err(Error::DrawInProgress)
        ));
        assert_eq!(h.controller.state(), &SuccessionState::Idle);
        drop(held);
        assert!(h.controller.draw(1_000).await.is_ok());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn guard_released_after_failed_draw() {
        let mut h = harness(&[], 1).await;
        assert!(h.controller.draw(1_000).await.is_err());
        assert!(DrawGuard::acquire(&h.controller.draw_flag()).is_ok());
    }

    #[tokio::test]
    async fn resolve_in_idle_is_rejected_without_mutation() {
        let mut h = harness(&[2, 3], 1).await;
        let before = h.ledger.snapshot().unwrap();
        let err = h.controller.resolve(MemberId(9), 1_000).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(h.ledger.snapshot().unwrap(), before);
        assert_eq!(h.controller.draw_attempts(), 0);
    }

    #[tokio::test]
    async fn resolve_then_exactly_one_draw() {
        let mut h = harness(&[2, 3], 1).await;
        let first = h.controller.draw(1_000).await.unwrap();
        h.platform
            .add_member(Member::new(MemberId(4), "new", 1_100))
            .await;

        let resolution = h.controller.resolve(MemberId(4), 1_100).await.unwrap();
        assert_eq!(resolution.grantee, MemberId(4));
        assert_eq!(resolution.custodian, first.custodian);
        assert_eq!(h.controller.draw_attempts(), 2);

        let next = resolution.next.unwrap();
        assert_eq!(next.grant, GrantId(3));
        assert_eq!(h.ledger.last_grant_id().unwrap(), 3);
        let resolved = h.ledger.grant(first.grant).unwrap().unwrap();
        assert_eq!(resolved.grantee, Some(MemberId(4)));
        // Old token revoked, new one live
        let live = h.platform.list_outstanding_tokens().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].code, next.token);
    }

    #[tokio::test]
    async fn resolve_with_empty_pool_ends_idle() {
        let mut h = harness(&[2], 1).await;
        let first = h.controller.draw(1_000).await.unwrap();
        assert_eq!(first.custodian, MemberId(2));
        h.platform
            .add_member(Member::new(MemberId(4), "new", 1_100))
            .await;
        h.platform
            .revoke_capability(MemberId(1), Capability::Active)
            .await
            .unwrap();

        // Only 2 is active and 2 just held custody
        let resolution = h.controller.resolve(MemberId(4), 1_100).await.unwrap();
        assert!(resolution.next.is_none());
        assert_eq!(h.controller.state(), &SuccessionState::Idle);
        assert_eq!(h.controller.draw_attempts(), 2);
    }

    #[tokio::test]
    async fn only_custodian_may_skip() {
        let mut h = harness(&[2, 3], 1).await;
        let first = h.controller.draw(1_000).await.unwrap();
        let other = if first.custodian == MemberId(2) {
            MemberId(3)
        } else {
            MemberId(2)
        };

        let err = h.controller.skip(other, 1_001).await.unwrap_err();
        assert!(matches!(err, Error::NotCustodian { .. }));
        assert!(h.ledger.grant(first.grant).unwrap().unwrap().is_open());

        let skipped = h.controller.skip(first.custodian, 1_002).await.unwrap();
        let closed = h.ledger.grant(first.grant).unwrap().unwrap();
        assert!(!closed.is_open());
        assert_eq!(closed.grantee, None);
        assert_eq!(skipped.next.map(|n| n.custodian), Some(other));
    }

    #[tokio::test]
    async fn release_happens_once() {
        let mut h = harness(&[2, 3], 1).await;
        let first = h.controller.draw(1_000).await.unwrap();
        assert!(h.controller.release(2_000).await.unwrap());
        assert!(!h.controller.release(3_000).await.unwrap());

        let public = h.sink.public().await;
        assert_eq!(public.len(), 2);
        assert!(!public[0].contains(&first.token));
        assert!(public[1].contains(&first.token));
        assert_eq!(
            h.controller.state(),
            &SuccessionState::Granted {
                grant: first.grant,
                custodian: first.custodian
            }
        );
    }

    #[tokio::test]
    async fn suspension_persists_and_clears() {
        let mut h = harness(&[2, 3], 1).await;
        assert!(h.controller.suspend("ambiguous", 1_000).await.unwrap());
        assert!(!h.controller.suspend("ambiguous", 1_001).await.unwrap());
        assert_eq!(h.sink.private().await.len(), 1);
        assert!(matches!(
            h.controller.draw(1_002).await,
            Err(Error::Suspended(_))
        ));

        let reloaded = SuccessionController::load(
            Arc::clone(&h.ledger),
            h.platform.clone(),
            h.sink.clone(),
            SuccessionConfig::default(),
        )
        .unwrap();
        assert_eq!(reloaded.state().name(), "suspended");

        assert!(h.controller.clear_suspension().await.unwrap());
        assert_eq!(h.controller.state(), &SuccessionState::Idle);
        assert!(!h.controller.clear_suspension().await.unwrap());
    }

    #[tokio::test]
    async fn join_resolves_only_real_newcomers() {
        let mut h = harness(&[2, 3], 1).await;
        h.controller.draw(1_000).await.unwrap();
        h.platform
            .add_member(Member::new(MemberId(50), "hook", 1_000).as_bot())
            .await;

        assert!(h
            .controller
            .on_member_joined(MemberId(50), 1_001)
            .await
            .unwrap()
            .is_none());
        // Founder rejoining is already admitted
        assert!(h
            .controller
            .on_member_joined(MemberId(1), 1_001)
            .await
            .unwrap()
            .is_none());
        assert!(h.controller.state().active_grant().is_some());

        h.platform
            .add_member(Member::new(MemberId(7), "new", 1_002))
            .await;
        let resolution = h
            .controller
            .on_member_joined(MemberId(7), 1_002)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.grantee, MemberId(7));
    }

    #[tokio::test]
    async fn exempt_join_keeps_grant_open() {
        let mut h = harness(&[2, 3], 1).await;
        h.controller.config.exempt.insert(MemberId(4));
        let first = h.controller.draw(1_000).await.unwrap();
        h.platform
            .add_member(Member::new(MemberId(4), "staff", 1_001))
            .await;

        assert!(h
            .controller
            .on_member_joined(MemberId(4), 1_001)
            .await
            .unwrap()
            .is_none());
        assert_eq!(h.controller.state().active_grant(), Some(first.grant));
        let grant = h.ledger.grant(first.grant).unwrap().unwrap();
        assert!(grant.is_open());
        assert!(h.ledger.children_of(first.custodian).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_ledger_write_changes_nothing() {
        let mut h = harness(&[2, 3], 1).await;
        let first = h.controller.draw(1_000).await.unwrap();
        let granted = h.controller.state().clone();
        let public = h.sink.public().await;
        let direct = h.sink.direct().await;

        // Closed behind the controller's back, so its next write is refused
        h.ledger.close_grant(first.grant, 1_050).unwrap();
        h.platform
            .add_member(Member::new(MemberId(4), "new", 1_100))
            .await;

        let err = h.controller.resolve(MemberId(4), 1_100).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ledger(LedgerError::GrantNotActive(_))
        ));
        let err = h.controller.skip(first.custodian, 1_100).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));

        assert_eq!(h.controller.state(), &granted);
        assert_eq!(h.controller.draw_attempts(), 1);
        assert_eq!(h.sink.public().await, public);
        assert_eq!(h.sink.direct().await, direct);
        assert!(h.sink.private().await.is_empty());
        // Platform side untouched as well
        let live = h.platform.list_outstanding_tokens().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].code, first.token);
        assert_eq!(
            h.platform.holders_of(Capability::Custodian).await,
            vec![first.custodian]
        );
    }

    #[tokio::test]
    async fn token_failure_keeps_persisted_grant() {
        let mut h = harness(&[2, 3], 1).await;
        h.platform.set_token_failure(true).await;
        assert!(h.controller.attempt_draw(1_000).await.is_err());

        // The grant was persisted, so the controller reflects it
        let active = h.ledger.active_grant().unwrap().unwrap();
        assert_eq!(h.controller.state().active_grant(), Some(active.id));
        assert!(active.token.is_none());

        // force_draw closes the tokenless grant and draws afresh
        h.platform.set_token_failure(false).await;
        let next = h.controller.force_draw(1_100).await.unwrap().unwrap();
        assert_eq!(next.grant, GrantId(active.id.0 + 1));
        assert!(!h.ledger.grant(active.id).unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn stats_detail_levels() {
        let mut h = harness(&[2, 3], 1).await;
        h.controller.draw(1_000).await.unwrap();

        let summary = h.controller.stats(StatsDetail::Summary).await.unwrap();
        assert!(summary.entries.is_empty());
        assert_eq!(summary.total_grants, 2);
        assert_eq!(summary.admitted, 1);
        assert!(summary.active_grant.is_some());

        let full = h.controller.stats(StatsDetail::Full).await.unwrap();
        assert_eq!(full.entries.len(), full.eligible);
        let sum: f64 = full.entries.iter().map(|e| e.probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
