//! Reconciliation between the ledger and the platform.
//!
//! Events can be missed (restarts, dropped webhooks, a draw interrupted
//! between its ledger write and its token request). Each audit tick compares
//! what the platform shows with what the ledger records and either repairs
//! the difference or suspends succession for a human to look at.

use crate::activity::{ActivityTracker, SweepReport};
use crate::config::SuccessionConfig;
use crate::controller::{SuccessionController, SuccessionState};
use crate::error::Result;
use rhizone_ledger::{GrantId, GrantStatus, MemberId, Timestamp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a tick decided to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    /// Succession is suspended; only the sweep ran
    Dormant,
    /// A lone unmatched member was credited to the active grant
    Resolved {
        member: MemberId,
        grant: GrantId,
        next: Option<GrantId>,
    },
    /// An anomaly halted succession (`newly` is false if it already was)
    Suspended { reason: String, newly: bool },
    /// The active grant had no live token, or there was no grant at all
    ForcedDraw { next: Option<GrantId> },
    /// The active grant's token went public
    Released { grant: GrantId },
    /// Nothing to repair
    Steady,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditOutcome {
    pub sweep: SweepReport,
    /// Outstanding tokens revoked for matching no open grant
    pub stray_tokens: usize,
    pub action: AuditAction,
}

/// Periodic drift detection and repair.
pub struct ReconciliationAuditor {
    tracker: ActivityTracker,
    exempt: BTreeSet<MemberId>,
    release_after: Duration,
}

impl ReconciliationAuditor {
    pub fn new(tracker: ActivityTracker, config: &SuccessionConfig) -> Self {
        Self {
            tracker,
            exempt: config.exempt.clone(),
            release_after: config.release_after,
        }
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Members on the platform that no grant admitted.
    async fn unmatched(&self, controller: &SuccessionController) -> Result<Vec<MemberId>> {
        let admitted = controller.ledger().admitted_members()?;
        Ok(controller
            .platform()
            .list_members()
            .await?
            .into_iter()
            .filter(|m| !m.bot && !self.exempt.contains(&m.id) && !admitted.contains(&m.id))
            .map(|m| m.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn suspend(
        &self,
        controller: &mut SuccessionController,
        reason: String,
        now: Timestamp,
    ) -> Result<AuditAction> {
        let newly = controller.suspend(&reason, now).await?;
        Ok(AuditAction::Suspended { reason, newly })
    }

    /// Run one reconciliation pass.
    pub async fn tick(
        &self,
        controller: &mut SuccessionController,
        now: Timestamp,
    ) -> Result<AuditOutcome> {
        let sweep = self
            .tracker
            .sweep(now, controller.state().active_grant())
            .await?;

        if matches!(controller.state(), SuccessionState::Suspended { .. }) {
            debug!("Audit tick while suspended; sweep only");
            return Ok(AuditOutcome {
                sweep,
                stray_tokens: 0,
                action: AuditAction::Dormant,
            });
        }

        let unmatched = self.unmatched(controller).await?;
        let action = match (unmatched.as_slice(), controller.state().active_grant()) {
            ([member], Some(grant)) => {
                info!("Audit credits member {} to grant #{}", member, grant);
                let resolution = controller.resolve(*member, now).await?;
                AuditAction::Resolved {
                    member: *member,
                    grant,
                    next: resolution.next.map(|n| n.grant),
                }
            }
            ([member], None) => {
                let reason = format!("ledger missing a grant record for member {}", member);
                self.suspend(controller, reason, now).await?
            }
            ([], _) => return self.repair_token(controller, sweep, now).await,
            (many, _) => {
                let names: Vec<String> = many.iter().map(ToString::to_string).collect();
                let reason = format!("ambiguous unresolved members: {}", names.join(", "));
                self.suspend(controller, reason, now).await?
            }
        };

        Ok(AuditOutcome {
            sweep,
            stray_tokens: 0,
            action,
        })
    }

    /// Membership matches the ledger; check the token side.
    async fn repair_token(
        &self,
        controller: &mut SuccessionController,
        sweep: SweepReport,
        now: Timestamp,
    ) -> Result<AuditOutcome> {
        let active = controller.ledger().active_grant()?;
        let expected = active.as_ref().and_then(|g| g.token.clone());

        let mut backed = false;
        let mut stray_tokens = 0;
        for token in controller.platform().list_outstanding_tokens().await? {
            if expected.as_deref() == Some(token.code.as_str()) {
                backed = true;
                continue;
            }
            warn!("Revoking stray token {}", token.code);
            controller.platform().revoke_token(&token.code).await?;
            stray_tokens += 1;
        }

        let action = match active {
            Some(grant) if backed => {
                let due = grant.age(now) > self.release_after.as_secs();
                if due && grant.status() == GrantStatus::Held && controller.release(now).await? {
                    AuditAction::Released { grant: grant.id }
                } else {
                    AuditAction::Steady
                }
            }
            _ => {
                let next = controller.force_draw(now).await?;
                AuditAction::ForcedDraw {
                    next: next.map(|n| n.grant),
                }
            }
        };

        Ok(AuditOutcome {
            sweep,
            stray_tokens,
            action,
        })
    }
}
