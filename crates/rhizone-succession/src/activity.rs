//! Activity tracking: the "active" capability follows recent engagement.

use crate::error::Result;
use crate::platform::{Capability, MembershipPlatform};
use rhizone_ledger::{GrantId, Ledger, MemberId, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Members that lost "active"
    pub deactivated: Vec<MemberId>,
    /// Inactivity marks newly written against the open grant
    pub marks: usize,
}

/// Grants and revokes "active" from the activity ledger.
pub struct ActivityTracker {
    ledger: Arc<Ledger>,
    platform: Arc<dyn MembershipPlatform>,
    window: Duration,
}

impl ActivityTracker {
    pub fn new(ledger: Arc<Ledger>, platform: Arc<dyn MembershipPlatform>, window: Duration) -> Self {
        Self {
            ledger,
            platform,
            window,
        }
    }

    /// Record qualifying activity.
    ///
    /// Returns `true` if the member just regained "active". Bots and
    /// identities unknown to the platform are ignored.
    pub async fn record(&self, member: MemberId, at: Timestamp) -> Result<bool> {
        let Some(info) = self.platform.member(member).await? else {
            debug!("Ignoring activity from unknown member {}", member);
            return Ok(false);
        };
        if info.bot {
            return Ok(false);
        }

        self.ledger.upsert_activity(member, at)?;

        if info.has(Capability::Active) {
            return Ok(false);
        }
        self.platform
            .grant_capability(member, Capability::Active)
            .await?;
        info!("Added active capability to {}", member);
        Ok(true)
    }

    /// Revoke "active" from everyone last seen before the window.
    ///
    /// A member lapsing while `open_grant` is unresolved also gets an
    /// inactivity mark against that grant.
    pub async fn sweep(&self, now: Timestamp, open_grant: Option<GrantId>) -> Result<SweepReport> {
        let cutoff = now.saturating_sub(self.window.as_secs());
        let members: HashMap<_, _> = self
            .platform
            .list_members()
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut report = SweepReport::default();
        for record in self.ledger.list_activity()? {
            if !record.is_stale(cutoff) {
                continue;
            }
            let Some(member) = members.get(&record.member) else {
                continue;
            };
            if !member.has(Capability::Active) {
                continue;
            }

            self.platform
                .revoke_capability(member.id, Capability::Active)
                .await?;
            info!("Removed active capability from {}", member.id);
            report.deactivated.push(member.id);

            if let Some(grant) = open_grant {
                if self.ledger.record_inactivity(grant, member.id)? {
                    report.marks += 1;
                }
            }
        }

        Ok(report)
    }
}
