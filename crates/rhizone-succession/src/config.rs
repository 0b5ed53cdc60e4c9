//! Succession tuning.

use rhizone_ledger::MemberId;
use rhizone_lottery::ZeroPoolPolicy;
use std::collections::BTreeSet;
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// Configuration for the controller, activity tracker and auditor.
#[derive(Debug, Clone)]
pub struct SuccessionConfig {
    /// Lifetime of each admission token.
    pub token_ttl: Duration,

    /// Members unseen for this long lose the "active" capability.
    pub inactivity_window: Duration,

    /// An unredeemed grant older than this has its token made public.
    pub release_after: Duration,

    /// Period of the reconciliation audit.
    pub audit_interval: Duration,

    /// Members the auditor never expects a grant record for
    /// (pre-existing members, staff accounts).
    pub exempt: BTreeSet<MemberId>,

    /// Handling of a lottery pool where nobody holds tickets.
    pub zero_pool: ZeroPoolPolicy,
}

impl Default for SuccessionConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(2 * DAY),
            inactivity_window: Duration::from_secs(7 * DAY),
            release_after: Duration::from_secs(DAY),
            audit_interval: Duration::from_secs(60),
            exempt: BTreeSet::new(),
            zero_pool: ZeroPoolPolicy::default(),
        }
    }
}

impl SuccessionConfig {
    /// Set the token lifetime.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the inactivity window.
    #[must_use]
    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    /// Set the public release threshold.
    #[must_use]
    pub fn with_release_after(mut self, after: Duration) -> Self {
        self.release_after = after;
        self
    }

    /// Set the audit period.
    #[must_use]
    pub fn with_audit_interval(mut self, interval: Duration) -> Self {
        self.audit_interval = interval;
        self
    }

    /// Exempt members from reconciliation.
    #[must_use]
    pub fn with_exempt(mut self, members: impl IntoIterator<Item = MemberId>) -> Self {
        self.exempt.extend(members);
        self
    }

    /// Set the zero-pool policy.
    #[must_use]
    pub fn with_zero_pool(mut self, policy: ZeroPoolPolicy) -> Self {
        self.zero_pool = policy;
        self
    }
}
