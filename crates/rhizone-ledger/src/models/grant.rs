//! Custody grant - one entrustment of the admission token.

use super::ids::{GrantId, MemberId, Timestamp};
use serde::{Deserialize, Serialize};

/// A custody grant.
///
/// Appended when a custodian is drawn. Fields other than the identity
/// columns are written at most once: `token` when the platform issues it,
/// `grantee`/`resolved_at` when the grant is redeemed or closed, and
/// `released_at` when the token is published after the timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustodyGrant {
    /// Sequence id (public invite number)
    pub id: GrantId,

    /// Member entrusted with the token
    pub custodian: MemberId,

    /// Member admitted with the token, if redeemed
    pub grantee: Option<MemberId>,

    /// When custody was granted
    pub granted_at: Timestamp,

    /// When the grant was redeemed or closed
    pub resolved_at: Option<Timestamp>,

    /// When the token was made public
    pub released_at: Option<Timestamp>,

    /// Admission token code issued for this grant
    #[serde(default)]
    pub token: Option<String>,
}

/// Lifecycle of a grant as derived from its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Open, token held privately by the custodian
    Held,
    /// Open, token published after the timeout
    Released,
    /// Closed by a member joining with the token
    Redeemed,
    /// Closed without a grantee (skipped or lapsed)
    Closed,
}

impl CustodyGrant {
    /// Create an open grant.
    pub fn new(id: GrantId, custodian: MemberId, granted_at: Timestamp) -> Self {
        Self {
            id,
            custodian,
            grantee: None,
            granted_at,
            resolved_at: None,
            released_at: None,
            token: None,
        }
    }

    /// Still awaiting resolution.
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Custodian and grantee are the same member (bootstrap record).
    pub fn is_self_grant(&self) -> bool {
        self.grantee == Some(self.custodian)
    }

    /// The custodian → grantee edge, if this grant admitted someone else.
    pub fn edge(&self) -> Option<(MemberId, MemberId)> {
        match self.grantee {
            Some(grantee) if grantee != self.custodian => Some((self.custodian, grantee)),
            _ => None,
        }
    }

    /// Seconds since custody was granted.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.granted_at)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> GrantStatus {
        match (self.resolved_at, self.grantee, self.released_at) {
            (None, _, None) => GrantStatus::Held,
            (None, _, Some(_)) => GrantStatus::Released,
            (Some(_), Some(_), _) => GrantStatus::Redeemed,
            (Some(_), None, _) => GrantStatus::Closed,
        }
    }
}
