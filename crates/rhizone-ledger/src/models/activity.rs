//! Activity, inactivity marks and suspension records.

use super::ids::{GrantId, MemberId, Timestamp};
use serde::{Deserialize, Serialize};

/// Last time a member was seen engaging with the community.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityRecord {
    pub member: MemberId,
    pub last_seen: Timestamp,
}

impl ActivityRecord {
    /// Whether the member was last seen before `cutoff`.
    pub fn is_stale(&self, cutoff: Timestamp) -> bool {
        self.last_seen < cutoff
    }
}

/// A member's activity lapsed while `grant` was open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InactivityMark {
    pub grant: GrantId,
    pub member: MemberId,
}

/// Automatic succession is halted pending manual review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suspension {
    /// Operator-facing explanation
    pub reason: String,

    /// When the anomaly was detected
    pub since: Timestamp,
}
