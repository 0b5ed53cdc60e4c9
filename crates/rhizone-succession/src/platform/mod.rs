//! External collaborators: the membership platform and the notification sink.
//!
//! The core never owns members or tokens. It reads membership through
//! [`MembershipPlatform`] and talks to people through [`NotificationSink`].
//! Token operations are idempotent from the core's point of view: revoking an
//! unknown token succeeds, and tokens that vanished are simply absent from
//! [`MembershipPlatform::list_outstanding_tokens`].

mod memory;
mod sinks;

pub use memory::MemoryPlatform;
pub use sinks::{LogSink, RecordingSink};

use crate::error::Result;
use async_trait::async_trait;
use rhizone_ledger::{MemberId, Timestamp};
use rhizone_lottery::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// A capability flag held by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Recently engaged; eligible for the lottery
    Active,
    /// Currently entrusted with the admission token
    Custodian,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Custodian => write!(f, "custodian"),
        }
    }
}

/// A member as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    pub joined_at: Timestamp,
    /// Non-member identity (integration, bot account)
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    /// A human member without capabilities.
    pub fn new(id: MemberId, name: impl Into<String>, joined_at: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            capabilities: BTreeSet::new(),
            joined_at,
            bot: false,
        }
    }

    /// Mark as a bot identity.
    #[must_use]
    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Start with a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// How the lottery sees this member.
    pub fn candidate(&self) -> Candidate {
        Candidate {
            member: self.id,
            active: self.has(Capability::Active),
            bot: self.bot,
        }
    }
}

/// A single-use admission token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionToken {
    pub code: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// The chat platform hosting the community.
#[async_trait]
pub trait MembershipPlatform: Send + Sync {
    /// Every member with their capabilities.
    async fn list_members(&self) -> Result<Vec<Member>>;

    /// Look up one member.
    async fn member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.list_members().await?.into_iter().find(|m| m.id == id))
    }

    /// Issue a single-use token valid for `ttl`.
    async fn create_token(&self, ttl: Duration) -> Result<AdmissionToken>;

    /// Tokens that are still redeemable.
    async fn list_outstanding_tokens(&self) -> Result<Vec<AdmissionToken>>;

    /// Invalidate a token. Unknown codes are ignored.
    async fn revoke_token(&self, code: &str) -> Result<()>;

    async fn grant_capability(&self, member: MemberId, capability: Capability) -> Result<()>;

    async fn revoke_capability(&self, member: MemberId, capability: Capability) -> Result<()>;
}

/// Where announcements and operator alerts go. No response is consumed.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// User-facing announcement.
    async fn send_public(&self, text: &str);

    /// Operator alert or lifecycle notice.
    async fn send_private(&self, text: &str);

    /// Direct message to one member.
    async fn send_to(&self, member: MemberId, text: &str);
}
