//! In-process membership platform.
//!
//! Backs the standalone daemon and the test suite. Members and tokens live
//! in memory; time comes from the system clock unless pinned with
//! [`MemoryPlatform::set_clock`].

use super::{AdmissionToken, Capability, Member, MembershipPlatform};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rhizone_ledger::{now_secs, MemberId, Timestamp};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const TOKEN_LEN: usize = 8;

#[derive(Debug, Default)]
struct Inner {
    members: BTreeMap<MemberId, Member>,
    tokens: BTreeMap<String, AdmissionToken>,
    clock: Option<Timestamp>,
    issued: u64,
    fail_token_creation: bool,
}

impl Inner {
    fn now(&self) -> Timestamp {
        self.clock.unwrap_or_else(now_secs)
    }
}

/// Membership platform held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    inner: RwLock<Inner>,
}

fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member.
    pub async fn add_member(&self, member: Member) {
        self.inner.write().await.members.insert(member.id, member);
    }

    /// Remove a member (left the community).
    pub async fn remove_member(&self, id: MemberId) -> Option<Member> {
        self.inner.write().await.members.remove(&id)
    }

    /// Pin the platform clock used for token expiry.
    pub async fn set_clock(&self, now: Timestamp) {
        self.inner.write().await.clock = Some(now);
    }

    /// Make subsequent token creation fail.
    pub async fn set_token_failure(&self, fail: bool) {
        self.inner.write().await.fail_token_creation = fail;
    }

    /// Number of tokens issued so far.
    pub async fn issued_tokens(&self) -> u64 {
        self.inner.read().await.issued
    }

    /// Members currently holding a capability.
    pub async fn holders_of(&self, capability: Capability) -> Vec<MemberId> {
        self.inner
            .read()
            .await
            .members
            .values()
            .filter(|m| m.has(capability))
            .map(|m| m.id)
            .collect()
    }
}

#[async_trait]
impl MembershipPlatform for MemoryPlatform {
    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(self.inner.read().await.members.values().cloned().collect())
    }

    async fn member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.inner.read().await.members.get(&id).cloned())
    }

    async fn create_token(&self, ttl: Duration) -> Result<AdmissionToken> {
        let code = generate_code();
        let mut inner = self.inner.write().await;
        if inner.fail_token_creation {
            return Err(Error::Platform("token creation failed".into()));
        }

        let created_at = inner.now();
        let token = AdmissionToken {
            code: code.clone(),
            created_at,
            expires_at: created_at + ttl.as_secs(),
        };
        inner.tokens.insert(code, token.clone());
        inner.issued += 1;
        debug!("Issued token {}", token.code);
        Ok(token)
    }

    async fn list_outstanding_tokens(&self) -> Result<Vec<AdmissionToken>> {
        let inner = self.inner.read().await;
        let now = inner.now();
        Ok(inner
            .tokens
            .values()
            .filter(|t| t.expires_at > now)
            .cloned()
            .collect())
    }

    async fn revoke_token(&self, code: &str) -> Result<()> {
        self.inner.write().await.tokens.remove(code);
        Ok(())
    }

    async fn grant_capability(&self, member: MemberId, capability: Capability) -> Result<()> {
        if let Some(m) = self.inner.write().await.members.get_mut(&member) {
            m.capabilities.insert(capability);
        }
        Ok(())
    }

    async fn revoke_capability(&self, member: MemberId, capability: Capability) -> Result<()> {
        if let Some(m) = self.inner.write().await.members.get_mut(&member) {
            m.capabilities.remove(&capability);
        }
        Ok(())
    }
}
