//! Daemon configuration from the environment.

use crate::error::{Error, Result};
use rhizone_ledger::MemberId;
use rhizone_lottery::ZeroPoolPolicy;
use rhizone_succession::SuccessionConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a Rhizone node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for the ledger
    pub data_dir: PathBuf,

    /// Admin socket path (for rhizone-admin)
    pub admin_socket: PathBuf,

    /// Member recorded as the ledger's root on first start
    pub founder: Option<MemberId>,

    /// Succession tuning
    pub succession: SuccessionConfig,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(
            lookup("RHIZONE_DATA_DIR").unwrap_or_else(|| "./rhizone-data".to_string()),
        );

        let admin_socket = lookup("RHIZONE_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        let founder = lookup("RHIZONE_FOUNDER")
            .map(|v| parse::<MemberId>("RHIZONE_FOUNDER", &v))
            .transpose()?;

        let exempt = match lookup("RHIZONE_EXEMPT_MEMBERS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse::<MemberId>("RHIZONE_EXEMPT_MEMBERS", s))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let mut succession = SuccessionConfig::default().with_exempt(exempt);
        if let Some(secs) = seconds(&lookup, "RHIZONE_TOKEN_TTL_SECS")? {
            succession = succession.with_token_ttl(secs);
        }
        if let Some(secs) = seconds(&lookup, "RHIZONE_INACTIVITY_WINDOW_SECS")? {
            succession = succession.with_inactivity_window(secs);
        }
        if let Some(secs) = seconds(&lookup, "RHIZONE_RELEASE_AFTER_SECS")? {
            succession = succession.with_release_after(secs);
        }
        if let Some(secs) = seconds(&lookup, "RHIZONE_AUDIT_INTERVAL_SECS")? {
            if secs.is_zero() {
                return Err(Error::Config(
                    "RHIZONE_AUDIT_INTERVAL_SECS must be positive".into(),
                ));
            }
            succession = succession.with_audit_interval(secs);
        }
        if let Some(policy) = lookup("RHIZONE_ZERO_POOL") {
            succession = succession.with_zero_pool(zero_pool(&policy)?);
        }

        Ok(Self {
            data_dir,
            admin_socket,
            founder,
            succession,
        })
    }

    /// Where the RocksDB ledger lives.
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    lookup(key)
        .map(|v| parse::<u64>(key, &v).map(Duration::from_secs))
        .transpose()
}

fn zero_pool(value: &str) -> Result<ZeroPoolPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "uniform" => Ok(ZeroPoolPolicy::Uniform),
        "reject" => Ok(ZeroPoolPolicy::Reject),
        other => Err(Error::Config(format!(
            "Invalid RHIZONE_ZERO_POOL '{}': expected uniform or reject",
            other
        ))),
    }
}
