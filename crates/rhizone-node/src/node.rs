//! Rhizone node - the daemon entry point.
//!
//! Architecture:
//! - One RocksDB ledger shared by the succession service and queries
//! - Succession service task (events, commands, audit ticks)
//! - Unix admin socket for local operator commands (rhizone-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::config::NodeConfig;
use crate::error::Result;
use rhizone_ledger::{Ledger, LedgerError};
use rhizone_succession::{
    Capability, LogSink, Member, MemoryPlatform, ServiceHandle, SuccessionService,
};
use std::sync::Arc;

/// A Rhizone node instance.
pub struct RhizoneNode {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    platform: Arc<MemoryPlatform>,
}

impl RhizoneNode {
    /// Open the ledger and prepare the platform.
    ///
    /// On an empty ledger the configured founder is recorded as the root
    /// member.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let ledger = Arc::new(Ledger::open(config.ledger_dir())?);
        let platform = Arc::new(MemoryPlatform::new());

        if let Some(founder) = config.founder {
            match ledger.bootstrap(founder, rhizone_ledger::now_secs()) {
                Ok(_) => tracing::info!("Recorded founder {}", founder),
                Err(LedgerError::AlreadyBootstrapped(_)) => {
                    tracing::debug!("Ledger already has a root; founder setting ignored")
                }
                Err(e) => return Err(e.into()),
            }
            platform
                .add_member(
                    Member::new(founder, "founder", 0).with_capability(Capability::Active),
                )
                .await;
        }

        Ok(Self {
            config,
            ledger,
            platform,
        })
    }

    /// Shared ledger.
    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    /// Start the succession service and admin socket.
    ///
    /// Returns the service handle; the tasks run until the process exits.
    pub fn start(&self) -> Result<ServiceHandle> {
        let (service, handle) = SuccessionService::start(
            Arc::clone(&self.ledger),
            self.platform.clone(),
            Arc::new(LogSink),
            self.config.succession.clone(),
        )?;
        service.spawn();

        let admin_socket = AdminSocket::new(
            handle.clone(),
            Arc::clone(&self.platform),
            &self.config.admin_socket,
        );
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        Ok(handle)
    }

    /// Run until interrupted.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Rhizone node starting");
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let _handle = self.start()?;
        tracing::info!("rhizone ready");

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        let _ = std::fs::remove_file(&self.config.admin_socket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhizone_ledger::MemberId;
    use rhizone_succession::SuccessionConfig;
    use tempfile::tempdir;

    fn config(dir: &tempfile::TempDir, founder: Option<u64>) -> NodeConfig {
        NodeConfig {
            data_dir: dir.path().join("data"),
            admin_socket: dir.path().join("admin.sock"),
            founder: founder.map(MemberId),
            succession: SuccessionConfig::default(),
        }
    }

    #[tokio::test]
    async fn founder_bootstrapped_once() {
        let dir = tempdir().unwrap();
        {
            let node = RhizoneNode::new(config(&dir, Some(5))).await.unwrap();
            let root = node.ledger().grant(rhizone_ledger::GrantId(1)).unwrap().unwrap();
            assert!(root.is_self_grant());
            assert_eq!(root.custodian, MemberId(5));
        }

        // Reopen with a different founder: the ledger keeps its root
        let node = RhizoneNode::new(config(&dir, Some(6))).await.unwrap();
        assert_eq!(node.ledger().last_grant_id().unwrap(), 1);
        assert_eq!(node.ledger().most_recent_custodian().unwrap(), Some(MemberId(5)));
    }

    #[tokio::test]
    async fn no_founder_leaves_ledger_empty() {
        let dir = tempdir().unwrap();
        let node = RhizoneNode::new(config(&dir, None)).await.unwrap();
        assert_eq!(node.ledger().last_grant_id().unwrap(), 0);
    }

    #[tokio::test]
    async fn start_serves_admin_socket() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let dir = tempdir().unwrap();
        let node = RhizoneNode::new(config(&dir, Some(1))).await.unwrap();
        let _handle = node.start().unwrap();

        let socket = dir.path().join("admin.sock");
        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = tokio::net::UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let stream = stream.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"cmd\":\"ping\"}\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), r#"{"status":"pong"}"#);
    }
}
