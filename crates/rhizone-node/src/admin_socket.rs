//! Unix socket server for operator commands.
//!
//! Newline-delimited JSON: one [`AdminCommand`] per line in, one
//! [`AdminResponse`] per line out. Besides the operator commands it accepts
//! platform events (`activity`, `join`, `add_member`) so a local deployment
//! can be driven without a chat client.

use crate::error::Result;
use rhizone_ledger::{now_secs, MemberId};
use rhizone_succession::{Member, MemoryPlatform, ServiceHandle, StatsDetail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Succession state and lottery standings
    Stats {
        #[serde(default)]
        detail: StatsDetail,
    },
    /// Ancestry of a member
    Lineage { member: MemberId },
    /// Everyone admitted through a member's line
    Progeny {
        member: MemberId,
        #[serde(default)]
        include_inactive: bool,
    },
    /// Custodian passes on the token
    Skip { requester: MemberId },
    /// Resume automatic succession
    ClearSuspension,
    /// Record qualifying activity
    Activity { member: MemberId },
    /// A new member joined
    Join {
        member: MemberId,
        #[serde(default)]
        name: Option<String>,
    },
    /// Register an existing member without admitting them
    AddMember {
        member: MemberId,
        name: String,
        #[serde(default)]
        bot: bool,
    },
    /// Run an audit pass now
    Tick,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Data { data: serde_json::Value },
    Bool { value: bool },
    Pong,
}

impl AdminResponse {
    fn error(e: impl std::fmt::Display) -> Self {
        Self::Error {
            error: e.to_string(),
        }
    }

    fn data<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(data) => Self::Data { data },
            Err(e) => Self::error(e),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    handle: ServiceHandle,
    platform: Arc<MemoryPlatform>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(handle: ServiceHandle, platform: Arc<MemoryPlatform>, socket_path: &Path) -> Self {
        Self {
            handle,
            platform,
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handle = self.handle.clone();
                    let platform = Arc::clone(&self.platform);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handle, platform).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(
    stream: UnixStream,
    handle: ServiceHandle,
    platform: Arc<MemoryPlatform>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &handle, &platform).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

/// Run one command against the service.
pub async fn execute_command(
    cmd: AdminCommand,
    handle: &ServiceHandle,
    platform: &MemoryPlatform,
) -> AdminResponse {
    let now = now_secs();
    match cmd {
        AdminCommand::Stats { detail } => match handle.stats(detail).await {
            Ok(report) => AdminResponse::data(&report),
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Lineage { member } => match handle.lineage(member).await {
            Ok(lineage) => AdminResponse::data(&lineage),
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Progeny {
            member,
            include_inactive,
        } => match handle.progeny(member, include_inactive).await {
            Ok(progeny) => AdminResponse::data(&progeny),
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Skip { requester } => match handle.skip(requester, now).await {
            Ok(outcome) => {
                tracing::info!("Member {} skipped grant #{}", requester, outcome.grant);
                AdminResponse::data(&outcome)
            }
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::ClearSuspension => match handle.clear_suspension().await {
            Ok(value) => AdminResponse::Bool { value },
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Activity { member } => match handle.activity(member, now).await {
            Ok(value) => AdminResponse::Bool { value },
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Join { member, name } => {
            let name = name.unwrap_or_else(|| member.to_string());
            platform.add_member(Member::new(member, name, now)).await;
            match handle.member_joined(member, now).await {
                Ok(Some(resolution)) => AdminResponse::data(&resolution),
                Ok(None) => AdminResponse::Ok {
                    message: format!("Member {} joined; nothing to resolve", member),
                },
                Err(e) => AdminResponse::error(e),
            }
        }
        AdminCommand::AddMember { member, name, bot } => {
            let mut entry = Member::new(member, name, now);
            if bot {
                entry = entry.as_bot();
            }
            platform.add_member(entry).await;
            tracing::info!("Registered member {}", member);
            // Registration counts as activity so the sweep can see them
            if !bot {
                if let Err(e) = handle.activity(member, now).await {
                    return AdminResponse::error(e);
                }
            }
            AdminResponse::Ok {
                message: format!("Registered member {}", member),
            }
        }
        AdminCommand::Tick => match handle.tick(now).await {
            Ok(outcome) => AdminResponse::data(&outcome),
            Err(e) => AdminResponse::error(e),
        },
        AdminCommand::Ping => AdminResponse::Pong,
    }
}
