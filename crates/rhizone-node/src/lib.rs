//! Rhizone Node
//!
//! Standalone daemon running succession for one community.
//!
//! # Architecture
//!
//! - **Config**: environment variables ([`NodeConfig::from_env`])
//! - **Node**: opens the ledger, records the founder, starts the service
//! - **Admin Socket**: Unix socket for local operator commands (rhizone-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use rhizone_node::{NodeConfig, RhizoneNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = RhizoneNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod config;
pub mod error;
pub mod node;

pub use admin_socket::{AdminCommand, AdminResponse, AdminSocket};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::RhizoneNode;
