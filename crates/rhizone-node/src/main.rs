//! Rhizone Node binary
//!
//! Runs succession for one community with an admin socket for operators.

use rhizone_node::{NodeConfig, RhizoneNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rhizone=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env()?;
    let node = RhizoneNode::new(config).await?;
    node.run().await?;

    Ok(())
}
