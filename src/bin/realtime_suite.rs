//! Runs the Socket.IO checks against the configured origin

use anyhow::{Context, Result};
use stadtwache_harness::config::load_dotenv;
use stadtwache_harness::{init_tracing, EventVerifier, HarnessConfig};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    init_tracing();
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = HarnessConfig::from_env().context("invalid harness configuration")?;
    info!(
        origin = %config.realtime.origin,
        path = %config.realtime.path,
        "Stadtwache real-time suite starting"
    );

    let mut verifier =
        EventVerifier::new(&config.realtime).context("failed to set up the event verifier")?;
    let report = verifier.run().await;
    println!("{}", report);

    Ok(())
}
