//! Runs the REST case catalog against the configured backend

use anyhow::{Context, Result};
use stadtwache_harness::config::load_dotenv;
use stadtwache_harness::{init_tracing, HarnessConfig, Sequencer};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    init_tracing();
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = HarnessConfig::from_env().context("invalid harness configuration")?;
    info!(api = %config.api.base_url, "Stadtwache backend suite starting");

    let mut sequencer = Sequencer::new(&config).context("failed to set up the sequencer")?;
    let report = sequencer.run().await;
    println!("{}", report);

    Ok(())
}
