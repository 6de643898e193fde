use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use harvestbot::{harvest::Harvester, HarvestConfig};

/// The entry point of the résumé harvester.
///
/// Settings come from `HARVEST_*` environment variables, overridden by the
/// positional arguments `<query> <area> <pages>`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HarvestConfig::load()?.with_args(std::env::args().skip(1))?;
    info!("Starting harvest for query '{}'", config.query);

    let start_time = Instant::now();
    let harvester = Harvester::new(config)?;

    match harvester.run().await {
        Ok(Some(path)) => {
            println!("\n=== Harvest Summary ===");
            println!("Dataset: {}", path.display());
            println!("Processing time: {:.2?}", start_time.elapsed());
        }
        Ok(None) => println!("No resumes harvested, nothing saved."),
        Err(e) => {
            error!("Failed to save dataset: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
