use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::sync::watch;
use url::Url;

use shiptrack::feed::{forward_shutdown, FeedClient, FeedConfig, AISSTREAM_URL};
use shiptrack::{FleetTable, SegmentationConfig, StoreLayout, SystemClock, Tracker};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track cruise-line vessels from the AISStream feed", long_about = None)]
struct Args {
    /// Data root holding registry.json, ships.json and tracks/
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// AISStream API key
    #[arg(long, env = "AISSTREAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream websocket endpoint
    #[arg(long, default_value = AISSTREAM_URL)]
    url: Url,

    /// JSON file mapping fleet line to vessel names (overrides the built-in table)
    #[arg(long)]
    fleets: Option<PathBuf>,

    /// CPU core to pin the process to
    #[arg(long)]
    core_id: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let api_key = args
        .api_key
        .context("AISStream API key missing: set AISSTREAM_API_KEY or pass --api-key")?;
    let mut config = FeedConfig::new(api_key)?;
    config.url = args.url;

    if let Some(core_id) = args.core_id {
        let core_ids = core_affinity::get_core_ids().context("Failed to get core IDs")?;
        if core_id < core_ids.len() {
            info!("Pinning process to core {}", core_id);
            core_affinity::set_for_current(core_ids[core_id]);
        } else {
            anyhow::bail!("Core ID {} out of range ({} cores available)", core_id, core_ids.len());
        }
    }

    let fleets = match &args.fleets {
        Some(path) => FleetTable::load(path)
            .with_context(|| format!("Failed to load fleet table {}", path.display()))?,
        None => FleetTable::builtin(),
    };
    info!("Fleet table: {} vessel names", fleets.len());
    info!("Data root: {}", args.data_dir.display());

    let mut tracker = Tracker::open_with(
        StoreLayout::new(&args.data_dir),
        fleets,
        SegmentationConfig::default(),
        SystemClock,
    )
    .context("Failed to open data root")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    let mut client = FeedClient::new(config);
    client.run(&mut tracker, shutdown_rx).await?;
    Ok(())
}
