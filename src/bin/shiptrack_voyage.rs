use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use shiptrack::store::{load_json_or_default, HistoryStore, SnapshotDoc};
use shiptrack::voyage::{summarize, PortCatalog};
use shiptrack::{Mmsi, StoreLayout, TrackMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Current,
    All,
}

impl From<Mode> for TrackMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Current => TrackMode::CurrentTrip,
            Mode::All => TrackMode::AllTrips,
        }
    }
}

#[derive(Parser)]
#[command(name = "shiptrack-voyage")]
#[command(about = "Summarize a vessel's recorded voyage: port calls, next port and ETA")]
struct Cli {
    /// Data root written by shiptrack-feed
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Vessel MMSI
    #[arg(long)]
    mmsi: Mmsi,

    /// Headerless name,country,lat,lon port catalog
    #[arg(long, default_value = "./data/ports.csv")]
    ports: PathBuf,

    /// Which part of the history to analyse
    #[arg(long, value_enum, default_value_t = Mode::Current)]
    mode: Mode,

    /// Keep only the most recent N points
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let layout = StoreLayout::new(&cli.data_dir);
    let snapshots: SnapshotDoc =
        load_json_or_default(&layout.snapshot_path()).context("Failed to read snapshots")?;
    let history = HistoryStore::new(layout);
    let points = history
        .read(cli.mmsi, cli.mode.into(), cli.limit)
        .context("Failed to read track history")?;
    let ports = PortCatalog::load_csv(&cli.ports).context("Failed to read port catalog")?;

    let summary = summarize(cli.mmsi, snapshots.get(&cli.mmsi), &points, &ports);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
