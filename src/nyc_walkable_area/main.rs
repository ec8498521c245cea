//! Walkable-area pipeline.
//!
//! Downloads the pedestrian street network of a place and writes the convex
//! hull of its nodes as GeoJSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use citybounds::config::Config;
use citybounds::WalkablePipeline;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "nyc_walkable_area")]
#[command(about = "Convex hull of a place's pedestrian network as GeoJSON")]
struct Args {
    /// Place name to geocode
    #[arg(short, long)]
    place: Option<String>,

    /// GeoJSON file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep every connected component, not only the largest
    #[arg(long)]
    retain_all: bool,

    /// Keep interstitial nodes
    #[arg(long)]
    no_simplify: bool,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    let mut walkable = config.walkable;
    if let Some(place) = args.place {
        walkable.place = place;
    }
    if let Some(output) = args.output {
        walkable.output = output;
    }
    if args.retain_all {
        walkable.retain_all = true;
    }
    if args.no_simplify {
        walkable.simplify = false;
    }

    info!("Walkable area");
    info!("Place: {}", walkable.place);

    let summary = WalkablePipeline::from_config(&walkable, &config.network)
        .context("Failed to create HTTP client")?
        .with_progress(true)
        .run()
        .await
        .with_context(|| format!("Failed to build walkable area for '{}'", walkable.place))?;

    info!(
        "Hull covers {} nodes and {} edges; written to {}",
        summary.nodes,
        summary.edges,
        summary.output.display()
    );

    Ok(())
}
