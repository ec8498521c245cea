//! Boundary-merge pipeline.
//!
//! Loads the borough boundary shapefile, merges every borough into one
//! outline, reprojects it to WGS 84 and writes it as GeoJSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use citybounds::config::Config;
use citybounds::BoundaryPipeline;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "nyc_boundary")]
#[command(about = "Merge borough boundaries into one WGS 84 GeoJSON outline")]
struct Args {
    /// Borough boundary shapefile (.shp)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// GeoJSON file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source CRS (EPSG:<code> or PROJ string), overriding the .prj
    #[arg(long)]
    source_crs: Option<String>,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?.boundary;
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if args.source_crs.is_some() {
        config.source_crs = args.source_crs;
    }

    info!("Boundary merge");
    info!("File: {}", config.input.display());

    let summary = BoundaryPipeline::from_config(&config)
        .context("Invalid boundary configuration")?
        .run()
        .with_context(|| format!("Failed to build boundary from {}", config.input.display()))?;

    info!(
        "Merged {} boundaries from {} into {}",
        summary.records,
        summary.source_crs,
        summary.output.display()
    );

    Ok(())
}
