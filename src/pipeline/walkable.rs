//! Walkable-area pipeline: place name → walk network → convex hull → GeoJSON.

use std::path::PathBuf;
use std::time::Duration;

use geo::Polygon;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::{NetworkConfig, WalkableConfig};
use crate::error::Result;
use crate::geometry::convex_hull;
use crate::network::{GraphOptions, NetworkFetcher, StreetGraph};
use crate::output::write_geometry;

/// Outcome of a successful walkable-area run
#[derive(Debug, Clone)]
pub struct WalkableSummary {
    pub nodes: usize,
    pub edges: usize,
    pub output: PathBuf,
}

pub struct WalkablePipeline {
    place: String,
    output: PathBuf,
    options: GraphOptions,
    fetcher: NetworkFetcher,
    progress: bool,
}

impl WalkablePipeline {
    pub fn new(
        place: impl Into<String>,
        output: impl Into<PathBuf>,
        options: GraphOptions,
        fetcher: NetworkFetcher,
    ) -> Self {
        Self {
            place: place.into(),
            output: output.into(),
            options,
            fetcher,
            progress: false,
        }
    }

    pub fn from_config(walkable: &WalkableConfig, network: &NetworkConfig) -> Result<Self> {
        let options = GraphOptions {
            retain_all: walkable.retain_all,
            simplify: walkable.simplify,
        };
        Ok(Self::new(
            walkable.place.clone(),
            &walkable.output,
            options,
            NetworkFetcher::new(network)?,
        ))
    }

    /// Show a spinner while the network downloads
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self) -> Result<WalkableSummary> {
        info!("Downloading {} pedestrian network...", self.place);

        let spinner = if self.progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("fetching walk network for {}", self.place));
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        } else {
            ProgressBar::hidden()
        };

        let graph = self.fetcher.walk_network(&self.place, self.options).await;
        spinner.finish_and_clear();
        let graph = graph?;

        let hull = hull_of_graph(&graph)?;
        write_geometry(&geo::Geometry::Polygon(hull), &self.output)?;
        info!("Saved walkable area to {}", self.output.display());

        Ok(WalkableSummary {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            output: self.output.clone(),
        })
    }
}

/// Convex hull of every node in `graph`
pub fn hull_of_graph(graph: &StreetGraph) -> Result<Polygon<f64>> {
    convex_hull(&graph.points())
}
