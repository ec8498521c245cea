//! Street network download for a named place.
//!
//! The place is geocoded to its boundary polygon through Nominatim, the
//! pedestrian ways inside the boundary's bounding box are downloaded from
//! Overpass, and the resulting graph is clipped to the boundary and cleaned.
//! Failures are not retried.

pub mod graph;
mod nominatim;
mod overpass;

use std::time::Duration;

use geo::MultiPolygon;
use reqwest::Client;
use tracing::info;

use crate::config::NetworkConfig;
use crate::error::{PipelineError, Result};

pub use graph::StreetGraph;
pub use overpass::walk_query;

/// Graph cleaning applied after the download
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Keep every connected component instead of only the largest
    pub retain_all: bool,
    /// Drop interstitial nodes
    pub simplify: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            retain_all: false,
            simplify: true,
        }
    }
}

/// HTTP client for the geocoding and network services
pub struct NetworkFetcher {
    client: Client,
    nominatim_url: String,
    overpass_url: String,
    timeout_secs: u64,
}

impl NetworkFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            nominatim_url: config.nominatim_url.clone(),
            overpass_url: config.overpass_url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Download the pedestrian network inside `place`'s boundary
    pub async fn walk_network(&self, place: &str, options: GraphOptions) -> Result<StreetGraph> {
        let boundary = self.geocode_boundary(place).await?;
        let graph = self.download_walk_network(&boundary).await?;
        Ok(clean(graph, &boundary, options))
    }
}

/// Clip to the boundary, then apply the configured cleaning steps
pub fn clean(graph: StreetGraph, boundary: &MultiPolygon<f64>, options: GraphOptions) -> StreetGraph {
    let mut graph = graph.clip_to(boundary);
    if !options.retain_all {
        graph = graph.largest_component();
    }
    if options.simplify {
        graph = graph.simplify();
    }
    info!(
        "Street network has {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: reqwest::Url,
) -> Result<T> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::Network(format!(
            "{}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    Ok(response.json::<T>().await?)
}
