//! Pedestrian way download via the Overpass API.

use geo::{BoundingRect, Coord, MultiPolygon};
use hashbrown::HashMap;
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

use super::{get_json, NetworkFetcher, StreetGraph};
use crate::error::{PipelineError, Result};

/// Ways a pedestrian may use: any highway that is not an area, not motor-only,
/// not under construction, and not explicitly closed to walkers.
const WALK_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
    r#"["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|no|planned|platform|proposed|raceway|razed"]"#,
    r#"["foot"!~"no"]["service"!~"private"]"#,
    r#"["sidewalk"!~"separate"]["sidewalk:both"!~"separate"]"#,
    r#"["sidewalk:left"!~"separate"]["sidewalk:right"!~"separate"]"#,
);

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
    /// Set when the server aborted the query part-way
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        #[serde(default)]
        nodes: Vec<i64>,
    },
    #[serde(other)]
    Other,
}

/// Overpass QL for every walkable way (and its nodes) in a lon/lat box
pub fn walk_query(boundary: &MultiPolygon<f64>, timeout_secs: u64) -> Option<String> {
    let rect = boundary.bounding_rect()?;
    Some(format!(
        "[out:json][timeout:{}];(way{}({},{},{},{});>;);out;",
        timeout_secs,
        WALK_FILTER,
        rect.min().y,
        rect.min().x,
        rect.max().y,
        rect.max().x
    ))
}

impl NetworkFetcher {
    /// Download the unclipped walk network covering `boundary`'s bounding box
    pub async fn download_walk_network(&self, boundary: &MultiPolygon<f64>) -> Result<StreetGraph> {
        let query = walk_query(boundary, self.timeout_secs)
            .ok_or(PipelineError::EmptyInput("boundary has no extent"))?;

        let url = Url::parse_with_params(&self.overpass_url, &[("data", query.as_str())])
            .map_err(|e| PipelineError::Network(format!("invalid Overpass URL: {}", e)))?;

        info!("Downloading pedestrian network...");
        let response: OverpassResponse = get_json(&self.client, url).await?;

        if let Some(remark) = response.remark {
            if remark.contains("error") {
                return Err(PipelineError::Network(format!("Overpass: {}", remark)));
            }
            warn!("Overpass remark: {}", remark);
        }

        let graph = build_graph(response.elements);
        info!(
            "Downloaded {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

fn build_graph(elements: Vec<Element>) -> StreetGraph {
    let mut nodes = HashMap::new();
    let mut ways = Vec::new();

    for element in elements {
        match element {
            Element::Node { id, lat, lon } => {
                nodes.insert(id, Coord { x: lon, y: lat });
            }
            Element::Way { nodes: refs } => ways.push(refs),
            Element::Other => {}
        }
    }

    StreetGraph::from_ways(nodes, ways)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::network::stub;
    use geo::polygon;

    fn small_box() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: -74.02, y: 40.70),
            (x: -73.98, y: 40.70),
            (x: -73.98, y: 40.74),
            (x: -74.02, y: 40.74),
            (x: -74.02, y: 40.70),
        ]])
    }

    async fn fetcher_answering(body: &str) -> NetworkFetcher {
        let base = stub::serve(vec![("/api/interpreter", 200, body.to_string())]).await;
        NetworkFetcher::new(&NetworkConfig {
            overpass_url: format!("{}/api/interpreter", base),
            timeout_secs: 10,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_walk_query() {
        let boundary = MultiPolygon::new(vec![polygon![
            (x: -74.25, y: 40.49),
            (x: -73.70, y: 40.49),
            (x: -73.70, y: 40.92),
            (x: -74.25, y: 40.92),
            (x: -74.25, y: 40.49),
        ]]);
        let query = walk_query(&boundary, 180).unwrap();

        assert!(query.starts_with("[out:json][timeout:180];"));
        // south, west, north, east
        assert!(query.contains("(40.49,-74.25,40.92,-73.7)"));
        assert!(query.contains(r#"["foot"!~"no"]"#));
        assert!(query.ends_with(";>;);out;"));
    }

    #[test]
    fn test_empty_boundary_has_no_query() {
        assert!(walk_query(&MultiPolygon::new(vec![]), 180).is_none());
    }

    #[test]
    fn test_parse_elements() {
        let response: OverpassResponse = serde_json::from_str(
            r#"{
                "version": 0.6,
                "elements": [
                    {"type": "node", "id": 1, "lat": 40.7, "lon": -74.0},
                    {"type": "node", "id": 2, "lat": 40.8, "lon": -73.9},
                    {"type": "relation", "id": 7, "members": []},
                    {"type": "way", "id": 10, "nodes": [1, 2], "tags": {"highway": "footway"}}
                ]
            }"#,
        )
        .unwrap();
        assert!(response.remark.is_none());

        let graph = build_graph(response.elements);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.coord(1), Some(Coord { x: -74.0, y: 40.7 }));
    }

    #[test]
    fn test_parse_remark() {
        let response: OverpassResponse = serde_json::from_str(
            r#"{"elements": [], "remark": "runtime error: Query timed out"}"#,
        )
        .unwrap();
        assert!(response.remark.unwrap().contains("error"));
    }

    #[tokio::test]
    async fn test_error_remark_fails_download() {
        let fetcher = fetcher_answering(
            r#"{"elements": [], "remark": "runtime error: Query timed out in \"query\" at line 1 after 181 seconds."}"#,
        )
        .await;

        let err = fetcher.download_walk_network(&small_box()).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::Network(ref msg) if msg.contains("timed out")),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_informational_remark_is_kept() {
        let fetcher = fetcher_answering(
            r#"{
                "remark": "results truncated to bbox",
                "elements": [
                    {"type": "node", "id": 1, "lat": 40.71, "lon": -74.01},
                    {"type": "node", "id": 2, "lat": 40.72, "lon": -74.00},
                    {"type": "way", "id": 10, "nodes": [1, 2]}
                ]
            }"#,
        )
        .await;

        let graph = fetcher.download_walk_network(&small_box()).await.unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
