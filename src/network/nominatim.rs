//! Place name to boundary polygon via the Nominatim search API.

use geo::{MultiPolygon, Polygon};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use super::{get_json, NetworkFetcher};
use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default)]
    display_name: String,
    geojson: Option<geojson::Geometry>,
}

impl NetworkFetcher {
    /// Resolve `place` to the first search result that has an areal geometry
    pub async fn geocode_boundary(&self, place: &str) -> Result<MultiPolygon<f64>> {
        let url = Url::parse_with_params(
            &self.nominatim_url,
            &[
                ("q", place),
                ("format", "json"),
                ("polygon_geojson", "1"),
                ("limit", "10"),
            ],
        )
        .map_err(|e| PipelineError::Network(format!("invalid Nominatim URL: {}", e)))?;

        info!("Geocoding '{}'", place);
        let results: Vec<NominatimPlace> = get_json(&self.client, url).await?;
        debug!("Nominatim returned {} results", results.len());

        results
            .into_iter()
            .find_map(|result| {
                let boundary = to_multi_polygon(result.geojson?)?;
                info!("Resolved '{}' to {}", place, result.display_name);
                Some(boundary)
            })
            .ok_or_else(|| PipelineError::PlaceNotFound(place.to_string()))
    }
}

/// Polygon and MultiPolygon results are boundaries; points and lines are not
fn to_multi_polygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    match geometry.value {
        value @ geojson::Value::Polygon(_) => Polygon::<f64>::try_from(value)
            .ok()
            .map(|p| MultiPolygon::new(vec![p])),
        value @ geojson::Value::MultiPolygon(_) => MultiPolygon::<f64>::try_from(value).ok(),
        _ => None,
    }
}
