//! GeoJSON output.
//!
//! Files hold a single-feature `FeatureCollection` in longitude/latitude
//! order, tagged with the CRS84 named CRS the way GDAL's GeoJSON driver tags
//! EPSG:4326 layers.

use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const CRS84_URN: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// Wrap `geometry` in a one-feature collection named `name`
pub fn feature_collection(geometry: &geo::Geometry<f64>, name: &str) -> FeatureCollection {
    let feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(JsonObject::new()),
        foreign_members: None,
    };

    let mut members = JsonObject::new();
    members.insert("name".to_string(), json!(name));
    members.insert(
        "crs".to_string(),
        json!({ "type": "name", "properties": { "name": CRS84_URN } }),
    );

    FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: Some(members),
    }
}

/// Write `geometry` to `path`, replacing any existing file.
///
/// The document is written to a sibling temporary file first and renamed into
/// place, so `path` is either the complete new file or untouched.
pub fn write_geometry(geometry: &geo::Geometry<f64>, path: &Path) -> Result<()> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let document = GeoJson::from(feature_collection(geometry, name));

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, &document)
            .map_err(|e| PipelineError::io(path, e.into()))?;
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;

    debug!("Wrote {}", path.display());
    Ok(())
}
