//! Boundary-merge pipeline: shapefile → union → EPSG:4326 → GeoJSON.

use std::path::PathBuf;

use geo::MultiPolygon;
use tracing::info;

use crate::config::BoundaryConfig;
use crate::crs::{self, Crs};
use crate::error::{PipelineError, Result};
use crate::geometry::{merge_polygons, simplest};
use crate::output::write_geometry;
use crate::shapes::{load_boundaries, BoundaryLayer, LoadOptions};

/// Outcome of a successful boundary run
#[derive(Debug, Clone)]
pub struct BoundarySummary {
    pub records: usize,
    pub source_crs: Crs,
    pub output: PathBuf,
}

pub struct BoundaryPipeline {
    input: PathBuf,
    output: PathBuf,
    options: LoadOptions,
}

impl BoundaryPipeline {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options,
        }
    }

    pub fn from_config(config: &BoundaryConfig) -> Result<Self> {
        let crs_override = config
            .source_crs
            .as_deref()
            .map(str::parse::<Crs>)
            .transpose()?;

        Ok(Self::new(
            &config.input,
            &config.output,
            LoadOptions {
                crs_override,
                name_fields: config.name_fields.clone(),
            },
        ))
    }

    pub fn run(&self) -> Result<BoundarySummary> {
        let layer = load_boundaries(&self.input, &self.options)?;

        match &layer.crs {
            Some(crs) => info!("Original CRS: {}", crs),
            None => info!("Original CRS: undefined"),
        }
        info!("Boroughs loaded: {}", layer.len());
        for name in layer.records.iter().filter_map(|r| r.name.as_deref()) {
            info!("  {}", name);
        }

        let merged = merge_layer(&layer)?;
        let source_crs = layer.crs.clone().ok_or(PipelineError::UnknownCrs)?;
        let reprojected = crs::reproject(&merged, Some(&source_crs), &Crs::WGS84)?;
        info!("Reprojected CRS: {}", Crs::WGS84);

        write_geometry(&simplest(reprojected), &self.output)?;
        info!(
            "Saved merged boundary GeoJSON to {}",
            self.output.display()
        );

        Ok(BoundarySummary {
            records: layer.len(),
            source_crs,
            output: self.output.clone(),
        })
    }
}

/// Union of every record in `layer`, still in the layer's CRS
pub fn merge_layer(layer: &BoundaryLayer) -> Result<MultiPolygon<f64>> {
    if layer.is_empty() {
        return Err(PipelineError::EmptyInput("boundary dataset has no polygons"));
    }
    Ok(merge_polygons(layer.geometries()))
}
