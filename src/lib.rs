//! Citybounds - city outline GeoJSON from borough shapefiles and street networks
//!
//! This library provides the loaders, geometry operations and pipelines shared
//! by the `nyc_boundary` and `nyc_walkable_area` binaries.

pub mod config;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod network;
pub mod output;
pub mod pipeline;
pub mod shapes;

pub use crs::Crs;
pub use error::PipelineError;
pub use pipeline::{BoundaryPipeline, WalkablePipeline};
