//! Coordinate reference systems and reprojection.
//!
//! A [`Crs`] is either an EPSG code or a raw PROJ string. Geographic systems
//! take and return degrees; the radian handling `proj4rs` needs stays inside
//! [`Reprojector`].

pub mod wkt;

use std::fmt;
use std::str::FromStr;

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::proj::Proj;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    Epsg(u16),
    Proj(String),
}

impl Crs {
    /// WGS 84 longitude/latitude, the CRS of every output file
    pub const WGS84: Crs = Crs::Epsg(4326);

    fn build(&self) -> Result<Proj> {
        let proj = match self {
            Crs::Epsg(code) => Proj::from_epsg_code(*code),
            Crs::Proj(defn) => Proj::from_proj_string(defn),
        };
        proj.map_err(|e| PipelineError::Projection(format!("{}: {}", self, e)))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj(defn) => f.write_str(defn),
        }
    }
}

impl FromStr for Crs {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PipelineError::UnknownCrs);
        }

        if let Some((authority, code)) = s.split_once(':') {
            if authority.eq_ignore_ascii_case("epsg") {
                return code
                    .trim()
                    .parse::<u16>()
                    .map(Crs::Epsg)
                    .map_err(|e| PipelineError::parse(format!("CRS '{}'", s), e));
            }
        }

        if s.starts_with('+') {
            return Ok(Crs::Proj(s.to_string()));
        }

        Err(PipelineError::parse(
            format!("CRS '{}'", s),
            "expected EPSG:<code> or a PROJ string",
        ))
    }
}

/// A prepared transformation between two CRSs
pub struct Reprojector {
    src: Proj,
    dst: Proj,
    identity: bool,
}

impl Reprojector {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        Ok(Self {
            src: from.build()?,
            dst: to.build()?,
            identity: from == to,
        })
    }

    /// Transform a single coordinate
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.identity {
            return Ok(coord);
        }

        let mut point = if self.src.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|e| PipelineError::Projection(format!("({}, {}): {}", coord.x, coord.y, e)))?;

        let (x, y) = if self.dst.is_latlong() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(PipelineError::Projection(format!(
                "({}, {}) has no finite image",
                coord.x, coord.y
            )));
        }

        Ok(Coord { x, y })
    }

    pub fn transform_multi_polygon(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        if self.identity {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.transform_coord(c))
    }
}

/// Reproject `geometry` from `from` into `to`.
///
/// Fails with [`PipelineError::UnknownCrs`] when the source CRS is undefined.
pub fn reproject(
    geometry: &MultiPolygon<f64>,
    from: Option<&Crs>,
    to: &Crs,
) -> Result<MultiPolygon<f64>> {
    let from = from.ok_or(PipelineError::UnknownCrs)?;
    debug!("Reprojecting {} polygons from {} to {}", geometry.0.len(), from, to);
    Reprojector::new(from, to)?.transform_multi_polygon(geometry)
}
