//! Boundary loading from ESRI shapefiles.
//!
//! Geometry comes from the `.shp`, the CRS from the `.prj` sidecar and record
//! names from the `.dbf` sidecar. Only the `.shp` is mandatory.

use std::fs;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape, ShapeReader};
use tracing::{debug, info, warn};

use crate::crs::{wkt, Crs};
use crate::error::{PipelineError, Result};

/// One polygon record of a boundary dataset
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRecord {
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Ordered polygon records sharing one CRS
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayer {
    pub records: Vec<BoundaryRecord>,
    pub crs: Option<Crs>,
}

impl BoundaryLayer {
    pub fn geometries(&self) -> impl Iterator<Item = &MultiPolygon<f64>> {
        self.records.iter().map(|r| &r.geometry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How to interpret a shapefile's sidecars
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Used instead of the `.prj` when set
    pub crs_override: Option<Crs>,
    /// Attribute columns tried, in order, for a record's name
    pub name_fields: Vec<String>,
}

/// Load every polygon record of the shapefile at `path`
pub fn load_boundaries(path: &Path, options: &LoadOptions) -> Result<BoundaryLayer> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }

    info!("Loading boundaries from {}", path.display());

    let what = path.display().to_string();
    let mut reader = ShapeReader::from_path(path).map_err(|e| PipelineError::parse(&what, e))?;

    let names = read_names(&path.with_extension("dbf"), &options.name_fields);

    let mut records = Vec::new();
    for (index, shape) in reader.iter_shapes().enumerate() {
        let shape = shape.map_err(|e| PipelineError::parse(&what, e))?;

        let geometry = match shape {
            Shape::Polygon(p) => rings_to_multi_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::PolygonM(p) => rings_to_multi_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::PolygonZ(p) => rings_to_multi_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::NullShape => {
                warn!("Skipping null shape at record {}", index);
                continue;
            }
            other => {
                return Err(PipelineError::parse(
                    &what,
                    format!("record {} is a {:?}, expected a polygon", index, other.shapetype()),
                ))
            }
        };

        records.push(BoundaryRecord {
            name: names.get(index).cloned().flatten(),
            geometry,
        });
    }

    let crs = match &options.crs_override {
        Some(crs) => Some(crs.clone()),
        None => read_prj(&path.with_extension("prj"))?,
    };

    debug!("Loaded {} polygon records", records.len());

    Ok(BoundaryLayer { records, crs })
}

/// Group shapefile rings into polygons: each outer ring opens a polygon and
/// the inner rings that follow are its holes.
fn rings_to_multi_polygon<P, F>(rings: &[PolygonRing<P>], to_coord: F) -> MultiPolygon<f64>
where
    F: Fn(&P) -> Coord<f64>,
{
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for ring in rings {
        let line = LineString::new(ring.points().iter().map(&to_coord).collect());
        match ring {
            PolygonRing::Outer(_) => polygons.push(Polygon::new(line, vec![])),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line),
                None => {
                    // Hole with no shell; keep the area rather than lose it
                    polygons.push(Polygon::new(line, vec![]));
                }
            },
        }
    }

    MultiPolygon::new(polygons)
}

fn read_prj(path: &PathBuf) -> Result<Option<Crs>> {
    match fs::read_to_string(path) {
        Ok(text) => wkt::crs_from_wkt(&text).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No .prj found at {}; CRS is undefined", path.display());
            Ok(None)
        }
        Err(e) => Err(PipelineError::io(path.clone(), e)),
    }
}

/// Names by record index. A missing or unreadable `.dbf` yields no names.
fn read_names(path: &Path, fields: &[String]) -> Vec<Option<String>> {
    if fields.is_empty() || !path.exists() {
        return Vec::new();
    }

    let records = match dbase::Reader::from_path(path).and_then(|mut r| r.read()) {
        Ok(records) => records,
        Err(e) => {
            warn!("Could not read attributes from {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    records
        .iter()
        .map(|record| {
            fields.iter().find_map(|field| match record.get(field) {
                Some(FieldValue::Character(Some(s))) if !s.trim().is_empty() => {
                    Some(s.trim().to_string())
                }
                Some(FieldValue::Memo(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
        })
        .collect()
}

/// Polygon shapefile fixtures
#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;

    use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon, PolygonRing, ShapeWriter, Writer};

    fn to_polygon(ring: &[[f64; 2]]) -> Polygon {
        let points = ring.iter().map(|p| Point::new(p[0], p[1])).collect();
        Polygon::with_rings(vec![PolygonRing::Outer(points)])
    }

    /// Write `rings` (one outer ring per record) as a `.shp`/`.shx` pair
    pub fn write_polygon_shp(path: &Path, rings: &[Vec<[f64; 2]>]) {
        let polygons: Vec<Polygon> = rings.iter().map(|r| to_polygon(r)).collect();
        ShapeWriter::from_path(path)
            .unwrap()
            .write_shapes(&polygons)
            .unwrap();
    }

    /// Like [`write_polygon_shp`], plus a `.dbf` with one character column per
    /// field. Empty strings are written as blank values.
    pub fn write_attributed_polygon_shp(
        path: &Path,
        rings: &[Vec<[f64; 2]>],
        fields: &[&str],
        rows: &[Vec<&str>],
    ) {
        let table = fields.iter().fold(TableWriterBuilder::new(), |table, field| {
            table.add_character_field((*field).try_into().unwrap(), 32)
        });
        let mut writer = Writer::from_path(path, table).unwrap();

        for (ring, row) in rings.iter().zip(rows) {
            let mut record = Record::default();
            for (field, value) in fields.iter().zip(row) {
                let value = (!value.is_empty()).then(|| value.to_string());
                record.insert(field.to_string(), FieldValue::Character(value));
            }
            writer
                .write_shape_and_record(&to_polygon(ring), &record)
                .unwrap();
        }
    }

    /// Clockwise axis-aligned square
    pub fn square(x: f64, y: f64, size: f64) -> Vec<[f64; 2]> {
        vec![
            [x, y],
            [x, y + size],
            [x + size, y + size],
            [x + size, y],
            [x, y],
        ]
    }
}
