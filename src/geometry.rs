//! Planar union and convex hull.

use geo::{BooleanOps, ConvexHull, Coord, Geometry, MultiPoint, MultiPolygon, Point, Polygon};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Union every input into one geometry.
///
/// No input gives an empty multipolygon; a single input is returned as is.
pub fn merge_polygons<'a, I>(polygons: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let mut iter = polygons.into_iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(vec![]);
    };

    let mut merged = first.clone();
    let mut count = 1;
    for polygon in iter {
        merged = merged.union(polygon);
        count += 1;
    }

    debug!(
        "Merged {} inputs into {} polygon(s)",
        count,
        merged.0.len()
    );
    merged
}

/// Convex hull of a point set.
///
/// Fewer than three distinct or collinear points give the degenerate hull
/// `geo` defines: a polygon whose ring collapses onto a point or segment.
pub fn convex_hull(points: &[Coord<f64>]) -> Result<Polygon<f64>> {
    if points.is_empty() {
        return Err(PipelineError::EmptyInput("no points to enclose"));
    }
    let points: MultiPoint<f64> = points.iter().map(|c| Point::from(*c)).collect();
    Ok(points.convex_hull())
}

/// A one-member multipolygon becomes a plain polygon for output
pub fn simplest(geometry: MultiPolygon<f64>) -> Geometry<f64> {
    if geometry.0.len() == 1 {
        let mut polygons = geometry.0;
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(geometry)
    }
}
