use geo::{
    Area, BooleanOps, Euclidean, Geometry, Intersects, Length, LineString, MultiLineString,
    MultiPolygon,
};

use crate::error::{Result, WidthError};

/// Geometry operations the pipeline delegates to an external engine.
pub trait GeometryToolkit {
    /// Planar area in the layer's native units.
    fn area(&self, geometry: &Geometry<f64>) -> f64;

    /// Planar length in the layer's native units. Non-linear geometries have length zero.
    fn length(&self, geometry: &Geometry<f64>) -> f64;

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool;

    /// The parts of `line` lying inside `polygon`.
    fn clip_line(
        &self,
        line: &Geometry<f64>,
        polygon: &Geometry<f64>,
    ) -> Result<MultiLineString<f64>>;
}

/// [`GeometryToolkit`] backed by the `geo` crate's planar algorithms.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarToolkit;

impl PlanarToolkit {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryToolkit for PlanarToolkit {
    fn area(&self, geometry: &Geometry<f64>) -> f64 {
        geometry.unsigned_area()
    }

    fn length(&self, geometry: &Geometry<f64>) -> f64 {
        match as_lines(geometry) {
            Ok(lines) => Euclidean.length(&lines),
            Err(_) => 0.0,
        }
    }

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        a.intersects(b)
    }

    fn clip_line(
        &self,
        line: &Geometry<f64>,
        polygon: &Geometry<f64>,
    ) -> Result<MultiLineString<f64>> {
        let lines = as_lines(line)?;
        let area = as_polygons(polygon)?;
        Ok(area.clip(&lines, false))
    }
}

fn as_lines(geometry: &Geometry<f64>) -> Result<MultiLineString<f64>> {
    match geometry {
        Geometry::Line(line) => Ok(MultiLineString::new(vec![LineString::from(*line)])),
        Geometry::LineString(ls) => Ok(MultiLineString::new(vec![ls.clone()])),
        Geometry::MultiLineString(mls) => Ok(mls.clone()),
        Geometry::GeometryCollection(collection) => {
            let mut parts = Vec::new();
            for member in collection {
                parts.extend(as_lines(member)?.0);
            }
            Ok(MultiLineString::new(parts))
        }
        other => Err(WidthError::Geometry(format!(
            "expected a line geometry, got {}",
            type_name(other)
        ))),
    }
}

fn as_polygons(geometry: &Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Ok(mp.clone()),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Ok(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(collection) => {
            let mut parts = Vec::new();
            for member in collection {
                parts.extend(as_polygons(member)?.0);
            }
            Ok(MultiPolygon::new(parts))
        }
        other => Err(WidthError::Geometry(format!(
            "expected a polygon geometry, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
