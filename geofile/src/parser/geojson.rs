//! GeoJSON lines: one Feature or bare geometry object per line.
//!
//! Lines are decoded with the `geojson` crate; the bounding box is the
//! union of every position in the geometry, ignoring ordinates past the
//! second.

use geojson::{GeoJson, Geometry, JsonObject, Value};

use super::LineFormat;
use crate::bounding_box::BoundingBox;

/// Parses a GeoJSON line into the bounding box of its geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonFormat;

impl GeoJsonFormat {
    pub fn new() -> Self {
        GeoJsonFormat
    }
}

impl LineFormat for GeoJsonFormat {
    fn parse_line(&self, line: &[u8]) -> Result<BoundingBox, String> {
        let object: JsonObject =
            serde_json::from_slice(line).map_err(|e| format!("invalid JSON: {}", e))?;
        let geometry = match GeoJson::try_from(object)
            .map_err(|e| format!("invalid GeoJSON: {}", e))?
        {
            GeoJson::Geometry(geometry) => geometry,
            GeoJson::Feature(feature) => feature
                .geometry
                .ok_or_else(|| "feature has no geometry".to_string())?,
            GeoJson::FeatureCollection(_) => {
                return Err("expected one feature per line, got FeatureCollection".to_string())
            }
        };

        let mut bbox = BoundingBox::empty();
        include_geometry(&geometry, &mut bbox)?;
        if bbox.is_empty() {
            return Err("geometry has no positions".to_string());
        }
        Ok(bbox)
    }
}

fn include_geometry(geometry: &Geometry, bbox: &mut BoundingBox) -> Result<(), String> {
    match &geometry.value {
        Value::Point(position) => include_position(position, bbox),
        Value::MultiPoint(positions) | Value::LineString(positions) => {
            include_all(positions, bbox)
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => lines
            .iter()
            .try_for_each(|positions| include_all(positions, bbox)),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .try_for_each(|positions| include_all(positions, bbox)),
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .try_for_each(|geometry| include_geometry(geometry, bbox)),
    }
}

fn include_all(positions: &[Vec<f64>], bbox: &mut BoundingBox) -> Result<(), String> {
    positions
        .iter()
        .try_for_each(|position| include_position(position, bbox))
}

fn include_position(position: &[f64], bbox: &mut BoundingBox) -> Result<(), String> {
    let (x, y) = match position {
        [x, y, ..] => (*x, *y),
        other => {
            return Err(format!(
                "position needs two ordinates, got {}",
                other.len()
            ))
        }
    };
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("non-finite coordinate ({}, {})", x, y));
    }
    bbox.expand_point(x, y);
    Ok(())
}
