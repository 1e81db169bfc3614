use serde::{Deserialize, Serialize};

use crate::types::{GeoFileError, GeoFileResult};

/// An axis-aligned 2D bounding box represented by minimum and maximum coordinates.
///
/// `BoundingBox` summarizes a record's geometry and expresses query regions.
/// Point geometries collapse to a box with `min_x == max_x` and `min_y == max_y`.
///
/// # Examples
///
/// ```rust
/// use geofile::BoundingBox;
///
/// let region = BoundingBox::new(13.2, 52.2, 13.8, 52.8);
/// let point = BoundingBox::point(13.5, 52.5);
/// assert!(region.intersects(&point));
/// ```
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundingBox({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl BoundingBox {
    /// Creates a new bounding box with the specified coordinates.
    ///
    /// No validation happens here; use [`BoundingBox::validate`] or
    /// [`BoundingBox::from_slice`] for caller-supplied values.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Zero-area box at a single position.
    pub fn point(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x, y, x, y)
    }

    /// The box covering every longitude/latitude pair.
    pub fn world() -> BoundingBox {
        BoundingBox::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// The identity for [`BoundingBox::expand`]: contains nothing.
    pub fn empty() -> BoundingBox {
        BoundingBox::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Builds and validates a box from `[min_x, min_y, max_x, max_y]`.
    ///
    /// Fails with [`GeoFileError::InvalidArgument`] unless the slice holds
    /// exactly four finite numbers with `min <= max` on both axes.
    pub fn from_slice(values: &[f64]) -> GeoFileResult<BoundingBox> {
        match values {
            [min_x, min_y, max_x, max_y] => {
                let bbox = BoundingBox::new(*min_x, *min_y, *max_x, *max_y);
                bbox.validate()?;
                Ok(bbox)
            }
            _ => Err(GeoFileError::invalid_argument(format!(
                "bbox must have exactly 4 numbers [minX, minY, maxX, maxY], got {}",
                values.len()
            ))),
        }
    }

    /// Checks that all coordinates are finite and `min <= max` on both axes.
    pub fn validate(&self) -> GeoFileResult<()> {
        let coords = [self.min_x, self.min_y, self.max_x, self.max_y];
        if let Some(bad) = coords.iter().find(|v| !v.is_finite()) {
            return Err(GeoFileError::invalid_argument(format!(
                "bbox coordinates must be finite, got {}",
                bad
            )));
        }
        if self.min_x > self.max_x {
            return Err(GeoFileError::invalid_argument(format!(
                "bbox minX {} is greater than maxX {}",
                self.min_x, self.max_x
            )));
        }
        if self.min_y > self.max_y {
            return Err(GeoFileError::invalid_argument(format!(
                "bbox minY {} is greater than maxY {}",
                self.min_y, self.max_y
            )));
        }
        Ok(())
    }

    /// True for the result of [`BoundingBox::empty`] before anything was added.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Axis-aligned overlap test. Touching edges count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grows this box to cover `other`.
    pub fn expand(&mut self, other: &BoundingBox) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Grows this box to cover a single position.
    pub fn expand_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        let mut merged = *self;
        merged.expand(other);
        merged
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}
