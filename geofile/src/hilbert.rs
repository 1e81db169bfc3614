//! Hilbert curve ordering for bulk index construction.
//!
//! Records are sorted by the Hilbert distance of their box centers before
//! being packed into leaves, so that each leaf covers a compact region and
//! sibling nodes overlap little.

use crate::bounding_box::BoundingBox;

/// Maximum order for Hilbert curve encoding (32 bits per dimension)
const MAX_HILBERT_ORDER: u32 = 32;

/// Encodes normalized coordinates to a Hilbert curve distance.
///
/// # Arguments
/// * `x` - X coordinate normalized to [0, 1]
/// * `y` - Y coordinate normalized to [0, 1]
/// * `order` - curve order (1-32, higher = more precision)
///
/// Values outside [0, 1] are clamped onto the grid.
pub fn hilbert_index(x: f64, y: f64, order: u32) -> u64 {
    debug_assert!(order > 0 && order <= MAX_HILBERT_ORDER, "order must be 1-32");

    let n = 1u64 << order;
    let cells = n as f64;
    let xi = ((x.clamp(0.0, 1.0) * cells) as u64).min(n - 1);
    let yi = ((y.clamp(0.0, 1.0) * cells) as u64).min(n - 1);

    xy2d(n, xi, yi)
}

/// Encodes absolute coordinates relative to `extent`.
///
/// An axis with zero range maps to the middle of the curve on that axis.
pub fn hilbert_index_bounded(x: f64, y: f64, extent: &BoundingBox, order: u32) -> u64 {
    let x_range = extent.max_x - extent.min_x;
    let y_range = extent.max_y - extent.min_y;

    let x_norm = if x_range > 0.0 {
        (x - extent.min_x) / x_range
    } else {
        0.5
    };

    let y_norm = if y_range > 0.0 {
        (y - extent.min_y) / y_range
    } else {
        0.5
    };

    hilbert_index(x_norm, y_norm, order)
}

/// Hilbert distance of a box center within `extent`.
pub fn hilbert_key(bbox: &BoundingBox, extent: &BoundingBox, order: u32) -> u64 {
    let (cx, cy) = bbox.center();
    hilbert_index_bounded(cx, cy, extent, order)
}

/// Converts grid cell (x, y) on an n x n Hilbert curve to its distance.
fn xy2d(n: u64, x: u64, y: u64) -> u64 {
    let mut d = 0u64;
    let mut x = x;
    let mut y = y;
    let mut s = n / 2;

    while s > 0 {
        let rx = ((x & s) > 0) as u64;
        let ry = ((y & s) > 0) as u64;
        d += s * s * ((3 * rx) ^ ry);
        rotate(n, &mut x, &mut y, rx, ry);
        s /= 2;
    }

    d
}

fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n.wrapping_sub(1).wrapping_sub(*x);
            *y = n.wrapping_sub(1).wrapping_sub(*y);
        }
        std::mem::swap(x, y);
    }
}
