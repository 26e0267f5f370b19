//! Bounding boxes and coordinate-space conversion.
//!
//! Models express box coordinates either on a fixed 0-999 grid relative to
//! the image or directly in pixels. Everything leaving this module is in
//! absolute pixels of the original upload, clamped to the image frame.

use serde::{Deserialize, Serialize};

use crate::types::ImageFrame;

/// Upper bound of the normalized grid used by tag-style grounding output.
pub const NORMALIZED_MAX: f64 = 999.0;

/// Axis-aligned box in absolute pixel coordinates.
///
/// Always satisfies `x1 < x2` and `y1 < y2` when produced by
/// [`BoundingBox::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Clamp raw `[x1, y1, x2, y2]` pixel coordinates into `frame`.
    ///
    /// Returns `None` when any coordinate is not finite or when the clamped
    /// box is empty or inverted.
    pub fn clamped(raw: [f64; 4], frame: ImageFrame) -> Option<Self> {
        if raw.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let w = f64::from(frame.width);
        let h = f64::from(frame.height);
        let x1 = raw[0].clamp(0.0, w).round() as u32;
        let y1 = raw[1].clamp(0.0, h).round() as u32;
        let x2 = raw[2].clamp(0.0, w).round() as u32;
        let y2 = raw[3].clamp(0.0, h).round() as u32;

        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }
}

/// Coordinate convention of a raw box emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// Integers on the `0..=999` grid, relative to image width/height.
    Normalized999,
    /// Already absolute pixels of the input image.
    AbsolutePixels,
}

impl CoordinateSpace {
    /// Convert raw coordinates into (unclamped) absolute pixels.
    ///
    /// Normalized coordinates are rescaled with `norm / 999 * size` and
    /// floored to whole pixels. The product is taken first so that exact
    /// grid points map to exact pixels.
    pub fn to_absolute(self, raw: [f64; 4], frame: ImageFrame) -> [f64; 4] {
        match self {
            CoordinateSpace::AbsolutePixels => raw,
            CoordinateSpace::Normalized999 => {
                let w = f64::from(frame.width);
                let h = f64::from(frame.height);
                [
                    (raw[0] * w / NORMALIZED_MAX).floor(),
                    (raw[1] * h / NORMALIZED_MAX).floor(),
                    (raw[2] * w / NORMALIZED_MAX).floor(),
                    (raw[3] * h / NORMALIZED_MAX).floor(),
                ]
            }
        }
    }
}

/// Project a pixel box onto the 0-999 grid (inverse of
/// [`CoordinateSpace::Normalized999`]).
pub fn normalize_box(bbox: &BoundingBox, frame: ImageFrame) -> [u32; 4] {
    let scale = |v: u32, size: u32| -> u32 {
        if size == 0 {
            return 0;
        }
        let n = (f64::from(v) / f64::from(size) * NORMALIZED_MAX).round();
        n.clamp(0.0, NORMALIZED_MAX) as u32
    };
    [
        scale(bbox.x1, frame.width),
        scale(bbox.y1, frame.height),
        scale(bbox.x2, frame.width),
        scale(bbox.y2, frame.height),
    ]
}
