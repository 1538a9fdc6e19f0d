//! Bounding boxes, coordinate conventions and IoU.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned bounding box `(x1, y1, x2, y2)`.
///
/// Serialized as a plain `[x1, y1, x2, y2]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Area, clamped to zero for inverted boxes.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// True if every coordinate is `<= 1.0`.
    ///
    /// This is the heuristic behind [`BoxFormat::Auto`]; an absolute box
    /// smaller than one pixel near the origin is misread as normalized.
    pub fn looks_normalized(&self) -> bool {
        !self.as_array().iter().any(|&v| v > 1.0)
    }

    /// Check that the box is finite and non-degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidDetection(format!(
                "bbox has non-finite coordinates: {:?}",
                self.as_array()
            )));
        }
        if self.x2 <= self.x1 || self.y2 <= self.y1 {
            return Err(Error::InvalidDetection(format!(
                "bbox must satisfy x1 < x2 and y1 < y2, got {:?}",
                self.as_array()
            )));
        }
        Ok(())
    }

    /// Scale a normalized box to pixel coordinates.
    pub fn denormalize(&self, size: ImageSize) -> Self {
        let w = size.width as f64;
        let h = size.height as f64;
        Self {
            x1: self.x1 * w,
            y1: self.y1 * h,
            x2: self.x2 * w,
            y2: self.y2 * h,
        }
    }

    /// Resolve the box to absolute pixel coordinates under `format`.
    pub fn to_absolute(&self, format: BoxFormat, size: ImageSize) -> Self {
        let normalized = match format {
            BoxFormat::Auto => self.looks_normalized(),
            BoxFormat::Normalized => true,
            BoxFormat::Absolute => false,
        };
        if normalized {
            self.denormalize(size)
        } else {
            *self
        }
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        b.as_array()
    }
}

/// Coordinate convention of incoming boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// Normalized if no coordinate exceeds 1.0, absolute otherwise.
    #[default]
    Auto,
    /// Coordinates are fractions of the image size.
    Normalized,
    /// Coordinates are pixels.
    Absolute,
}

/// Image dimensions, `(height, width)` order as reported by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

impl ImageSize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

/// Intersection over Union of two boxes.
///
/// Returns 0.0 for disjoint boxes and for a zero-area union.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter_area = inter_w * inter_h;

    let union_area = a.area() + b.area() - inter_area;
    if union_area <= 0.0 || inter_area <= 0.0 {
        return 0.0;
    }
    inter_area / union_area
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_partial_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert_relative_eq!(iou(&a, &b), 25.0 / 175.0, epsilon = 1e-12);
        assert_relative_eq!(iou(&b, &a), 25.0 / 175.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_identical() {
        let a = BBox::new(100.0, 100.0, 200.0, 200.0);
        assert_relative_eq!(iou(&a, &a), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_disjoint_and_touching() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let far = BBox::new(20.0, 20.0, 30.0, 30.0);
        let edge = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(iou(&a, &far), 0.0);
        assert_eq!(iou(&a, &edge), 0.0);
    }

    #[test]
    fn test_iou_degenerate() {
        let point = BBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(iou(&point, &point), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
        assert!(BBox::new(1.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(BBox::new(0.0, 2.0, 1.0, 1.0).validate().is_err());
        assert!(BBox::new(f64::NAN, 0.0, 1.0, 1.0).validate().is_err());
        assert!(BBox::new(0.0, 0.0, f64::INFINITY, 1.0).validate().is_err());
    }

    #[test]
    fn test_auto_format_denormalizes_small_boxes() {
        let size = ImageSize::new(480, 640);
        let norm = BBox::new(0.25, 0.5, 0.5, 1.0);
        let abs = norm.to_absolute(BoxFormat::Auto, size);
        assert_eq!(abs, BBox::new(160.0, 240.0, 320.0, 480.0));

        let pixels = BBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(pixels.to_absolute(BoxFormat::Auto, size), pixels);
    }

    #[test]
    fn test_explicit_format_overrides_heuristic() {
        let size = ImageSize::new(100, 100);
        let tiny = BBox::new(0.1, 0.1, 0.9, 0.9);
        assert_eq!(tiny.to_absolute(BoxFormat::Absolute, size), tiny);
        assert_eq!(
            tiny.to_absolute(BoxFormat::Normalized, size),
            BBox::new(10.0, 10.0, 90.0, 90.0)
        );
    }

    #[test]
    fn test_serde_as_array() {
        let b: BBox = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(b, BBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.0,4.0]");
    }
}
