//! Geometric primitives shared by every pipeline stage.
//!
//! All coordinates live in the page coordinate space of the intermediate SVG
//! (user units, y growing downwards). Boxes are plain `Copy` values: a stage
//! that needs a different box computes a new one instead of mutating.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle `(x0, y0, x1, y1)` with `x0 ≤ x1` and `y0 ≤ y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest box enclosing every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox = bbox.include_point(x, y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// `(x1 - x0) * (y1 - y0)`.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Grow the box so it covers `(x, y)`.
    pub fn include_point(self, x: f64, y: f64) -> Self {
        Self {
            x0: self.x0.min(x),
            y0: self.y0.min(y),
            x1: self.x1.max(x),
            y1: self.y1.max(y),
        }
    }

    /// Minimal box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Coordinate-wise containment, edges inclusive.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    /// Edge-alignment proximity: true when ANY of the four corresponding
    /// edge coordinates differ by strictly less than `distance`.
    ///
    /// This is not a geometric distance. Two far-apart boxes sharing one
    /// edge coordinate are "near"; two touching boxes misaligned on all four
    /// edges are not.
    pub fn edges_within(&self, other: &BoundingBox, distance: f64) -> bool {
        (self.x0 - other.x0).abs() < distance
            || (self.x1 - other.x1).abs() < distance
            || (self.y0 - other.y0).abs() < distance
            || (self.y1 - other.y1).abs() < distance
    }

    /// Every coordinate truncated toward zero, as an integer cast does.
    pub fn truncated(&self) -> Self {
        Self {
            x0: self.x0.trunc(),
            y0: self.y0.trunc(),
            x1: self.x1.trunc(),
            y1: self.y1.trunc(),
        }
    }

    /// Clamp the origin corner to be non-negative. `x1`/`y1` are untouched.
    pub fn clamped_to_origin(&self) -> Self {
        Self {
            x0: self.x0.max(0.0),
            y0: self.y0.max(0.0),
            x1: self.x1,
            y1: self.y1,
        }
    }

    /// True when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x0, self.y0, self.x1, self.y1)
    }
}

/// The SVG element a [`Primitive`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Path,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
}

impl PrimitiveKind {
    /// Map an SVG local tag name to a kind.
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"path" => Some(Self::Path),
            b"rect" => Some(Self::Rect),
            b"circle" => Some(Self::Circle),
            b"ellipse" => Some(Self::Ellipse),
            b"line" => Some(Self::Line),
            b"polyline" => Some(Self::Polyline),
            b"polygon" => Some(Self::Polygon),
            _ => None,
        }
    }

    /// Position of this kind in page load order: every path first, then
    /// polylines, polygons, lines, ellipses, circles and rects.
    pub fn load_order(self) -> u8 {
        match self {
            Self::Path => 0,
            Self::Polyline => 1,
            Self::Polygon => 2,
            Self::Line => 3,
            Self::Ellipse => 4,
            Self::Circle => 5,
            Self::Rect => 6,
        }
    }
}

/// A single vector element extracted from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Position among all drawable elements of the page, in load order
    /// (grouped by [`PrimitiveKind::load_order`], document order within a kind).
    pub index: usize,
    pub kind: PrimitiveKind,
    pub bbox: BoundingBox,
}

impl Primitive {
    pub fn area(&self) -> f64 {
        self.bbox.area()
    }
}

/// A merged cluster of primitives representing one logical diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRegion {
    /// 1-based position in merge output order.
    pub rank: usize,
    /// Exact union of the member boxes.
    pub bbox: BoundingBox,
    /// Indices into the box list the region was merged from.
    pub members: Vec<usize>,
}

impl DiagramRegion {
    /// Integer export area: the union truncated to integers, then clamped so
    /// the origin corner is non-negative.
    pub fn crop_box(&self) -> BoundingBox {
        self.bbox.truncated().clamped_to_origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_corner_order() {
        let b = BoundingBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BoundingBox::new(0.0, 5.0, 10.0, 20.0));
        assert!(b.x0 <= b.x1 && b.y0 <= b.y1);
    }

    #[test]
    fn area_is_width_times_height() {
        let b = BoundingBox::new(0.0, 0.0, 40.0, 25.0);
        assert_eq!(b.area(), 1000.0);
    }

    #[test]
    fn union_contains_both() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, -3.0, 20.0, 8.0);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u, BoundingBox::new(0.0, -3.0, 20.0, 10.0));
    }

    #[test]
    fn edge_alignment_ignores_euclidean_distance() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        // Far away but left edges nearly aligned.
        let far_aligned = BoundingBox::new(5.0, 900.0, 50.0, 950.0);
        assert!(a.edges_within(&far_aligned, 30.0));

        // Touching-close but misaligned on every edge.
        let big = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let near_misaligned = BoundingBox::new(105.0, 40.0, 205.0, 140.0);
        assert!(!big.edges_within(&near_misaligned, 30.0));
    }

    #[test]
    fn edges_within_is_strict() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(30.0, 30.0, 40.0, 40.0);
        assert!(!a.edges_within(&b, 30.0));
        assert!(a.edges_within(&b, 30.5));
    }

    #[test]
    fn crop_box_truncates_and_clamps_origin() {
        let region = DiagramRegion {
            rank: 1,
            bbox: BoundingBox::new(-4.7, 12.9, 120.6, 80.2),
            members: vec![0],
        };
        assert_eq!(region.crop_box(), BoundingBox::new(0.0, 12.0, 120.0, 80.0));
    }

    #[test]
    fn from_points_empty_is_none() {
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
        let b = BoundingBox::from_points([(3.0, 4.0), (-1.0, 9.0), (2.0, 0.0)]).unwrap();
        assert_eq!(b, BoundingBox::new(-1.0, 0.0, 3.0, 9.0));
    }

    #[test]
    fn kind_from_tag() {
        assert_eq!(PrimitiveKind::from_tag(b"polygon"), Some(PrimitiveKind::Polygon));
        assert_eq!(PrimitiveKind::from_tag(b"text"), None);
    }
}
