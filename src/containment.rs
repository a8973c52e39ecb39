//! Axis-aligned bounding boxes for primitives and spatial acceleration.
//!
//! This module provides the box type shared by every part of the crate. A
//! box bounds a single primitive, describes the domain of a scene, and
//! describes the region covered by each node of the box tree.
//!
//! The box system provides:
//! - Point containment (boundaries inclusive)
//! - Box/box intersection and containment tests
//! - Union, intersection and splitting along an axis
//! - Unbounded boxes for infinite scene domains
//! - Inverted boxes as a legal representation of empty volume
//!
//! # Empty Boxes
//!
//! A box whose low corner exceeds its high corner on any axis is empty. Empty
//! boxes contain no points, intersect nothing and are ignored by unions. They
//! are not errors.

use std::fmt;

use nalgebra::Point3;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn contains_point_inclusive() {
        let b = BoundingBox::new([-1.0, -1.0, -1.0], [1.0, 2.0, 3.0]);
        assert!(b.contains_point(&Point3::new(0.0, 0.0, 0.0)));
        assert!(b.contains_point(&Point3::new(1.0, 2.0, 3.0)));
        assert!(b.contains_point(&Point3::new(-1.0, -1.0, -1.0)));
        assert!(!b.contains_point(&Point3::new(1.0 + 1e-9, 0.0, 0.0)));
        assert!(!b.contains_point(&Point3::new(0.0, 0.0, 3.1)));
    }

    #[test]
    fn inverted_box_is_empty() {
        let b = BoundingBox::new([1.0, 0.0, 0.0], [-1.0, 1.0, 1.0]);
        assert!(b.is_empty());
        assert!(!b.contains_point(&Point3::new(0.0, 0.5, 0.5)));
        assert_eq!(b.volume(), 0.0);

        let other = BoundingBox::new([-5.0, -5.0, -5.0], [5.0, 5.0, 5.0]);
        assert!(!b.intersects(&other));
        assert!(!other.intersects(&b));
        assert_eq!(other.union(&b), other);
        assert!(other.contains_box(&b));
    }

    #[test]
    fn unbounded_contains_everything() {
        let b = BoundingBox::unbounded();
        assert!(!b.is_finite());
        assert!(b.contains_point(&Point3::new(1e300, -1e300, 0.0)));
        assert!(b.contains_box(&BoundingBox::new([-1e9, 0.0, 0.0], [1e9, 1.0, 1.0])));
    }

    #[test]
    fn intersects_touching_faces() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
        let c = BoundingBox::new([1.5, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn split_and_union() {
        let b = BoundingBox::new([0.0, 0.0, 0.0], [4.0, 2.0, 2.0]);
        let (lower, upper) = b.split(0, 1.0);
        assert_eq!(lower.high.x, 1.0);
        assert_eq!(upper.low.x, 1.0);
        assert_eq!(lower.union(&upper), b);
        assert!((lower.volume() + upper.volume() - b.volume()).abs() < 1e-12);
    }

    #[test]
    fn accumulate_points() {
        let b = [
            Point3::new(1.0, -2.0, 0.5),
            Point3::new(-1.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 4.0),
        ]
        .iter()
        .fold(BoundingBox::empty(), |acc, p| acc.with_point(p));
        assert_eq!(b, BoundingBox::new([-1.0, -2.0, 0.0], [1.0, 3.0, 4.0]));
    }
}

/// Axis-aligned bounding box defined by its low and high corners.
///
/// **Context**: Exact containment tests against rotated cylinders, oblique
/// blocks or extruded polygons are comparatively expensive. Boxes give a fast
/// conservative filter: a point outside a primitive's box cannot be inside
/// the primitive.
///
/// **How it Works**: Stores minimum and maximum coordinates along each axis.
/// Comparisons are inclusive so that points on a face belong to the box, and
/// infinite coordinates are allowed for unbounded domains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub low: Point3<f64>,
    pub high: Point3<f64>,
}

impl BoundingBox {
    pub fn new(low: impl Into<Point3<f64>>, high: impl Into<Point3<f64>>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
        }
    }

    /// A box covering all of space.
    pub fn unbounded() -> Self {
        Self {
            low: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            high: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    /// The canonical empty box, the identity for [`BoundingBox::with_point`].
    pub fn empty() -> Self {
        Self {
            low: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            high: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.low[i] > self.high[i])
    }

    pub fn is_finite(&self) -> bool {
        (0..3).all(|i| self.low[i].is_finite() && self.high[i].is_finite())
    }

    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.low[i] && p[i] <= self.high[i])
    }

    /// Whether `other` lies entirely within this box. Empty boxes lie within anything.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty()
            && (0..3).all(|i| other.low[i] >= self.low[i] && other.high[i] <= self.high[i])
    }

    /// Whether the two boxes share at least one point (touching faces count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (0..3).all(|i| self.low[i] <= other.high[i] && other.low[i] <= self.high[i])
    }

    /// Smallest box holding both boxes, ignoring empty ones.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        BoundingBox {
            low: self.low.inf(&other.low),
            high: self.high.sup(&other.high),
        }
    }

    /// Overlap of the two boxes; inverted (empty) when they are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            low: self.low.sup(&other.low),
            high: self.high.inf(&other.high),
        }
    }

    /// Grows the box to include `p`.
    pub fn with_point(&self, p: &Point3<f64>) -> BoundingBox {
        BoundingBox {
            low: self.low.inf(p),
            high: self.high.sup(p),
        }
    }

    /// Cuts the box in two along `axis` (0 = x, 1 = y, 2 = z) at `at`.
    pub fn split(&self, axis: usize, at: f64) -> (BoundingBox, BoundingBox) {
        let mut lower = *self;
        let mut upper = *self;
        lower.high[axis] = at;
        upper.low[axis] = at;
        (lower, upper)
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.low, &self.high)
    }

    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.high - self.low).product()
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}..{}, {}..{}, {}..{})",
            self.low.x, self.high.x, self.low.y, self.high.y, self.low.z, self.high.z
        )
    }
}
