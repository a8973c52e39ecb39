//! Solid primitives: containment, exact volume and bounding boxes.
//!
//! Every primitive is a case of the closed [`Shape`] enum paired with an
//! opaque material in [`Primitive`]. Shapes are immutable once constructed;
//! construction normalizes axes, precomputes local frames and rejects
//! degenerate parameters.
//!
//! Axial convention: cylinders, wedges and cones extend `height / 2` either
//! side of their center along the axis. Prisms are measured from their base
//! polygon, see [`crate::prism`].

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Matrix3, Point3, Vector3};
use rayon::prelude::*;

use crate::config::{BASIS_DET_THRESHOLD, VEC_LENGTH_THRESHOLD};
use crate::containment::BoundingBox;
use crate::error::{GeomError, Result};
use crate::prism::{Prism, SlantedPrism};

#[cfg(test)]
mod tests {

    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn z_cylinder() -> Cylinder {
        Cylinder::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 1.0]).unwrap()
    }

    fn all_shapes() -> Vec<Shape> {
        let s3 = 1.0 / 3.0_f64.sqrt();
        vec![
            Sphere::new([0.5, -0.2, 0.1], 1.3).into(),
            Sphere::new([0.0, 0.0, 0.0], -0.8).into(),
            Cylinder::new([0.1, 0.2, 0.3], 0.7, 2.5, [1.0, 1.0, 0.0])
                .unwrap()
                .into(),
            Wedge::new(
                [0.0, 0.0, 0.0],
                1.0,
                1.5,
                [0.0, 1.0, 1.0],
                2.0,
                [1.0, 0.0, 0.0],
            )
            .unwrap()
            .into(),
            Cone::new([0.0, 1.0, 0.0], 1.2, 2.0, [s3, s3, s3], 0.3)
                .unwrap()
                .into(),
            Block::new(
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.3, 1.0],
                [1.0, 2.0, 0.5],
            )
            .unwrap()
            .into(),
            Ellipsoid::new(
                [1.0, 0.0, -1.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [2.0, 1.0, 3.0],
            )
            .unwrap()
            .into(),
            Prism::new(
                vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [1.0, 0.4, 0.0], [0.0, 1.0, 0.0]],
                1.5,
                [0.0, 0.0, 1.0],
            )
            .unwrap()
            .into(),
            SlantedPrism::new(
                vec![[0.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 2.0, 2.0], [0.0, 0.0, 2.0]],
                1.0,
                [1.0, 0.0, 0.0],
                0.3,
            )
            .unwrap()
            .into(),
        ]
    }

    #[test]
    fn sphere_volume_and_sign() {
        let sphere = Sphere::new([0.0, 0.0, 0.0], 1.0);
        assert!((sphere.volume() - 4.0 / 3.0 * PI).abs() < 1e-10);

        let negative = Sphere::new([0.0, 0.0, 0.0], -1.0);
        assert!(negative.volume() < 0.0);
        assert!((negative.volume() + 4.0 / 3.0 * PI).abs() < 1e-10);
        // the sign of the radius does not change containment
        assert!(negative.contains(&Point3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn sphere_boundary() {
        let sphere = Sphere::new([1.0, 1.0, 1.0], 2.0);
        assert!(sphere.contains(&Point3::new(3.0 - EPS, 1.0, 1.0)));
        assert!(!sphere.contains(&Point3::new(3.0 + EPS, 1.0, 1.0)));
        assert!(!sphere.contains(&Point3::new(1.0, 1.0, -1.0 - EPS)));

        let b = sphere.bounding_box();
        assert_eq!(b, BoundingBox::new([-1.0, -1.0, -1.0], [3.0, 3.0, 3.0]));
    }

    #[test]
    fn cylinder_volume_and_containment() {
        let cyl = z_cylinder();
        assert!((cyl.volume() - 2.0 * PI).abs() < 1e-10);

        assert!(cyl.contains(&Point3::new(0.0, 0.0, 0.0)));
        assert!(cyl.contains(&Point3::new(0.5, 0.0, 0.5)));
        assert!(cyl.contains(&Point3::new(0.0, 0.0, 0.9)));
        assert!(cyl.contains(&Point3::new(1.0 - EPS, 0.0, 0.0)));
        assert!(!cyl.contains(&Point3::new(1.0 + EPS, 0.0, 0.0)));
        assert!(!cyl.contains(&Point3::new(0.0, 0.0, 1.0 + EPS)));
        assert!(!cyl.contains(&Point3::new(0.0, 0.0, -1.1)));
    }

    #[test]
    fn cylinder_axis_is_normalized() {
        let cyl = Cylinder::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 10.0]).unwrap();
        assert!((cyl.axis().norm() - 1.0).abs() < 1e-15);
        assert!(cyl.contains(&Point3::new(0.0, 0.0, 0.99)));
    }

    #[test]
    fn tilted_cylinder_bounding_box_is_tight() {
        let cyl = Cylinder::new([0.0, 0.0, 0.0], 1.0, 2.0, [1.0, 0.0, 0.0]).unwrap();
        let b = cyl.bounding_box();
        assert!((b.low - Point3::new(-1.0, -1.0, -1.0)).norm() < 1e-12);
        assert!((b.high - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn zero_axis_is_rejected() {
        let err = Cylinder::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GeomError::Construction(_)));
    }

    #[test]
    fn wedge_is_quarter_cylinder() {
        let wedge = Wedge::new(
            [0.0, 0.0, 0.0],
            1.0,
            2.0,
            [0.0, 0.0, 1.0],
            PI / 2.0,
            [1.0, 0.0, 0.0],
        )
        .unwrap();
        let expected = (PI / 2.0) / (2.0 * PI) * z_cylinder().volume();
        assert!((wedge.volume() - expected).abs() < 1e-10);

        assert!(wedge.contains(&Point3::new(0.0, 0.0, 0.0)));
        assert!(wedge.contains(&Point3::new(0.5, 0.1, 0.5)));
        assert!(wedge.contains(&Point3::new(0.1, 0.1, 0.9)));
        assert!(!wedge.contains(&Point3::new(0.0, 0.0, 1.1)));
        assert!(!wedge.contains(&Point3::new(1.5, 0.0, 0.0)));
        assert!(!wedge.contains(&Point3::new(-0.5, 0.0, 0.0)));
        assert!(!wedge.contains(&Point3::new(0.0, -0.5, 0.0)));
    }

    #[test]
    fn wedge_faces() {
        let wedge = Wedge::new(
            [0.0, 0.0, 0.0],
            1.0,
            2.0,
            [0.0, 0.0, 1.0],
            PI / 2.0,
            [1.0, 0.0, 0.0],
        )
        .unwrap();
        let s = 0.5_f64.sqrt();
        // curved face
        assert!(wedge.contains(&Point3::new(s * (1.0 - EPS), s * (1.0 - EPS), 0.0)));
        assert!(!wedge.contains(&Point3::new(s * (1.0 + EPS), s * (1.0 + EPS), 0.0)));
        // start face belongs to the wedge, the far face does not
        assert!(wedge.contains(&Point3::new(0.5, 0.0, 0.0)));
        assert!(!wedge.contains(&Point3::new(0.5, -EPS, 0.0)));
        assert!(wedge.contains(&Point3::new(EPS, 0.5, 0.0)));
        assert!(!wedge.contains(&Point3::new(-EPS, 0.5, 0.0)));
        // end caps
        assert!(wedge.contains(&Point3::new(0.5, 0.1, 1.0 - EPS)));
        assert!(!wedge.contains(&Point3::new(0.5, 0.1, 1.0 + EPS)));
        assert!(wedge.contains(&Point3::new(0.5, 0.1, -1.0 + EPS)));
        assert!(!wedge.contains(&Point3::new(0.5, 0.1, -1.0 - EPS)));
    }

    #[test]
    fn negative_wedge_sweeps_clockwise() {
        let wedge = Wedge::new(
            [0.0, 0.0, 0.0],
            1.0,
            2.0,
            [0.0, 0.0, 1.0],
            -PI / 2.0,
            [1.0, 0.0, 0.0],
        )
        .unwrap();
        assert!(wedge.contains(&Point3::new(0.5, -0.1, 0.0)));
        assert!(!wedge.contains(&Point3::new(0.5, 0.1, 0.0)));
        assert!(wedge.volume() > 0.0);
    }

    #[test]
    fn wedge_start_parallel_to_axis_is_rejected() {
        let err = Wedge::new(
            [0.0, 0.0, 0.0],
            1.0,
            2.0,
            [0.0, 0.0, 1.0],
            PI,
            [0.0, 0.0, 3.0],
        )
        .unwrap_err();
        assert!(matches!(err, GeomError::Construction(_)));
    }

    #[test]
    fn cone_volume_and_taper() {
        let cone = Cone::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 1.0], 0.5).unwrap();
        let expected = PI * 2.0 * (1.0 + 0.5 + 0.25) / 3.0;
        assert!((cone.volume() - expected).abs() < 1e-10);

        let apex = Cone::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 1.0], 0.0).unwrap();
        assert!((apex.volume() - PI * 2.0 / 3.0).abs() < 1e-10);

        assert!(cone.contains(&Point3::new(0.0, 0.0, 0.0)));
        assert!(cone.contains(&Point3::new(0.4, 0.0, 0.5)));
        assert!(cone.contains(&Point3::new(0.0, 0.2, 0.9)));
        assert!(!cone.contains(&Point3::new(0.0, 0.0, 1.1)));
        assert!(!cone.contains(&Point3::new(1.5, 0.0, 0.0)));
        assert!(!cone.contains(&Point3::new(0.9, 0.0, 0.9)));
        // radius at the midplane is 0.75
        assert!(cone.contains(&Point3::new(0.75 - EPS, 0.0, 0.0)));
        assert!(!cone.contains(&Point3::new(0.75 + EPS, 0.0, 0.0)));
    }

    #[test]
    fn negative_cone_radius_is_rejected() {
        let err = Cone::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 1.0], -0.5).unwrap_err();
        assert!(matches!(err, GeomError::Construction(_)));
        let err = Cone::new([0.0, 0.0, 0.0], 1.0, 2.0, [0.0, 0.0, 1.0], f64::NAN).unwrap_err();
        assert!(matches!(err, GeomError::Construction(_)));
    }

    #[test]
    fn block_containment_and_volume() {
        let block = Block::new(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [2.0, 2.0, 2.0],
        )
        .unwrap();
        assert!((block.volume() - 8.0).abs() < 1e-10);
        assert!(block.contains(&Point3::new(0.9, 0.0, 0.0)));
        assert!(block.contains(&Point3::new(1.0, 1.0, 1.0)));
        assert!(!block.contains(&Point3::new(1.1, 0.0, 0.0)));
        assert!(!block.contains(&Point3::new(1.1, 1.1, 1.1)));
    }

    #[test]
    fn block_faces() {
        let block = Block::new(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [2.0, 2.0, 2.0],
        )
        .unwrap();
        for axis in 0..3 {
            for sign in [-1.0, 1.0] {
                let mut inside = Point3::origin();
                inside[axis] = sign * (1.0 - EPS);
                let mut outside = Point3::origin();
                outside[axis] = sign * (1.0 + EPS);
                assert!(block.contains(&inside), "{:?}", inside);
                assert!(!block.contains(&outside), "{:?}", outside);
            }
        }
    }

    #[test]
    fn oblique_block() {
        // sheared unit cube: e2 leans 45 degrees towards e1
        let block = Block::new(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 2.0_f64.sqrt(), 1.0],
        )
        .unwrap();
        assert!((block.volume() - 1.0).abs() < 1e-10);
        assert!(block.contains(&Point3::new(0.9, 0.45, 0.0)));
        assert!(!block.contains(&Point3::new(-0.9, 0.45, 0.0)));

        let b = block.bounding_box();
        assert!((b.high.x - 1.0).abs() < 1e-12);
        assert!((b.high.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn coplanar_basis_is_rejected() {
        let err = Block::new(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 1.0],
        )
        .unwrap_err();
        assert!(matches!(err, GeomError::Construction(_)));
    }

    #[test]
    fn ellipsoid_containment_and_volume() {
        let ellipsoid = Ellipsoid::new(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [2.0, 4.0, 6.0],
        )
        .unwrap();
        assert!((ellipsoid.volume() - 4.0 / 3.0 * PI * 6.0).abs() < 1e-10);
        assert!(ellipsoid.contains(&Point3::new(0.9, 0.0, 0.0)));
        assert!(ellipsoid.contains(&Point3::new(0.0, 1.9, 0.0)));
        assert!(ellipsoid.contains(&Point3::new(0.0, 0.0, 3.0 - EPS)));
        assert!(!ellipsoid.contains(&Point3::new(0.0, 0.0, 3.0 + EPS)));
        assert!(!ellipsoid.contains(&Point3::new(0.8, 1.8, 0.0)));

        let b = ellipsoid.bounding_box();
        assert!((b.high - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn rotated_ellipsoid_box_is_tighter_than_block() {
        let (e1, e2, e3) = ([1.0, 1.0, 0.0], [-1.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
        let size = [4.0, 1.0, 1.0];
        let ellipsoid = Ellipsoid::new([0.0, 0.0, 0.0], e1, e2, e3, size).unwrap();
        let block = Block::new([0.0, 0.0, 0.0], e1, e2, e3, size).unwrap();
        let eb = ellipsoid.bounding_box();
        let bb = block.bounding_box();
        assert!(bb.contains_box(&eb));
        assert!(eb.high.x < bb.high.x);
        // semi-axes 2 and 0.5 at 45 degrees: sqrt(2 + 0.125)
        assert!((eb.high.x - 2.125_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn object_coords_round_trip_for_block() {
        let block = Block::new(
            [1.0, 2.0, 3.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [2.0, 4.0, 8.0],
        )
        .unwrap();
        let shape = Shape::Block(block);
        let corner = shape
            .to_object_coords(&Point3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert!((corner - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-12);
        let back = shape.from_object_coords(&Point3::new(1.0, 1.0, 1.0)).unwrap();
        assert!((back - Point3::new(2.0, 4.0, 7.0)).norm() < 1e-12);
    }

    #[test]
    fn object_coords_unsupported_for_cylinder() {
        let shape = Shape::Cylinder(z_cylinder());
        let err = shape.to_object_coords(&Point3::origin()).unwrap_err();
        assert!(matches!(err, GeomError::UnsupportedOperation(_)));
    }

    #[test]
    fn bounding_box_encloses_every_contained_point() {
        let mut rng = StdRng::seed_from_u64(7);
        for shape in all_shapes() {
            let b = shape.bounding_box();
            // sample a slightly inflated box so points near the surface are hit too
            let pad = 0.1 * (b.high - b.low);
            let (low, high) = (b.low - pad, b.high + pad);
            let mut hits = 0;
            for _ in 0..20_000 {
                let p = Point3::new(
                    rng.random_range(low.x..high.x),
                    rng.random_range(low.y..high.y),
                    rng.random_range(low.z..high.z),
                );
                if shape.contains(&p) {
                    hits += 1;
                    assert!(b.contains_point(&p), "{} leaks out of {}", shape.name(), b);
                }
            }
            assert!(hits > 0, "{} was never sampled", shape.name());
        }
    }

    #[test]
    fn sampled_volume_matches_closed_form() {
        for shape in all_shapes() {
            let primitive = Primitive::new(0_u8, shape.clone());
            let b = shape.bounding_box();
            let fraction = primitive.overlap_fraction(&b, 60).unwrap();
            let sampled = fraction * b.volume();
            let exact = shape.volume().abs();
            assert!(
                (sampled - exact).abs() < 0.03 * exact,
                "{}: sampled {} vs exact {}",
                shape.name(),
                sampled,
                exact
            );
        }
    }

    #[test]
    fn overlap_fraction_edge_cases() {
        let primitive = Primitive::new("a", Sphere::new([0.0, 0.0, 0.0], 1.0));
        let empty = BoundingBox::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0]);
        assert_eq!(primitive.overlap_fraction(&empty, 10).unwrap(), 0.0);

        let inside = BoundingBox::new([-0.1, -0.1, -0.1], [0.1, 0.1, 0.1]);
        assert_eq!(primitive.overlap_fraction(&inside, 10).unwrap(), 1.0);

        let err = primitive
            .overlap_fraction(&BoundingBox::unbounded(), 10)
            .unwrap_err();
        assert!(matches!(err, GeomError::UnsupportedOperation(_)));
    }
}

/// Opaque payload attached to a primitive. Only cloned and compared.
pub trait Material: Clone + PartialEq + Send + Sync + fmt::Debug {}

impl<T: Clone + PartialEq + Send + Sync + fmt::Debug> Material for T {}

/// Sentinel used in array-shaped results for points no primitive contains.
pub trait NoMatch {
    fn no_match() -> Self;
}

impl NoMatch for f64 {
    fn no_match() -> Self {
        f64::NAN
    }
}

impl NoMatch for f32 {
    fn no_match() -> Self {
        f32::NAN
    }
}

/// Normalizes `v`, rejecting vectors too short to define a direction.
pub(crate) fn unit(v: Vector3<f64>, what: &str) -> Result<Vector3<f64>> {
    v.try_normalize(VEC_LENGTH_THRESHOLD)
        .ok_or_else(|| GeomError::Construction(format!("{} has zero length", what)))
}

/// Bounding box of a disc of radius `radius` centered at `center` and normal to the unit `axis`.
fn disc_box(center: &Point3<f64>, radius: f64, axis: &Vector3<f64>) -> BoundingBox {
    let half = axis.map(|a| radius.abs() * (1.0 - a * a).max(0.0).sqrt());
    BoundingBox::new(center - half, center + half)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    center: Point3<f64>,
    radius: f64,
}

impl Sphere {
    pub fn new(center: impl Into<Point3<f64>>, radius: f64) -> Self {
        Self {
            center: center.into(),
            radius,
        }
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (p - self.center).norm_squared() <= self.radius * self.radius
    }

    /// Signed: a negative radius gives a negative volume.
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.radius.powi(3)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let r = Vector3::repeat(self.radius.abs());
        BoundingBox::new(self.center - r, self.center + r)
    }
}

/// Right circular cylinder centered on `center`, extending `height / 2` either way along `axis`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    center: Point3<f64>,
    radius: f64,
    height: f64,
    axis: Vector3<f64>, // unit
}

impl Cylinder {
    pub fn new(
        center: impl Into<Point3<f64>>,
        radius: f64,
        height: f64,
        axis: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        Ok(Self {
            center: center.into(),
            radius,
            height,
            axis: unit(axis.into(), "cylinder axis")?,
        })
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn axis(&self) -> Vector3<f64> {
        self.axis
    }

    /// Signed axial coordinate and squared radial distance of `p`, or `None` past the end caps.
    fn axial(&self, p: &Point3<f64>) -> Option<(f64, f64)> {
        let r = p - self.center;
        let proj = self.axis.dot(&r);
        if proj.abs() > 0.5 * self.height {
            return None;
        }
        Some((proj, r.norm_squared() - proj * proj))
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.axial(p)
            .is_some_and(|(_, radial2)| radial2 <= self.radius * self.radius)
    }

    pub fn volume(&self) -> f64 {
        PI * self.radius * self.radius * self.height
    }

    fn end(&self, sign: f64) -> Point3<f64> {
        self.center + self.axis * (sign * 0.5 * self.height)
    }

    /// Union of the boxes of the two end discs.
    fn caps_box(&self, top_radius: f64) -> BoundingBox {
        disc_box(&self.end(-1.0), self.radius, &self.axis)
            .union(&disc_box(&self.end(1.0), top_radius, &self.axis))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.caps_box(self.radius)
    }
}

/// Angular sector of a cylinder, swept from `wedge_start` about the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Wedge {
    cylinder: Cylinder,
    wedge_angle: f64,
    wedge_start: Vector3<f64>,
    e1: Vector3<f64>, // wedge_start projected perpendicular to the axis
    e2: Vector3<f64>, // axis x e1
}

impl Wedge {
    pub fn new(
        center: impl Into<Point3<f64>>,
        radius: f64,
        height: f64,
        axis: impl Into<Vector3<f64>>,
        wedge_angle: f64,
        wedge_start: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        let cylinder = Cylinder::new(center, radius, height, axis)?;
        if wedge_angle == 0.0 || wedge_angle.abs() > 2.0 * PI || !wedge_angle.is_finite() {
            return Err(GeomError::Construction(format!(
                "wedge angle must be non-zero and at most 2*pi in magnitude, got {}",
                wedge_angle
            )));
        }
        let wedge_start = wedge_start.into();
        let a = cylinder.axis;
        let e1 = unit(
            wedge_start - a * a.dot(&wedge_start),
            "wedge start direction perpendicular to the axis",
        )?;
        let e2 = a.cross(&e1);
        Ok(Self {
            cylinder,
            wedge_angle,
            wedge_start,
            e1,
            e2,
        })
    }

    pub fn cylinder(&self) -> &Cylinder {
        &self.cylinder
    }

    pub fn wedge_angle(&self) -> f64 {
        self.wedge_angle
    }

    pub fn wedge_start(&self) -> Vector3<f64> {
        self.wedge_start
    }

    fn angle_in_range(&self, r: &Vector3<f64>) -> bool {
        let theta = r.dot(&self.e2).atan2(r.dot(&self.e1));
        if self.wedge_angle > 0.0 {
            let theta = if theta < 0.0 { theta + 2.0 * PI } else { theta };
            theta < self.wedge_angle
        } else {
            let theta = if theta > 0.0 { theta - 2.0 * PI } else { theta };
            theta > self.wedge_angle
        }
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.cylinder.contains(p) && self.angle_in_range(&(p - self.cylinder.center))
    }

    pub fn volume(&self) -> f64 {
        self.cylinder.volume() * self.wedge_angle.abs() / (2.0 * PI)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.cylinder.bounding_box()
    }
}

/// Frustum whose radius runs linearly from `radius` at the bottom cap to `radius2` at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Cone {
    cylinder: Cylinder,
    radius2: f64,
}

impl Cone {
    pub fn new(
        center: impl Into<Point3<f64>>,
        radius: f64,
        height: f64,
        axis: impl Into<Vector3<f64>>,
        radius2: f64,
    ) -> Result<Self> {
        if !(radius2 >= 0.0) {
            return Err(GeomError::Construction(format!(
                "cone top radius must be non-negative, got {}",
                radius2
            )));
        }
        Ok(Self {
            cylinder: Cylinder::new(center, radius, height, axis)?,
            radius2,
        })
    }

    pub fn cylinder(&self) -> &Cylinder {
        &self.cylinder
    }

    pub fn radius2(&self) -> f64 {
        self.radius2
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let c = &self.cylinder;
        match c.axial(p) {
            Some((proj, radial2)) => {
                let radius = c.radius + (proj / c.height + 0.5) * (self.radius2 - c.radius);
                radial2 <= radius * radius
            }
            None => false,
        }
    }

    pub fn volume(&self) -> f64 {
        let (r1, r2) = (self.cylinder.radius, self.radius2);
        PI * self.cylinder.height * (r1 * r1 + r1 * r2 + r2 * r2) / 3.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.cylinder.caps_box(self.radius2)
    }
}

/// Parallelepiped spanned by three (not necessarily orthogonal) unit directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    center: Point3<f64>,
    basis: Matrix3<f64>,      // columns e1, e2, e3
    projection: Matrix3<f64>, // inverse of basis
    size: Vector3<f64>,
}

impl Block {
    pub fn new(
        center: impl Into<Point3<f64>>,
        e1: impl Into<Vector3<f64>>,
        e2: impl Into<Vector3<f64>>,
        e3: impl Into<Vector3<f64>>,
        size: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        let basis = Matrix3::from_columns(&[
            unit(e1.into(), "block basis vector e1")?,
            unit(e2.into(), "block basis vector e2")?,
            unit(e3.into(), "block basis vector e3")?,
        ]);
        if basis.determinant().abs() < BASIS_DET_THRESHOLD {
            return Err(GeomError::Construction(
                "block basis vectors are coplanar".to_string(),
            ));
        }
        let projection = basis.try_inverse().ok_or_else(|| {
            GeomError::Construction("block basis is not invertible".to_string())
        })?;
        Ok(Self {
            center: center.into(),
            basis,
            projection,
            size: size.into(),
        })
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn e1(&self) -> Vector3<f64> {
        self.basis.column(0).into()
    }

    pub fn e2(&self) -> Vector3<f64> {
        self.basis.column(1).into()
    }

    pub fn e3(&self) -> Vector3<f64> {
        self.basis.column(2).into()
    }

    pub fn size(&self) -> Vector3<f64> {
        self.size
    }

    /// Coordinates of `p` along e1, e2, e3 relative to the center.
    fn local(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.projection * (p - self.center)
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let proj = self.local(p);
        (0..3).all(|i| proj[i].abs() <= 0.5 * self.size[i])
    }

    pub fn volume(&self) -> f64 {
        (self.basis.determinant() * self.size.product()).abs()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let half = self.basis.abs() * self.size.abs() * 0.5;
        BoundingBox::new(self.center - half, self.center + half)
    }

    fn to_object_coords(&self, p: &Point3<f64>) -> Point3<f64> {
        let mut proj = self.local(p);
        for i in 0..3 {
            if self.size[i] != 0.0 {
                proj[i] /= self.size[i];
            }
        }
        Point3::from(proj.add_scalar(0.5))
    }

    fn from_object_coords(&self, p: &Point3<f64>) -> Point3<f64> {
        let scaled = (p.coords.add_scalar(-0.5)).component_mul(&self.size);
        self.center + self.basis * scaled
    }
}

/// Ellipsoid inscribed in the parallelepiped of a [`Block`] with the same parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    block: Block,
    inverse_semi_axes: Vector3<f64>,
}

impl Ellipsoid {
    pub fn new(
        center: impl Into<Point3<f64>>,
        e1: impl Into<Vector3<f64>>,
        e2: impl Into<Vector3<f64>>,
        e3: impl Into<Vector3<f64>>,
        size: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        let block = Block::new(center, e1, e2, e3, size)?;
        let inverse_semi_axes = block.size.map(|s| 2.0 / s);
        Ok(Self {
            block,
            inverse_semi_axes,
        })
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.block
            .local(p)
            .component_mul(&self.inverse_semi_axes)
            .norm_squared()
            <= 1.0
    }

    pub fn volume(&self) -> f64 {
        let semi_axes = self.block.size * 0.5;
        4.0 / 3.0 * PI * (self.block.basis.determinant() * semi_axes.product()).abs()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        // x = center + B diag(size / 2) u with |u| <= 1
        let m = self.block.basis * Matrix3::from_diagonal(&(self.block.size * 0.5));
        let half = Vector3::from_fn(|j, _| m.row(j).norm());
        BoundingBox::new(self.block.center - half, self.block.center + half)
    }
}

/// A solid shape. The set of shapes is closed; operations dispatch by `match`.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere(Sphere),
    Cylinder(Cylinder),
    Wedge(Wedge),
    Cone(Cone),
    Block(Block),
    Ellipsoid(Ellipsoid),
    Prism(Prism),
    SlantedPrism(SlantedPrism),
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Sphere(_) => "sphere",
            Shape::Cylinder(_) => "cylinder",
            Shape::Wedge(_) => "wedge",
            Shape::Cone(_) => "cone",
            Shape::Block(_) => "block",
            Shape::Ellipsoid(_) => "ellipsoid",
            Shape::Prism(_) => "prism",
            Shape::SlantedPrism(_) => "slanted prism",
        }
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        match self {
            Shape::Sphere(s) => s.contains(p),
            Shape::Cylinder(s) => s.contains(p),
            Shape::Wedge(s) => s.contains(p),
            Shape::Cone(s) => s.contains(p),
            Shape::Block(s) => s.contains(p),
            Shape::Ellipsoid(s) => s.contains(p),
            Shape::Prism(s) => s.contains(p),
            Shape::SlantedPrism(s) => s.contains(p),
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Shape::Sphere(s) => s.volume(),
            Shape::Cylinder(s) => s.volume(),
            Shape::Wedge(s) => s.volume(),
            Shape::Cone(s) => s.volume(),
            Shape::Block(s) => s.volume(),
            Shape::Ellipsoid(s) => s.volume(),
            Shape::Prism(s) => s.volume(),
            Shape::SlantedPrism(s) => s.volume(),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Shape::Sphere(s) => s.bounding_box(),
            Shape::Cylinder(s) => s.bounding_box(),
            Shape::Wedge(s) => s.bounding_box(),
            Shape::Cone(s) => s.bounding_box(),
            Shape::Block(s) => s.bounding_box(),
            Shape::Ellipsoid(s) => s.bounding_box(),
            Shape::Prism(s) => s.bounding_box(),
            Shape::SlantedPrism(s) => s.bounding_box(),
        }
    }

    /// Maps a point to the shape's natural [0, 1]^3 coordinates.
    pub fn to_object_coords(&self, p: &Point3<f64>) -> Result<Point3<f64>> {
        match self {
            Shape::Sphere(s) => Ok(Point3::from(
                ((p - s.center) * (0.5 / s.radius)).add_scalar(0.5),
            )),
            Shape::Block(b) => Ok(b.to_object_coords(p)),
            Shape::Ellipsoid(e) => Ok(e.block.to_object_coords(p)),
            _ => Err(GeomError::UnsupportedOperation(format!(
                "object coordinates are not defined for a {}",
                self.name()
            ))),
        }
    }

    /// Inverse of [`Shape::to_object_coords`].
    pub fn from_object_coords(&self, p: &Point3<f64>) -> Result<Point3<f64>> {
        match self {
            Shape::Sphere(s) => Ok(s.center + p.coords.add_scalar(-0.5) * (s.radius / 0.5)),
            Shape::Block(b) => Ok(b.from_object_coords(p)),
            Shape::Ellipsoid(e) => Ok(e.block.from_object_coords(p)),
            _ => Err(GeomError::UnsupportedOperation(format!(
                "object coordinates are not defined for a {}",
                self.name()
            ))),
        }
    }
}

impl From<Sphere> for Shape {
    fn from(s: Sphere) -> Self {
        Shape::Sphere(s)
    }
}

impl From<Cylinder> for Shape {
    fn from(s: Cylinder) -> Self {
        Shape::Cylinder(s)
    }
}

impl From<Wedge> for Shape {
    fn from(s: Wedge) -> Self {
        Shape::Wedge(s)
    }
}

impl From<Cone> for Shape {
    fn from(s: Cone) -> Self {
        Shape::Cone(s)
    }
}

impl From<Block> for Shape {
    fn from(s: Block) -> Self {
        Shape::Block(s)
    }
}

impl From<Ellipsoid> for Shape {
    fn from(s: Ellipsoid) -> Self {
        Shape::Ellipsoid(s)
    }
}

impl From<Prism> for Shape {
    fn from(s: Prism) -> Self {
        Shape::Prism(s)
    }
}

impl From<SlantedPrism> for Shape {
    fn from(s: SlantedPrism) -> Self {
        Shape::SlantedPrism(s)
    }
}

/// A shape tagged with the material it is made of.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive<M> {
    material: M,
    shape: Shape,
}

impl<M> Primitive<M> {
    pub fn new(material: M, shape: impl Into<Shape>) -> Self {
        Self {
            material,
            shape: shape.into(),
        }
    }

    pub fn material(&self) -> &M {
        &self.material
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.shape.contains(p)
    }

    pub fn volume(&self) -> f64 {
        self.shape.volume()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.shape.bounding_box()
    }
}

impl<M: Sync> Primitive<M> {
    /// Estimates the fraction of `bounds` occupied by this primitive.
    ///
    /// Uses the midpoint rule on `samples` cells per axis, evaluated in parallel.
    pub fn overlap_fraction(&self, bounds: &BoundingBox, samples: usize) -> Result<f64> {
        if bounds.is_empty() {
            return Ok(0.0);
        }
        if !bounds.is_finite() {
            return Err(GeomError::UnsupportedOperation(
                "overlap fraction needs a finite box".to_string(),
            ));
        }
        let n = samples.max(1);
        let step = (bounds.high - bounds.low) / n as f64;
        let hits = (0..n * n * n)
            .into_par_iter()
            .filter(|&k| {
                let (i, j, l) = (k % n, (k / n) % n, k / (n * n));
                let p = bounds.low
                    + Vector3::new(i as f64 + 0.5, j as f64 + 0.5, l as f64 + 0.5)
                        .component_mul(&step);
                self.shape.contains(&p)
            })
            .count();
        Ok(hits as f64 / (n * n * n) as f64)
    }
}

/// Whether `point` lies inside `primitive`.
pub fn point_in_primitive<M>(point: impl Into<Point3<f64>>, primitive: &Primitive<M>) -> bool {
    primitive.contains(&point.into())
}
