//! Extruded polygons: straight and slanted prisms.
//!
//! The base polygon is described by world-space vertices lying in a plane
//! normal to the extrusion axis. Construction builds an orthonormal local
//! frame:
//! - `z` along the (normalized) axis
//! - `x` along the first edge, with any axial component removed
//! - `y = z x x`
//!
//! The footprint is stored as a 2D [`Polygon`] in that frame, relative to
//! the vertex centroid. Points are classified by transforming them into the
//! frame, checking the axial range `0 <= z <= height` and then the 2D
//! footprint (boundary inclusive).
//!
//! A slanted prism tilts every side wall inward by the sidewall angle, so
//! the cross-section at depth `z` is the base polygon with each edge offset
//! inward by `z * tan(angle)`. Corners are mitered.

use geo::{Area, Intersects};
use geo_types::{Coord, LineString, Polygon};
use nalgebra::{Matrix3, Point3, Vector3};
use std::f64::consts::FRAC_PI_2;

use crate::config::{COPLANAR_TOLERANCE, MITER_THRESHOLD, VEC_LENGTH_THRESHOLD};
use crate::containment::BoundingBox;
use crate::error::{GeomError, Result};
use crate::geom::unit;


/// Orthonormal frame anchored on the base plane below the prism center.
#[derive(Debug, Clone, PartialEq)]
struct Frame {
    origin: Point3<f64>,
    to_local: Matrix3<f64>, // rows are the local x, y and z directions
}

impl Frame {
    fn local(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.to_local * (p - self.origin)
    }

    fn world(&self, x: f64, y: f64, z: f64) -> Point3<f64> {
        self.origin + self.to_local.transpose() * Vector3::new(x, y, z)
    }
}

/// Straight extrusion of a planar polygon along an axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Prism {
    vertices: Vec<Point3<f64>>,
    height: f64,
    axis: Vector3<f64>,
    center: Point3<f64>,
    frame: Frame,
    footprint: Polygon<f64>,
}

impl Prism {
    /// Extrudes the base polygon `height` along `axis` from the plane of its vertices.
    pub fn new<P: Into<Point3<f64>>>(
        vertices: impl IntoIterator<Item = P>,
        height: f64,
        axis: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        Self::build(collect(vertices), height, axis.into(), None)
    }

    /// As [`Prism::new`], but translated so its volumetric center sits at `center`.
    pub fn with_center<P: Into<Point3<f64>>>(
        center: impl Into<Point3<f64>>,
        vertices: impl IntoIterator<Item = P>,
        height: f64,
        axis: impl Into<Vector3<f64>>,
    ) -> Result<Self> {
        Self::build(collect(vertices), height, axis.into(), Some(center.into()))
    }

    fn build(
        vertices: Vec<Point3<f64>>,
        height: f64,
        axis: Vector3<f64>,
        center: Option<Point3<f64>>,
    ) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(GeomError::Construction(format!(
                "prism needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let zhat = unit(axis, "prism axis")?;
        let centroid = Point3::from(
            vertices.iter().map(|v| v.coords).sum::<Vector3<f64>>() / vertices.len() as f64,
        );

        let scale = vertices
            .iter()
            .map(|v| (v - centroid).norm())
            .fold(0.0, f64::max);
        if vertices
            .iter()
            .any(|v| (v - centroid).dot(&zhat).abs() > COPLANAR_TOLERANCE * scale)
        {
            return Err(GeomError::Construction(
                "prism vertices do not lie in a plane normal to the axis".to_string(),
            ));
        }

        let first_edge = vertices[1] - vertices[0];
        let xhat = unit(first_edge - zhat * zhat.dot(&first_edge), "first prism edge")?;
        let yhat = zhat.cross(&xhat);
        let to_local = Matrix3::from_rows(&[xhat.transpose(), yhat.transpose(), zhat.transpose()]);

        let center = center.unwrap_or(centroid + zhat * (0.5 * height));
        let frame = Frame {
            origin: center - zhat * (0.5 * height),
            to_local,
        };

        let exterior: Vec<Coord<f64>> = vertices
            .iter()
            .map(|v| {
                let q = to_local * (v - centroid);
                Coord { x: q.x, y: q.y }
            })
            .collect();

        for (a, b) in exterior.iter().zip(exterior.iter().cycle().skip(1)) {
            if (*b - *a).x.hypot((*b - *a).y) < VEC_LENGTH_THRESHOLD {
                return Err(GeomError::Construction(
                    "prism has a zero-length edge".to_string(),
                ));
            }
        }

        Ok(Self {
            vertices,
            height,
            axis: zhat,
            center,
            frame,
            footprint: Polygon::new(LineString(exterior), vec![]),
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn axis(&self) -> Vector3<f64> {
        self.axis
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    /// Base polygon in the local frame.
    pub fn footprint(&self) -> &Polygon<f64> {
        &self.footprint
    }

    /// Footprint vertices without the closing repeat.
    fn base_coords(&self) -> &[Coord<f64>] {
        let ring = &self.footprint.exterior().0;
        &ring[..ring.len() - 1]
    }

    /// Local coordinates of `p` if it lies within the axial range.
    fn axial(&self, p: &Point3<f64>) -> Option<Vector3<f64>> {
        let q = self.frame.local(p);
        (q.z >= 0.0 && q.z <= self.height).then_some(q)
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.axial(p)
            .is_some_and(|q| self.footprint.intersects(&Coord { x: q.x, y: q.y }))
    }

    pub fn volume(&self) -> f64 {
        self.footprint.unsigned_area() * self.height
    }

    fn box_of(&self, base: &[Coord<f64>], top: &[Coord<f64>], top_z: f64) -> BoundingBox {
        let bottom = base.iter().map(|c| self.frame.world(c.x, c.y, 0.0));
        let upper = top.iter().map(|c| self.frame.world(c.x, c.y, top_z));
        bottom
            .chain(upper)
            .fold(BoundingBox::empty(), |acc, p| acc.with_point(&p))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.box_of(self.base_coords(), self.base_coords(), self.height)
    }
}

fn collect<P: Into<Point3<f64>>>(vertices: impl IntoIterator<Item = P>) -> Vec<Point3<f64>> {
    vertices.into_iter().map(Into::into).collect()
}

fn lerp(a: &[Coord<f64>], b: &[Coord<f64>], s: f64) -> Vec<Coord<f64>> {
    a.iter().zip(b).map(|(p, q)| *p + (*q - *p) * s).collect()
}

/// Prism whose side walls lean inward by `sidewall_angle` radians from the axis.
///
/// **Context**: Etched or deposited structures rarely have vertical walls.
/// A positive angle narrows the cross-section towards the top face; a
/// negative angle widens it. Steep inward walls can close the cross-section
/// before the top face, leaving a ridge or apex.
///
/// **How it Works**: Every edge of the base polygon is offset inward by
/// `z * tan(sidewall_angle)` with mitered corners. The taper stops at
/// `depth`, the lesser of the height and the depth at which the first edge
/// shrinks to nothing; above it the solid is empty. Cross-sections are
/// linear interpolations between the base and the section at `depth`, so the
/// volume is exact under Simpson's rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SlantedPrism {
    prism: Prism,
    sidewall_angle: f64,
    depth: f64,
    top: Vec<Coord<f64>>, // cross-section at `depth`
}

impl SlantedPrism {
    pub fn new<P: Into<Point3<f64>>>(
        vertices: impl IntoIterator<Item = P>,
        height: f64,
        axis: impl Into<Vector3<f64>>,
        sidewall_angle: f64,
    ) -> Result<Self> {
        Self::taper(Prism::new(vertices, height, axis)?, sidewall_angle)
    }

    pub fn with_center<P: Into<Point3<f64>>>(
        center: impl Into<Point3<f64>>,
        vertices: impl IntoIterator<Item = P>,
        height: f64,
        axis: impl Into<Vector3<f64>>,
        sidewall_angle: f64,
    ) -> Result<Self> {
        Self::taper(
            Prism::with_center(center, vertices, height, axis)?,
            sidewall_angle,
        )
    }

    fn taper(prism: Prism, sidewall_angle: f64) -> Result<Self> {
        if !(sidewall_angle.abs() < FRAC_PI_2) {
            return Err(GeomError::Construction(format!(
                "sidewall angle must lie strictly between -pi/2 and pi/2, got {}",
                sidewall_angle
            )));
        }
        let signed_area = prism.footprint.signed_area();
        if signed_area.abs() < VEC_LENGTH_THRESHOLD {
            return Err(GeomError::Construction(
                "slanted prism footprint has zero area".to_string(),
            ));
        }
        // interior lies to the left of each edge for counter-clockwise footprints
        let orientation = signed_area.signum();
        let offset = prism.height * sidewall_angle.tan();

        let base = prism.base_coords();
        let n = base.len();
        let normals: Vec<Coord<f64>> = (0..n)
            .map(|i| {
                let e = base[(i + 1) % n] - base[i];
                let len = e.x.hypot(e.y);
                Coord {
                    x: -e.y * orientation / len,
                    y: e.x * orientation / len,
                }
            })
            .collect();

        let mut full = Vec::with_capacity(n);
        for i in 0..n {
            let (before, after) = (normals[(i + n - 1) % n], normals[i]);
            let denom = 1.0 + before.x * after.x + before.y * after.y;
            if denom < MITER_THRESHOLD {
                return Err(GeomError::Construction(format!(
                    "slanted prism vertex {} folds back on itself",
                    i
                )));
            }
            full.push(base[i] + (before + after) * (offset / denom));
        }

        // offset edges stay parallel, so each one scales by 1 - s * (1 - ratio)
        let mut collapse = 1.0_f64;
        for i in 0..n {
            let j = (i + 1) % n;
            let (b, t) = (base[j] - base[i], full[j] - full[i]);
            let ratio = (b.x * t.x + b.y * t.y) / (b.x * b.x + b.y * b.y);
            if ratio > 0.0 {
                continue;
            }
            if sidewall_angle < 0.0 {
                return Err(GeomError::Construction(format!(
                    "sidewall angle {} closes edge {} of a flared prism",
                    sidewall_angle, i
                )));
            }
            collapse = collapse.min(1.0 / (1.0 - ratio));
        }

        Ok(Self {
            sidewall_angle,
            depth: prism.height * collapse,
            top: lerp(base, &full, collapse),
            prism,
        })
    }

    pub fn prism(&self) -> &Prism {
        &self.prism
    }

    pub fn sidewall_angle(&self) -> f64 {
        self.sidewall_angle
    }

    /// Height of the tapered solid; below the prism height when the walls meet.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Cross-section at fractional depth `s` in [0, 1] of [`SlantedPrism::depth`].
    fn section(&self, s: f64) -> Polygon<f64> {
        Polygon::new(
            LineString(lerp(self.prism.base_coords(), &self.top, s)),
            vec![],
        )
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        match self.prism.axial(p) {
            Some(q) if q.z <= self.depth => {
                let s = if self.depth != 0.0 {
                    q.z / self.depth
                } else {
                    0.0
                };
                self.section(s).intersects(&Coord { x: q.x, y: q.y })
            }
            _ => false,
        }
    }

    pub fn volume(&self) -> f64 {
        let area = |s: f64| self.section(s).unsigned_area();
        self.depth / 6.0 * (area(0.0) + 4.0 * area(0.5) + area(1.0))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.prism
            .box_of(self.prism.base_coords(), &self.top, self.depth)
    }
}
