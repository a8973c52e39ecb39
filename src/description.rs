//! Scene description files.
//!
//! A description lists primitives in precedence order, each tagged with its
//! shape and a numeric material, plus an optional finite domain:
//!
//! ```toml
//! [domain]
//! low = [-5.0, -5.0, -5.0]
//! high = [5.0, 5.0, 5.0]
//!
//! [[objects]]
//! shape = "sphere"
//! material = 2.25
//! center = [0.0, 0.0, 0.0]
//! radius = 1.0
//! ```
//!
//! Files ending in `.json` are parsed as JSON, anything else as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::containment::BoundingBox;
use crate::geom::{Block, Cone, Cylinder, Ellipsoid, Primitive, Shape, Sphere, Wedge};
use crate::prism::{Prism, SlantedPrism};
use crate::scene::Scene;


fn z_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn x_axis() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

fn y_axis() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

/// One primitive as written in a description file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObjectSpec {
    Sphere {
        material: f64,
        center: [f64; 3],
        radius: f64,
    },
    Cylinder {
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        #[serde(default = "z_axis")]
        axis: [f64; 3],
    },
    Wedge {
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        #[serde(default = "z_axis")]
        axis: [f64; 3],
        wedge_angle: f64,
        wedge_start: [f64; 3],
    },
    Cone {
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        #[serde(default = "z_axis")]
        axis: [f64; 3],
        radius2: f64,
    },
    Block {
        material: f64,
        center: [f64; 3],
        #[serde(default = "x_axis")]
        e1: [f64; 3],
        #[serde(default = "y_axis")]
        e2: [f64; 3],
        #[serde(default = "z_axis")]
        e3: [f64; 3],
        size: [f64; 3],
    },
    Ellipsoid {
        material: f64,
        center: [f64; 3],
        #[serde(default = "x_axis")]
        e1: [f64; 3],
        #[serde(default = "y_axis")]
        e2: [f64; 3],
        #[serde(default = "z_axis")]
        e3: [f64; 3],
        size: [f64; 3],
    },
    Prism {
        material: f64,
        vertices: Vec<[f64; 3]>,
        height: f64,
        #[serde(default = "z_axis")]
        axis: [f64; 3],
        #[serde(default)]
        center: Option<[f64; 3]>,
    },
    SlantedPrism {
        material: f64,
        vertices: Vec<[f64; 3]>,
        height: f64,
        #[serde(default = "z_axis")]
        axis: [f64; 3],
        #[serde(default)]
        center: Option<[f64; 3]>,
        sidewall_angle: f64,
    },
}

impl ObjectSpec {
    pub fn material(&self) -> f64 {
        match self {
            ObjectSpec::Sphere { material, .. }
            | ObjectSpec::Cylinder { material, .. }
            | ObjectSpec::Wedge { material, .. }
            | ObjectSpec::Cone { material, .. }
            | ObjectSpec::Block { material, .. }
            | ObjectSpec::Ellipsoid { material, .. }
            | ObjectSpec::Prism { material, .. }
            | ObjectSpec::SlantedPrism { material, .. } => *material,
        }
    }

    pub fn shape(&self) -> crate::error::Result<Shape> {
        let shape = match self.clone() {
            ObjectSpec::Sphere { center, radius, .. } => Sphere::new(center, radius).into(),
            ObjectSpec::Cylinder {
                center,
                radius,
                height,
                axis,
                ..
            } => Cylinder::new(center, radius, height, axis)?.into(),
            ObjectSpec::Wedge {
                center,
                radius,
                height,
                axis,
                wedge_angle,
                wedge_start,
                ..
            } => Wedge::new(center, radius, height, axis, wedge_angle, wedge_start)?.into(),
            ObjectSpec::Cone {
                center,
                radius,
                height,
                axis,
                radius2,
                ..
            } => Cone::new(center, radius, height, axis, radius2)?.into(),
            ObjectSpec::Block {
                center,
                e1,
                e2,
                e3,
                size,
                ..
            } => Block::new(center, e1, e2, e3, size)?.into(),
            ObjectSpec::Ellipsoid {
                center,
                e1,
                e2,
                e3,
                size,
                ..
            } => Ellipsoid::new(center, e1, e2, e3, size)?.into(),
            ObjectSpec::Prism {
                vertices,
                height,
                axis,
                center,
                ..
            } => match center {
                Some(c) => Prism::with_center(c, vertices, height, axis)?.into(),
                None => Prism::new(vertices, height, axis)?.into(),
            },
            ObjectSpec::SlantedPrism {
                vertices,
                height,
                axis,
                center,
                sidewall_angle,
                ..
            } => match center {
                Some(c) => {
                    SlantedPrism::with_center(c, vertices, height, axis, sidewall_angle)?.into()
                }
                None => SlantedPrism::new(vertices, height, axis, sidewall_angle)?.into(),
            },
        };
        Ok(shape)
    }

    pub fn build(&self) -> crate::error::Result<Primitive<f64>> {
        Ok(Primitive::new(self.material(), self.shape()?))
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct DomainSpec {
    pub low: [f64; 3],
    pub high: [f64; 3],
}

/// Ordered primitives and an optional domain, as read from disk.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SceneDescription {
    #[serde(default)]
    pub domain: Option<DomainSpec>,
    pub objects: Vec<ObjectSpec>,
}

impl SceneDescription {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene description {:?}", path))?;
        let description = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse JSON scene {:?}", path))?,
            _ => toml::from_str(&text)
                .with_context(|| format!("Failed to parse TOML scene {:?}", path))?,
        };
        Ok(description)
    }

    pub fn build(&self) -> Result<Scene<f64>> {
        let primitives = self
            .objects
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.build().with_context(|| format!("Invalid object {}", i)))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Building scene with {} primitives", primitives.len());

        let scene = match self.domain {
            Some(DomainSpec { low, high }) => {
                Scene::with_domain(primitives, BoundingBox::new(low, high))?
            }
            None => Scene::new(primitives),
        };
        Ok(scene)
    }
}
