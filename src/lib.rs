//! Point classification against ordered stacks of solid primitives.
//!
//! Primitives ([`geom::Shape`]) answer containment, volume and bounding-box
//! queries. A [`scene::Scene`] resolves overlaps by list order and indexes its
//! primitives with a [`tree::BoxTree`] so material lookups touch only a
//! handful of candidates per point.

pub mod config;
pub mod containment;
pub mod description;
pub mod error;
pub mod geom;
pub mod grid;
pub mod output;
pub mod prism;
pub mod scene;
pub mod settings;
pub mod survey;
pub mod tree;
