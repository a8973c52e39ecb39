//! Ordered collections of primitives and material lookup.
//!
//! A [`Scene`] owns its primitives and the [`BoxTree`] built over their
//! bounding boxes. Overlaps are resolved by list order: among all
//! primitives containing a point, the one listed first wins.
//!
//! Queries come in three forms:
//! - single points ([`Scene::material_at`])
//! - batches of points as an `(n, 3)` array ([`Scene::batch_material_at`])
//! - coordinate meshes of any dimension ([`Scene::material_on_grid`])
//!
//! Batch and grid queries validate their input fully, then evaluate every
//! point in parallel.

use nalgebra::Point3;
use ndarray::parallel::prelude::*;
use ndarray::{Array, Array1, Array2, ArrayBase, ArrayD, Axis, Data, Dimension, Ix2, IxDyn, Zip};

use crate::containment::BoundingBox;
use crate::error::{GeomError, Result};
use crate::geom::{Material, NoMatch, Primitive};
use crate::tree::BoxTree;


/// Ordered primitives plus the tree indexing them.
#[derive(Debug, Clone)]
pub struct Scene<M> {
    primitives: Vec<Primitive<M>>,
    domain: BoundingBox,
    tree: BoxTree,
}

impl<M: Material> Scene<M> {
    /// A scene embedded in unbounded space.
    pub fn new(primitives: Vec<Primitive<M>>) -> Self {
        let tree = Self::index(&primitives, BoundingBox::unbounded());
        Self {
            primitives,
            domain: BoundingBox::unbounded(),
            tree,
        }
    }

    /// A scene restricted to `domain`, which must enclose every primitive.
    pub fn with_domain(primitives: Vec<Primitive<M>>, domain: BoundingBox) -> Result<Self> {
        for (i, primitive) in primitives.iter().enumerate() {
            let bounds = primitive.bounding_box();
            if !domain.contains_box(&bounds) {
                return Err(GeomError::Construction(format!(
                    "{} #{} with bounds {} extends outside the domain {}",
                    primitive.shape().name(),
                    i,
                    bounds,
                    domain
                )));
            }
        }
        let tree = Self::index(&primitives, domain);
        Ok(Self {
            primitives,
            domain,
            tree,
        })
    }

    fn index(primitives: &[Primitive<M>], domain: BoundingBox) -> BoxTree {
        let boxes: Vec<BoundingBox> = primitives
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let b = p.bounding_box();
                if b.is_empty() {
                    log::warn!("{} #{} has an empty bounding box", p.shape().name(), i);
                }
                b
            })
            .collect();
        let tree = BoxTree::build(&boxes, domain);
        log::debug!(
            "indexed {} primitives: {}",
            primitives.len(),
            tree.stats()
        );
        tree
    }

    pub fn primitives(&self) -> &[Primitive<M>] {
        &self.primitives
    }

    pub fn domain(&self) -> &BoundingBox {
        &self.domain
    }

    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    /// Union of all primitive bounding boxes.
    pub fn extent(&self) -> BoundingBox {
        self.primitives
            .iter()
            .fold(BoundingBox::empty(), |acc, p| acc.union(&p.bounding_box()))
    }

    /// Index of the highest-precedence primitive containing `point`.
    pub fn primitive_at(&self, point: impl Into<Point3<f64>>) -> Option<usize> {
        let p = point.into();
        self.tree.find(&p, |i| self.primitives[i].contains(&p))
    }

    /// Material at `point`, or `None` when no primitive contains it.
    pub fn material_at(&self, point: impl Into<Point3<f64>>) -> Option<&M> {
        self.primitive_at(point)
            .map(|i| self.primitives[i].material())
    }

    /// All primitives containing `point`, in precedence order.
    pub fn primitives_containing(&self, point: impl Into<Point3<f64>>) -> Vec<usize> {
        let p = point.into();
        self.tree.find_all(&p, |i| self.primitives[i].contains(&p))
    }

    /// Materials at each row of an `(n, 3)` array of points.
    pub fn batch_material_at<S, D>(&self, points: &ArrayBase<S, D>) -> Result<Vec<Option<&M>>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let rows = as_rows(points)?;
        Ok(rows
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.material_at([row[0], row[1], row[2]]))
            .collect())
    }

    /// Materials on a coordinate mesh. Cells no primitive claims get `default`.
    pub fn material_on_grid<S, D>(
        &self,
        xx: &ArrayBase<S, D>,
        yy: &ArrayBase<S, D>,
        zz: &ArrayBase<S, D>,
        default: M,
    ) -> Result<Array<M, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        if xx.shape() != yy.shape() || xx.shape() != zz.shape() {
            return Err(GeomError::InvalidShape(
                "xx, yy, and zz must have the same shape.".to_string(),
            ));
        }
        Ok(Zip::from(xx).and(yy).and(zz).par_map_collect(|&x, &y, &z| {
            self.material_at([x, y, z])
                .cloned()
                .unwrap_or_else(|| default.clone())
        }))
    }

    /// A view answering queries inside `bounds` with a pruned tree.
    pub fn restrict(&self, bounds: &BoundingBox) -> SceneView<'_, M> {
        SceneView {
            scene: self,
            tree: self.tree.restrict(bounds),
        }
    }
}

impl<M: Material + NoMatch> Scene<M> {
    /// As [`Scene::batch_material_at`], with unclaimed points set to the no-match sentinel.
    pub fn batch_material_values<S, D>(&self, points: &ArrayBase<S, D>) -> Result<Array1<M>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        Ok(self
            .batch_material_at(points)?
            .into_iter()
            .map(|m| m.cloned().unwrap_or_else(M::no_match))
            .collect())
    }
}

/// A scene seen through a window. Points outside the window match nothing.
#[derive(Debug, Clone)]
pub struct SceneView<'a, M> {
    scene: &'a Scene<M>,
    tree: BoxTree,
}

impl<'a, M: Material> SceneView<'a, M> {
    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn primitive_at(&self, point: impl Into<Point3<f64>>) -> Option<usize> {
        let p = point.into();
        self.tree
            .find(&p, |i| self.scene.primitives[i].contains(&p))
    }

    pub fn material_at(&self, point: impl Into<Point3<f64>>) -> Option<&'a M> {
        let scene = self.scene;
        self.primitive_at(point)
            .map(|i| scene.primitives[i].material())
    }
}

fn as_rows<S, D>(points: &ArrayBase<S, D>) -> Result<ndarray::ArrayView2<'_, f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if points.ndim() != 2 {
        return Err(GeomError::InvalidShape(
            "Points must be a 2D array.".to_string(),
        ));
    }
    if points.shape()[1] != 3 {
        return Err(GeomError::InvalidShape(
            "Points must have shape (n_points, 3).".to_string(),
        ));
    }
    points
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| GeomError::InvalidShape(e.to_string()))
}

/// Packs rows of three coordinates into an `(n, 3)` array.
pub fn points_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    if let Some(bad) = rows.iter().position(|r| r.len() != 3) {
        return Err(GeomError::InvalidShape(format!(
            "Points must have shape (n_points, 3), row {} has {} values.",
            bad,
            rows[bad].len()
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), 3), flat).map_err(|e| GeomError::InvalidShape(e.to_string()))
}

/// Reshapes flattened coordinates into a mesh of the given shape.
pub fn mesh_from_flat(values: Vec<f64>, shape: &[usize]) -> Result<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| GeomError::InvalidShape(e.to_string()))
}
