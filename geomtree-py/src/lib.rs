use geomtree::{
    containment::BoundingBox,
    error::GeomError,
    geom::{Block, Cone, Cylinder, Ellipsoid, Primitive, Sphere, Wedge},
    prism::{Prism, SlantedPrism},
    scene::{mesh_from_flat, points_from_rows, Scene},
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn value_error(err: GeomError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// A solid primitive tagged with a numeric material.
#[pyclass]
#[derive(Clone)]
pub struct Object {
    inner: Primitive<f64>,
}

#[pymethods]
impl Object {
    #[staticmethod]
    fn sphere(material: f64, center: [f64; 3], radius: f64) -> Self {
        Self {
            inner: Primitive::new(material, Sphere::new(center, radius)),
        }
    }

    #[staticmethod]
    #[pyo3(signature = (material, center, radius, height, axis = [0.0, 0.0, 1.0]))]
    fn cylinder(
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        axis: [f64; 3],
    ) -> PyResult<Self> {
        let shape = Cylinder::new(center, radius, height, axis).map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, center, radius, height, wedge_angle, wedge_start, axis = [0.0, 0.0, 1.0]))]
    fn wedge(
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        wedge_angle: f64,
        wedge_start: [f64; 3],
        axis: [f64; 3],
    ) -> PyResult<Self> {
        let shape = Wedge::new(center, radius, height, axis, wedge_angle, wedge_start)
            .map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, center, radius, height, radius2, axis = [0.0, 0.0, 1.0]))]
    fn cone(
        material: f64,
        center: [f64; 3],
        radius: f64,
        height: f64,
        radius2: f64,
        axis: [f64; 3],
    ) -> PyResult<Self> {
        let shape = Cone::new(center, radius, height, axis, radius2).map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, center, size, e1 = [1.0, 0.0, 0.0], e2 = [0.0, 1.0, 0.0], e3 = [0.0, 0.0, 1.0]))]
    fn block(
        material: f64,
        center: [f64; 3],
        size: [f64; 3],
        e1: [f64; 3],
        e2: [f64; 3],
        e3: [f64; 3],
    ) -> PyResult<Self> {
        let shape = Block::new(center, e1, e2, e3, size).map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, center, size, e1 = [1.0, 0.0, 0.0], e2 = [0.0, 1.0, 0.0], e3 = [0.0, 0.0, 1.0]))]
    fn ellipsoid(
        material: f64,
        center: [f64; 3],
        size: [f64; 3],
        e1: [f64; 3],
        e2: [f64; 3],
        e3: [f64; 3],
    ) -> PyResult<Self> {
        let shape = Ellipsoid::new(center, e1, e2, e3, size).map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, vertices, height, axis = [0.0, 0.0, 1.0], center = None))]
    fn prism(
        material: f64,
        vertices: Vec<[f64; 3]>,
        height: f64,
        axis: [f64; 3],
        center: Option<[f64; 3]>,
    ) -> PyResult<Self> {
        let shape = match center {
            Some(c) => Prism::with_center(c, vertices, height, axis),
            None => Prism::new(vertices, height, axis),
        }
        .map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (material, vertices, height, sidewall_angle, axis = [0.0, 0.0, 1.0], center = None))]
    fn slanted_prism(
        material: f64,
        vertices: Vec<[f64; 3]>,
        height: f64,
        sidewall_angle: f64,
        axis: [f64; 3],
        center: Option<[f64; 3]>,
    ) -> PyResult<Self> {
        let shape = match center {
            Some(c) => SlantedPrism::with_center(c, vertices, height, axis, sidewall_angle),
            None => SlantedPrism::new(vertices, height, axis, sidewall_angle),
        }
        .map_err(value_error)?;
        Ok(Self {
            inner: Primitive::new(material, shape),
        })
    }

    #[getter]
    fn material(&self) -> f64 {
        *self.inner.material()
    }

    #[getter]
    fn volume(&self) -> f64 {
        self.inner.volume()
    }

    fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let b = self.inner.bounding_box();
        (b.low.into(), b.high.into())
    }

    fn contains(&self, point: [f64; 3]) -> bool {
        self.inner.contains(&point.into())
    }

    fn __repr__(&self) -> String {
        format!(
            "Object({}, material={})",
            self.inner.shape().name(),
            self.inner.material()
        )
    }
}

/// An ordered group of objects. Where objects overlap, the first listed wins.
#[pyclass]
pub struct ObjectGroup {
    scene: Scene<f64>,
}

#[pymethods]
impl ObjectGroup {
    #[new]
    #[pyo3(signature = (objects, domain = None))]
    fn py_new(objects: Vec<Object>, domain: Option<([f64; 3], [f64; 3])>) -> PyResult<Self> {
        let primitives = objects.into_iter().map(|o| o.inner).collect();
        let scene = match domain {
            Some((low, high)) => {
                Scene::with_domain(primitives, BoundingBox::new(low, high)).map_err(value_error)?
            }
            None => Scene::new(primitives),
        };
        Ok(Self { scene })
    }

    fn __len__(&self) -> usize {
        self.scene.primitives().len()
    }

    /// Material at a point, or None outside every object.
    fn material_at_point(&self, point: [f64; 3]) -> Option<f64> {
        self.scene.material_at(point).copied()
    }

    /// Materials at each `[x, y, z]` row; NaN outside every object.
    fn material_at_numpy_points(&self, points: Vec<Vec<f64>>) -> PyResult<Vec<f64>> {
        let points = points_from_rows(&points).map_err(value_error)?;
        let values = self
            .scene
            .batch_material_values(&points)
            .map_err(value_error)?;
        Ok(values.to_vec())
    }

    /// Materials on a mesh. Each of `xx`, `yy` and `zz` is a pair of
    /// flattened values and shape, e.g. `(xx.ravel(), xx.shape)`.
    #[pyo3(signature = (xx, yy, zz, default = 0.0))]
    fn material_on_grid(
        &self,
        xx: (Vec<f64>, Vec<usize>),
        yy: (Vec<f64>, Vec<usize>),
        zz: (Vec<f64>, Vec<usize>),
        default: f64,
    ) -> PyResult<(Vec<f64>, Vec<usize>)> {
        let mesh = |(values, shape): (Vec<f64>, Vec<usize>)| {
            mesh_from_flat(values, &shape).map_err(value_error)
        };
        let (xx, yy, zz) = (mesh(xx)?, mesh(yy)?, mesh(zz)?);
        let grid = self
            .scene
            .material_on_grid(&xx, &yy, &zz, default)
            .map_err(value_error)?;
        Ok((grid.iter().copied().collect(), grid.shape().to_vec()))
    }

    fn tree_stats(&self) -> String {
        self.scene.tree().stats().to_string()
    }
}

/// Point classification against ordered groups of solid primitives.
#[pymodule]
fn geomtree_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Object>()?;
    m.add_class::<ObjectGroup>()?;
    Ok(())
}
