use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::containment::BoundingBox;


/// Regular sampling grid over an axis-aligned box, end points included.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GridSpec {
    pub low: [f64; 3],
    pub high: [f64; 3],
    pub resolution: [usize; 3], // samples per axis
}

impl GridSpec {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.low, self.high)
    }

    /// Box holding every sample. The last linspace sample can land an ulp past `high`.
    pub fn sample_bounds(&self) -> BoundingBox {
        let mut bounds = self.bounds();
        for i in 0..3 {
            for &v in self.axis(i).iter() {
                bounds.low[i] = bounds.low[i].min(v);
                bounds.high[i] = bounds.high[i].max(v);
            }
        }
        bounds
    }

    /// Sample coordinates along axis `i`.
    pub fn axis(&self, i: usize) -> Array1<f64> {
        Array1::linspace(self.low[i], self.high[i], self.resolution[i])
    }

    pub fn num_cells(&self) -> usize {
        self.resolution.iter().product()
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.resolution[0], self.resolution[1], self.resolution[2])
    }

    /// Coordinate arrays `xx`, `yy`, `zz`, indexed `[i, j, k]`.
    pub fn meshgrid(&self) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
        let (xs, ys, zs) = (self.axis(0), self.axis(1), self.axis(2));
        let shape = self.shape();
        (
            Array3::from_shape_fn(shape, |(i, _, _)| xs[i]),
            Array3::from_shape_fn(shape, |(_, j, _)| ys[j]),
            Array3::from_shape_fn(shape, |(_, _, k)| zs[k]),
        )
    }

    /// Every sample as a row of an `(n, 3)` array, in row-major meshgrid order.
    pub fn points(&self) -> Array2<f64> {
        let (xs, ys, zs) = (self.axis(0), self.axis(1), self.axis(2));
        let (_, ny, nz) = self.shape();
        Array2::from_shape_fn((self.num_cells(), 3), |(n, c)| match c {
            0 => xs[n / (ny * nz)],
            1 => ys[(n / nz) % ny],
            _ => zs[n % nz],
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution.iter().any(|&n| n == 0) {
            return Err(anyhow!("Grid resolution must be at least 1 on every axis"));
        }
        for i in 0..3 {
            if !self.low[i].is_finite() || !self.high[i].is_finite() {
                return Err(anyhow!("Grid bounds must be finite"));
            }
            if self.low[i] > self.high[i] {
                return Err(anyhow!(
                    "Grid low corner exceeds the high corner on axis {}",
                    i
                ));
            }
        }
        Ok(())
    }
}
