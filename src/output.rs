use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use ndarray::Array3;
use serde::Serialize;

use crate::grid::GridSpec;
use crate::tree::TreeStats;


/// Share of grid cells holding one material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialFraction {
    pub material: Option<f64>, // None for cells outside every primitive
    pub cells: usize,
    pub fraction: f64,
}

/// Run summary written alongside the grid file.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub timestamp: String,
    pub scene: String,
    pub primitives: usize,
    pub tree: TreeStats,
    pub grid: GridSpec,
    pub cells: usize,
    pub materials: Vec<MaterialFraction>,
    pub primitive_fill: Option<Vec<f64>>, // fraction of the grid box inside each primitive
    pub seconds: f64,
}

/// Tallies cell materials. NaN cells count as unmatched and come first; the rest ascend.
pub fn material_fractions(values: impl Iterator<Item = f64>) -> Vec<MaterialFraction> {
    let counts = values
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .sorted_by(|a, b| match (a, b) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.total_cmp(y),
        })
        .dedup_with_count()
        .collect_vec();
    let total: usize = counts.iter().map(|(n, _)| n).sum();
    counts
        .into_iter()
        .map(|(cells, material)| MaterialFraction {
            material,
            cells,
            fraction: cells as f64 / total as f64,
        })
        .collect()
}

/// Write the material grid as `x y z material` rows in `[i, j, k]` order.
pub fn write_grid(path: impl AsRef<Path>, grid: &GridSpec, materials: &Array3<f64>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);

    let (xs, ys, zs) = (grid.axis(0), grid.axis(1), grid.axis(2));
    for ((i, j, k), value) in materials.indexed_iter() {
        writeln!(writer, "{} {} {} {}", xs[i], ys[j], zs[k], value)?;
    }
    writer.flush()?;

    Ok(())
}

pub fn write_summary(path: impl AsRef<Path>, summary: &Summary) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Failed to write summary {:?}", path))?;
    Ok(())
}

/// Write the grid file and summary into `directory`, creating it if needed.
pub fn writeup(
    directory: impl AsRef<Path>,
    grid: &GridSpec,
    materials: &Array3<f64>,
    summary: &Summary,
) -> Result<()> {
    let directory = directory.as_ref();
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create output directory {:?}", directory))?;
    write_grid(directory.join("materials.dat"), grid, materials)?;
    write_summary(directory.join("summary.json"), summary)?;
    log::info!("Results written to {:?}", directory);
    Ok(())
}
