//! Grid surveys: material lookup over every sample of a regular grid.
//!
//! This module drives a full run of the application. It loads the scene
//! description named in the settings, evaluates the configured grid in
//! parallel and writes the material grid plus a JSON summary.
//!
//! The survey system provides:
//! - Parallel evaluation over grid slices with rayon
//! - Progress tracking for large grids
//! - Optional queries through a tree pruned to the grid box
//! - Per-material cell tallies and per-primitive fill fractions
//!
//! # Key Features
//!
//! - [`Survey`]: Orchestrator owning the settings, scene and results
//! - Output through [`crate::output::writeup`]

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;

use crate::description::SceneDescription;
use crate::output::{self, Summary};
use crate::scene::Scene;
use crate::settings::Settings;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Block, Primitive, Sphere};
    use crate::grid::GridSpec;

    fn settings(restrict: bool) -> Settings {
        Settings {
            scene: "inline".to_string(),
            directory: "unused".to_string(),
            grid: GridSpec {
                low: [-2.0, -2.0, -2.0],
                high: [2.0, 2.0, 2.0],
                resolution: [5, 5, 5],
            },
            background: -1.0,
            restrict,
            overlap_samples: 40,
        }
    }

    fn scene() -> Scene<f64> {
        Scene::new(vec![
            Primitive::new(1.0, Sphere::new([0.0, 0.0, 0.0], 0.5)),
            Primitive::new(2.0, Sphere::new([1.0, 0.0, 0.0], 1.2)),
        ])
    }

    #[test]
    fn survey_matches_point_queries() {
        let mut survey = Survey::from_scene(settings(false), scene());
        survey.solve().unwrap();
        let materials = survey.materials.as_ref().unwrap();
        assert_eq!(materials.shape(), &[5, 5, 5]);

        let (xx, yy, zz) = survey.settings.grid.meshgrid();
        for ((idx, value), ((x, y), z)) in materials
            .indexed_iter()
            .zip(xx.iter().zip(yy.iter()).zip(zz.iter()))
        {
            let expected = survey.scene.material_at([*x, *y, *z]).copied().unwrap_or(-1.0);
            assert_eq!(*value, expected, "mismatch at {:?}", idx);
        }
        assert_eq!(materials[[2, 2, 2]], 1.0);
        assert_eq!(materials[[3, 2, 2]], 2.0);
    }

    #[test]
    fn restricted_survey_agrees() {
        let mut full = Survey::from_scene(settings(false), scene());
        let mut restricted = Survey::from_scene(settings(true), scene());
        full.solve().unwrap();
        restricted.solve().unwrap();
        assert_eq!(full.materials, restricted.materials);
    }

    #[test]
    fn restricted_survey_reaches_the_last_sample() {
        // linspace(-1.0, 0.7, 14) ends at 0.7000000000000002
        let mut settings = settings(true);
        settings.grid = GridSpec {
            low: [-1.0, -1.0, -1.0],
            high: [0.7, 0.7, 0.7],
            resolution: [14, 14, 14],
        };
        let block = Block::new(
            [0.7, 0.7, 0.7],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        )
        .unwrap();
        let scene = || Scene::new(vec![Primitive::new(5.0, block.clone())]);

        let mut restricted = Survey::from_scene(settings.clone(), scene());
        restricted.solve().unwrap();
        settings.restrict = false;
        let mut full = Survey::from_scene(settings, scene());
        full.solve().unwrap();

        assert_eq!(full.materials, restricted.materials);
        assert_eq!(restricted.materials.unwrap()[[13, 13, 13]], 5.0);
    }

    #[test]
    fn time_per_cell_handles_huge_grids() {
        assert_eq!(time_per_cell(2.0, 4), Duration::from_millis(500));
        assert_eq!(time_per_cell(2.0, 0), Duration::from_secs(2));
        assert!(time_per_cell(4.0, 1 << 32) < Duration::from_micros(1));
    }

    #[test]
    fn summary_needs_a_solved_survey() {
        let survey = Survey::from_scene(settings(false), scene());
        assert!(survey.summary().is_err());
    }

    #[test]
    fn summary_reports_fill() {
        let mut survey = Survey::from_scene(settings(false), scene());
        survey.solve().unwrap();
        let summary = survey.summary().unwrap();
        assert_eq!(summary.primitives, 2);
        assert_eq!(summary.cells, 125);
        let total: usize = summary.materials.iter().map(|m| m.cells).sum();
        assert_eq!(total, 125);

        let fill = summary.primitive_fill.unwrap();
        let expected = 4.0 / 3.0 * std::f64::consts::PI * 0.125 / 64.0;
        assert!((fill[0] - expected).abs() < 0.1 * expected);
    }
}

/// A scene evaluated on a regular grid.
///
/// **Context**: Simulation codes need the material at every sample of a
/// grid, often millions of points. Each point is independent, so the grid is
/// evaluated as a parallel map over its x slices.
///
/// **How it Works**: Holds the settings and scene, fills `materials` on
/// [`Survey::solve`] and produces a [`Summary`] of the run for output.
#[derive(Debug)]
pub struct Survey {
    pub settings: Settings,
    pub scene: Scene<f64>,
    pub materials: Option<Array3<f64>>, // indexed [i, j, k] like the grid meshgrid
    seconds: f64,
}

fn time_per_cell(seconds: f64, cells: usize) -> Duration {
    Duration::from_secs_f64(seconds / cells.max(1) as f64)
}

impl Survey {
    /// Creates a survey by loading the scene description named in `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let description = SceneDescription::from_file(&settings.scene)?;
        let scene = description
            .build()
            .with_context(|| format!("Failed to build scene {:?}", settings.scene))?;
        Ok(Self::from_scene(settings, scene))
    }

    pub fn from_scene(settings: Settings, scene: Scene<f64>) -> Self {
        log::info!("Box tree: {}", scene.tree().stats());
        Self {
            settings,
            scene,
            materials: None,
            seconds: 0.0,
        }
    }

    /// Evaluates every grid sample in parallel.
    pub fn solve(&mut self) -> Result<()> {
        let start = Instant::now();
        let grid = &self.settings.grid;
        let (nx, ny, nz) = grid.shape();
        let (xs, ys, zs) = (grid.axis(0), grid.axis(1), grid.axis(2));
        let background = self.settings.background;
        log::info!("Evaluating {} grid cells...", grid.num_cells());

        let view = self
            .settings
            .restrict
            .then(|| self.scene.restrict(&grid.sample_bounds()));

        let pb = ProgressBar::new(nx as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("slice".to_string());

        let slices: Vec<Array2<f64>> = (0..nx)
            .into_par_iter()
            .map(|i| {
                let slice = Array2::from_shape_fn((ny, nz), |(j, k)| {
                    let p = [xs[i], ys[j], zs[k]];
                    let material = match &view {
                        Some(view) => view.material_at(p),
                        None => self.scene.material_at(p),
                    };
                    material.copied().unwrap_or(background)
                });
                pb.inc(1);
                slice
            })
            .collect();
        pb.finish_and_clear();

        let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
        let materials = ndarray::stack(Axis(0), &views)
            .map_err(|e| anyhow!("Failed to assemble grid: {}", e))?;

        self.seconds = start.elapsed().as_secs_f64();
        log::info!(
            "Time taken: {:.2?}, time per cell: {:.2?}",
            start.elapsed(),
            time_per_cell(self.seconds, grid.num_cells())
        );

        self.materials = Some(materials);
        Ok(())
    }

    pub fn summary(&self) -> Result<Summary> {
        let materials = self
            .materials
            .as_ref()
            .ok_or_else(|| anyhow!("Survey has not been solved"))?;
        let grid = &self.settings.grid;

        let primitive_fill = if self.settings.overlap_samples > 0 {
            let bounds = grid.bounds();
            Some(
                self.scene
                    .primitives()
                    .iter()
                    .map(|p| p.overlap_fraction(&bounds, self.settings.overlap_samples))
                    .collect::<crate::error::Result<Vec<f64>>>()?,
            )
        } else {
            None
        };

        Ok(Summary {
            timestamp: Local::now().to_rfc3339(),
            scene: self.settings.scene.clone(),
            primitives: self.scene.primitives().len(),
            tree: self.scene.tree().stats(),
            grid: grid.clone(),
            cells: materials.len(),
            materials: output::material_fractions(materials.iter().copied()),
            primitive_fill,
            seconds: self.seconds,
        })
    }

    /// Writes the material grid and summary to the output directory.
    pub fn writeup(&self) -> Result<()> {
        let materials = self
            .materials
            .as_ref()
            .ok_or_else(|| anyhow!("Survey has not been solved"))?;
        output::writeup(
            &self.settings.directory,
            &self.settings.grid,
            materials,
            &self.summary()?,
        )
    }
}
