use anyhow::{anyhow, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::geom::NoMatch;
use crate::grid::GridSpec;


/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub scene: String,     // path to the scene description
    pub directory: String, // output directory
    pub grid: GridSpec,
    #[serde(default = "default_background")]
    pub background: f64, // material written for cells no primitive claims
    #[serde(default = "default_restrict")]
    pub restrict: bool, // query through a tree pruned to the grid box
    #[serde(default)]
    pub overlap_samples: usize, // per-axis samples for primitive fill fractions, 0 to skip
}

fn default_background() -> f64 {
    f64::no_match()
}

fn default_restrict() -> bool {
    true
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("Error loading configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        log::info!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        log::info!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("geomtree"))
        .build()
        .context("Error loading configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    // Parse command-line arguments and override values
    apply_overrides(&mut config, CliArgs::parse())?;

    validate_config(&config)?;

    log::debug!("{:#?}", config);

    Ok(config)
}

fn apply_overrides(config: &mut Settings, args: CliArgs) -> Result<()> {
    if let Some(scene) = args.scene {
        config.scene = scene;
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if let Some(background) = args.background {
        config.background = background;
    }
    if let Some(samples) = args.samples {
        config.overlap_samples = samples;
    }
    if args.no_restrict {
        config.restrict = false;
    }
    if let Some(resolution) = args.resolution {
        config.grid.resolution = triple(&resolution, "resolution")?;
    }
    if let Some(low) = args.low {
        config.grid.low = triple(&low, "low")?;
    }
    if let Some(high) = args.high {
        config.grid.high = triple(&high, "high")?;
    }
    Ok(())
}

fn triple<T: Copy>(values: &[T], name: &str) -> Result<[T; 3]> {
    match values {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(anyhow!(
            "--{} requires exactly three values, got {}",
            name,
            values.len()
        )),
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the GEOMTREE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("GEOMTREE_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    // Fallback: walk upward from the executable looking for a "config" subdirectory
    let exe_path = env::current_exe().context("Failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Could not find project root directory"))
}

fn validate_config(config: &Settings) -> Result<()> {
    if config.scene.trim().is_empty() {
        return Err(anyhow!("A scene description file must be given"));
    }
    config.grid.validate()
}

#[derive(Parser, Debug)]
#[command(version, about = "geomtree - material lookup on grids of solid primitives")]
pub struct CliArgs {
    /// Scene description file (.toml or .json) listing primitives in precedence order.
    #[arg(short, long)]
    scene: Option<String>,

    /// Output directory for the grid file and summary.
    #[arg(short, long)]
    dir: Option<String>,

    /// Number of grid samples along x, y and z.
    #[arg(short, long, num_args = 3)]
    resolution: Option<Vec<usize>>,

    /// Low corner of the grid.
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    low: Option<Vec<f64>>,

    /// High corner of the grid.
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    high: Option<Vec<f64>>,

    /// Material written for cells outside every primitive. Defaults to NaN.
    #[arg(short, long, allow_negative_numbers = true)]
    background: Option<f64>,

    /// Samples per axis for estimating how much of the grid box each primitive fills.
    #[arg(long)]
    samples: Option<usize>,

    /// Query the full tree instead of one pruned to the grid box.
    #[arg(long)]
    no_restrict: bool,
}
