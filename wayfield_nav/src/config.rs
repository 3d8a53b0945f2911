// Data-driven build and search configuration.
//
// All tunable parameters live in `NavConfig`, loaded from JSON. It has two
// groups: `BuildConfig` (the mesh build trigger: cell size, clearance clamp,
// walkable layers, ignored colliders, illumination clamp) and `SearchConfig`
// (algorithm choice, soft deadline, worker thread count). Every field has a
// default, so a config file only needs to name what it changes.
//
// `validate()` enforces the build trigger contract; `MeshBuilder::new()`
// calls it, so an invalid config never reaches sampling.
//
// See also: `builder.rs` which consumes `BuildConfig`, `worker.rs` and
// `pathfinding.rs` which consume `SearchConfig`.

use crate::error::{NavError, NavResult};
use crate::pathfinding::PathAlgorithm;
use crate::types::{ColliderId, SurfaceLayer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Parameters of a single mesh build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Horizontal sampling step in world units. Also scales the neighbour
    /// radius (`1.5 * cell_size`) and the prune radius (`3 * cell_size`).
    pub cell_size: f32,

    /// Lower clamp for a node's clearance height; also the minimum gap that
    /// triggers an under-obstacle probe.
    pub min_cell_height: f32,

    /// Upper clamp for a node's clearance height.
    pub max_cell_height: f32,

    /// Clamp accumulated illumination to `[0, max_light_intensity]`.
    pub clamp_illumination: bool,

    /// Only meaningful when `clamp_illumination` is set.
    pub max_light_intensity: f32,

    /// Surface layers an agent can stand on. Empty means nothing is
    /// walkable (allowed, but logged as a warning).
    pub walkable_layers: BTreeSet<SurfaceLayer>,

    /// Colliders rays pass through during the build (agents, props).
    pub ignored_colliders: BTreeSet<ColliderId>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            min_cell_height: 1.0,
            max_cell_height: 3.0,
            clamp_illumination: false,
            max_light_intensity: 1.0,
            walkable_layers: BTreeSet::from([SurfaceLayer(0)]),
            ignored_colliders: BTreeSet::new(),
        }
    }
}

impl BuildConfig {
    /// Check the build trigger contract.
    pub fn validate(&self) -> NavResult<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(NavError::config(format!(
                "cell_size must be a positive number, got {}",
                self.cell_size
            )));
        }
        if !(self.min_cell_height.is_finite() && self.max_cell_height.is_finite()) {
            return Err(NavError::config("cell heights must be finite"));
        }
        if self.max_cell_height < self.min_cell_height {
            return Err(NavError::config(format!(
                "max_cell_height ({}) must be >= min_cell_height ({})",
                self.max_cell_height, self.min_cell_height
            )));
        }
        if self.clamp_illumination
            && !(self.max_light_intensity.is_finite() && self.max_light_intensity > 0.0)
        {
            return Err(NavError::config(format!(
                "max_light_intensity must be positive when clamping, got {}",
                self.max_light_intensity
            )));
        }
        Ok(())
    }

    /// The illumination ceiling, if clamping is enabled.
    pub fn illumination_clamp(&self) -> Option<f32> {
        self.clamp_illumination.then_some(self.max_light_intensity)
    }
}

/// Parameters for path searches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub algorithm: PathAlgorithm,

    /// Soft deadline per search, in milliseconds. `0` disables it.
    pub max_seek_time_ms: u64,

    /// Number of background search threads in a `PathWorker`.
    pub worker_threads: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            algorithm: PathAlgorithm::AStar,
            max_seek_time_ms: 500,
            worker_threads: 1,
        }
    }
}

impl SearchConfig {
    pub fn max_seek_time(&self) -> Option<Duration> {
        (self.max_seek_time_ms > 0).then(|| Duration::from_millis(self.max_seek_time_ms))
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub build: BuildConfig,
    pub search: SearchConfig,
}

impl NavConfig {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> NavResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> NavResult<()> {
        self.build.validate()?;
        if self.search.worker_threads == 0 {
            return Err(NavError::config("worker_threads must be at least 1"));
        }
        Ok(())
    }
}
