//! Point cloud cleanup and analysis.
//!
//! - `search`: R-tree backed k-nearest and hybrid radius queries
//! - `filtering`: statistical outlier removal and voxel downsampling
//! - `normals`: PCA normal estimation
//!
//! Per-point work runs on whichever rayon pool the caller installs, the
//! pipeline worker's own pool or the global one.

pub mod filtering;
pub mod normals;
pub mod search;

pub use filtering::{remove_statistical_outliers, voxel_down_sample};
pub use normals::{compute_normals, estimate_normals};
pub use search::PointIndex;

use serde::{Deserialize, Serialize};

/// Parameters of [`remove_statistical_outliers`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticalOutlierConfig {
    /// Neighbors used for each point's mean distance, the point itself excluded.
    pub nb_neighbors: usize,
    /// Points farther than `mean + std_ratio * std` are dropped.
    pub std_ratio: f64,
}

impl Default for StatisticalOutlierConfig {
    fn default() -> Self {
        Self {
            nb_neighbors: 20,
            std_ratio: 2.0,
        }
    }
}

/// Parameters of [`estimate_normals`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalEstimationConfig {
    pub radius: f64,
    pub max_nn: usize,
}

impl Default for NormalEstimationConfig {
    fn default() -> Self {
        Self {
            radius: 0.1,
            max_nn: 30,
        }
    }
}

/// Parameters of [`voxel_down_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelDownsampleConfig {
    pub voxel_size: f64,
}

impl Default for VoxelDownsampleConfig {
    fn default() -> Self {
        Self { voxel_size: 0.05 }
    }
}
