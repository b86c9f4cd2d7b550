//! Pipeline stages and their results.

use crate::persist::PersistReport;
use cindir_3d::PoissonConfig;
use cindir_point_cloud::{NormalEstimationConfig, StatisticalOutlierConfig, VoxelDownsampleConfig};
use std::fmt;

/// Step name used for loading in events and logs.
pub const LOAD: &str = "load";
/// Step name used for persistence in events and logs.
pub const PERSIST: &str = "persist";

/// An optional processing stage with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    RemoveOutliers(StatisticalOutlierConfig),
    EstimateNormals(NormalEstimationConfig),
    Downsample(VoxelDownsampleConfig),
    ReconstructMesh {
        poisson: PoissonConfig,
        /// Vertices below this quantile of the densities are pruned.
        density_quantile: f64,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RemoveOutliers(_) => "remove_outliers",
            Stage::EstimateNormals(_) => "estimate_normals",
            Stage::Downsample(_) => "downsample",
            Stage::ReconstructMesh { .. } => "reconstruct_mesh",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a step changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Loaded {
        points: usize,
    },
    OutliersRemoved {
        before: usize,
        after: usize,
    },
    NormalsEstimated {
        points: usize,
    },
    Downsampled {
        before: usize,
        after: usize,
    },
    MeshReconstructed {
        vertices: usize,
        faces: usize,
        pruned_vertices: usize,
    },
    Persisted(PersistReport),
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Loaded { points } => write!(f, "loaded {points} points"),
            StageOutcome::OutliersRemoved { before, after } => {
                write!(f, "removed {} outliers, {after} points remain", before - after)
            }
            StageOutcome::NormalsEstimated { points } => {
                write!(f, "estimated normals for {points} points")
            }
            StageOutcome::Downsampled { before, after } => {
                write!(f, "downsampled {before} -> {after} points")
            }
            StageOutcome::MeshReconstructed {
                vertices,
                faces,
                pruned_vertices,
            } => write!(
                f,
                "mesh with {vertices} vertices and {faces} faces ({pruned_vertices} low density vertices pruned)"
            ),
            StageOutcome::Persisted(report) => {
                write!(f, "results saved to {}", report.directory.display())
            }
        }
    }
}
