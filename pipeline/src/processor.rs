//! The pipeline state holder.

use crate::persist::{self, timestamp_token, Artifacts, PersistReport};
use crate::stage::{Stage, StageOutcome, LOAD};
use cindir_3d::{poisson_reconstruction, remove_low_density_vertices, PoissonConfig, TriangleMesh};
use cindir_core::{Error, PointCloud, Result};
use cindir_io::{read_point_cloud, PlyEncoding};
use cindir_point_cloud::{
    compute_normals, remove_statistical_outliers, voxel_down_sample, NormalEstimationConfig,
    StatisticalOutlierConfig, VoxelDownsampleConfig,
};
use std::path::{Path, PathBuf};

/// Owns the working point cloud and mesh of one processing run.
///
/// Every stage computes its result before touching the state, so a failed
/// stage leaves the previous cloud and mesh in place.
#[derive(Debug, Default)]
pub struct PointCloudPipeline {
    cloud: Option<PointCloud>,
    mesh: Option<TriangleMesh>,
    source: Option<PathBuf>,
    original_points: usize,
    ply_encoding: PlyEncoding,
}

impl PointCloudPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ply_encoding(mut self, encoding: PlyEncoding) -> Self {
        self.ply_encoding = encoding;
        self
    }

    pub fn set_ply_encoding(&mut self, encoding: PlyEncoding) {
        self.ply_encoding = encoding;
    }

    pub fn cloud(&self) -> Option<&PointCloud> {
        self.cloud.as_ref()
    }

    pub fn mesh(&self) -> Option<&TriangleMesh> {
        self.mesh.as_ref()
    }

    /// File the current cloud was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Point count straight out of the loader, before any stage ran.
    pub fn original_point_count(&self) -> usize {
        self.original_points
    }

    /// Drops the cloud, mesh and source.
    pub fn reset(&mut self) {
        let encoding = self.ply_encoding;
        *self = Self::default();
        self.ply_encoding = encoding;
    }

    /// Loads a point cloud, replacing the current cloud and clearing the mesh.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<StageOutcome> {
        let path = path.as_ref();
        let cloud = read_point_cloud(path)?;
        let points = cloud.len();

        self.cloud = Some(cloud);
        self.mesh = None;
        self.source = Some(path.to_path_buf());
        self.original_points = points;
        Ok(StageOutcome::Loaded { points })
    }

    fn require_cloud(&self, stage: &'static str) -> Result<&PointCloud> {
        self.cloud.as_ref().ok_or(Error::MissingPrerequisite {
            stage,
            requirement: "a loaded point cloud",
        })
    }

    pub fn remove_outliers(&mut self, config: &StatisticalOutlierConfig) -> Result<StageOutcome> {
        let cloud = self.require_cloud("remove_outliers")?;
        let before = cloud.len();
        let (filtered, _) = remove_statistical_outliers(cloud, config)?;
        let after = filtered.len();

        self.cloud = Some(filtered);
        tracing::info!(before, after, "outliers removed");
        Ok(StageOutcome::OutliersRemoved { before, after })
    }

    pub fn estimate_normals(&mut self, config: &NormalEstimationConfig) -> Result<StageOutcome> {
        let cloud = self.require_cloud("estimate_normals")?;
        let normals = compute_normals(cloud, config)?;
        let points = normals.len();

        if let Some(cloud) = self.cloud.as_mut() {
            cloud.normals = Some(normals);
        }
        tracing::info!(points, "normals estimated");
        Ok(StageOutcome::NormalsEstimated { points })
    }

    pub fn downsample(&mut self, config: &VoxelDownsampleConfig) -> Result<StageOutcome> {
        let cloud = self.require_cloud("downsample")?;
        let before = cloud.len();
        let down = voxel_down_sample(cloud, config)?;
        let after = down.len();

        self.cloud = Some(down);
        tracing::info!(before, after, "downsampled");
        Ok(StageOutcome::Downsampled { before, after })
    }

    /// Poisson reconstruction followed by low-density pruning.
    ///
    /// Needs normals on the current cloud.
    pub fn reconstruct_mesh(
        &mut self,
        config: &PoissonConfig,
        density_quantile: f64,
    ) -> Result<StageOutcome> {
        let cloud = self.require_cloud("reconstruct_mesh")?;
        if !cloud.has_normals() {
            return Err(Error::MissingPrerequisite {
                stage: "reconstruct_mesh",
                requirement: "estimated normals",
            });
        }

        let mut mesh = poisson_reconstruction(cloud, config)?;
        let before = mesh.num_vertices();
        let pruned = remove_low_density_vertices(&mut mesh, density_quantile)?;
        tracing::info!(
            before,
            after = mesh.num_vertices(),
            faces = mesh.num_faces(),
            "mesh created"
        );

        let outcome = StageOutcome::MeshReconstructed {
            vertices: mesh.num_vertices(),
            faces: mesh.num_faces(),
            pruned_vertices: pruned,
        };
        self.mesh = Some(mesh);
        Ok(outcome)
    }

    /// Runs one stage, logging a failure before returning it.
    pub fn run_stage(&mut self, stage: &Stage) -> Result<StageOutcome> {
        let span = tracing::info_span!("stage", name = stage.name());
        let _enter = span.enter();

        let result = match stage {
            Stage::RemoveOutliers(config) => self.remove_outliers(config),
            Stage::EstimateNormals(config) => self.estimate_normals(config),
            Stage::Downsample(config) => self.downsample(config),
            Stage::ReconstructMesh {
                poisson,
                density_quantile,
            } => self.reconstruct_mesh(poisson, *density_quantile),
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "stage failed");
        }
        result
    }

    /// Loads `path`, logging a failure before returning it.
    pub fn run_load(&mut self, path: impl AsRef<Path>) -> Result<StageOutcome> {
        let span = tracing::info_span!("stage", name = LOAD);
        let _enter = span.enter();
        self.load(path)
    }

    /// Writes the current results to `directory`, stamped with the local time.
    pub fn persist(&self, directory: impl AsRef<Path>) -> Result<PersistReport> {
        self.persist_with_timestamp(directory, &timestamp_token(&chrono::Local::now()))
    }

    /// Writes the current results using an explicit timestamp token.
    pub fn persist_with_timestamp(
        &self,
        directory: impl AsRef<Path>,
        timestamp: &str,
    ) -> Result<PersistReport> {
        let artifacts = Artifacts {
            cloud: self.cloud.as_ref(),
            mesh: self.mesh.as_ref(),
            original_points: self.original_points,
        };
        persist::persist(directory.as_ref(), timestamp, &artifacts, self.ply_encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_need_a_cloud() {
        let mut pipeline = PointCloudPipeline::new();
        for stage in crate::PipelineConfig::default().stages() {
            assert!(matches!(
                pipeline.run_stage(&stage),
                Err(Error::MissingPrerequisite { .. })
            ));
        }
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let mut pipeline = PointCloudPipeline::new();
        assert!(pipeline.load("does/not/exist.ply").is_err());
        assert!(pipeline.cloud().is_none());
        assert!(pipeline.source().is_none());
        assert_eq!(pipeline.original_point_count(), 0);
    }
}
