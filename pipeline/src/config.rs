//! Pipeline configuration.
//!
//! One section per optional stage plus the output settings. Defaults match
//! the stock processing run: outliers, normals and meshing on, downsampling
//! off.

use crate::stage::Stage;
use cindir_3d::PoissonConfig;
use cindir_core::{Error, Result};
use cindir_io::PlyEncoding;
use cindir_point_cloud::{NormalEstimationConfig, StatisticalOutlierConfig, VoxelDownsampleConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutliersSection {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: StatisticalOutlierConfig,
}

impl Default for OutliersSection {
    fn default() -> Self {
        Self {
            enabled: true,
            params: StatisticalOutlierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalsSection {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: NormalEstimationConfig,
}

impl Default for NormalsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            params: NormalEstimationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownsampleSection {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: VoxelDownsampleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSection {
    pub enabled: bool,
    /// Vertices whose density falls below this quantile are removed.
    pub density_quantile: f64,
    #[serde(flatten)]
    pub poisson: PoissonConfig,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            enabled: true,
            density_quantile: 0.1,
            poisson: PoissonConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub directory: PathBuf,
    pub ply_encoding: PlyEncoding,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            ply_encoding: PlyEncoding::default(),
        }
    }
}

/// Configuration for a full processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep running later stages after one fails.
    pub continue_on_error: bool,
    /// Worker threads for the per-point stages. Unset uses one per core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    pub outliers: OutliersSection,
    pub normals: NormalsSection,
    pub downsample: DownsampleSection,
    pub mesh: MeshSection,
    pub output: OutputSection,
}

impl PipelineConfig {
    /// Only the cleanup stages, no meshing.
    pub fn cleanup_only() -> Self {
        Self {
            mesh: MeshSection {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|e| Error::write_failure(path, e))
    }

    /// The enabled stages, in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(4);
        if self.outliers.enabled {
            stages.push(Stage::RemoveOutliers(self.outliers.params));
        }
        if self.normals.enabled {
            stages.push(Stage::EstimateNormals(self.normals.params));
        }
        if self.downsample.enabled {
            stages.push(Stage::Downsample(self.downsample.params));
        }
        if self.mesh.enabled {
            stages.push(Stage::ReconstructMesh {
                poisson: self.mesh.poisson,
                density_quantile: self.mesh.density_quantile,
            });
        }
        stages
    }
}
