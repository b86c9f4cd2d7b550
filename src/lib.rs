//! Point cloud import, cleanup, surface reconstruction and export.
//!
//! Umbrella crate over the workspace members. The `cindir` binary is a thin
//! command line host around [`pipeline::PipelineWorker`].

pub use cindir_3d as mesh;
pub use cindir_core as core;
pub use cindir_io as io;
pub use cindir_pipeline as pipeline;
pub use cindir_point_cloud as point_cloud;

pub use cindir_core::{Error, PointCloud, Result};
pub use cindir_pipeline::{PipelineConfig, PipelineWorker, PointCloudPipeline};
