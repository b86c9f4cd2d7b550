//! The point cloud processing pipeline.
//!
//! [`PointCloudPipeline`] owns the working cloud and mesh and runs the stages
//! in a fixed order: load, outlier removal, normal estimation, downsampling,
//! meshing, then persistence. [`PipelineWorker`] runs the same pipeline on a
//! background thread and reports progress over a channel.

pub mod config;
pub mod metadata;
pub mod persist;
pub mod processor;
pub mod stage;
pub mod worker;

pub use config::{
    DownsampleSection, MeshSection, NormalsSection, OutliersSection, OutputSection,
    PipelineConfig,
};
pub use metadata::ProcessingMetadata;
pub use persist::{timestamp_token, PersistReport};
pub use processor::PointCloudPipeline;
pub use stage::{Stage, StageOutcome};
pub use worker::{
    Job, JobKind, PipelineWorker, ProcessRequest, SubmitError, WorkerConfig, WorkerEvent,
};
