//! Writing results to an output directory.
//!
//! All files of one run share a timestamp token. The cloud and mesh are
//! written first, then the metadata. The metadata is written even when an
//! artifact failed; earlier files are not rolled back.

use crate::metadata::ProcessingMetadata;
use chrono::{DateTime, Local};
use cindir_3d::TriangleMesh;
use cindir_core::{Error, PointCloud, Result};
use cindir_io::{write_mesh_file, write_point_cloud_file, PlyEncoding};
use std::path::{Path, PathBuf};

/// Formats the shared file token, `YYYYMMDD_HHMMSS`.
pub fn timestamp_token(time: &DateTime<Local>) -> String {
    time.format("%Y%m%d_%H%M%S").to_string()
}

/// Files written by one persistence run.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistReport {
    pub directory: PathBuf,
    pub timestamp: String,
    pub cloud_path: Option<PathBuf>,
    pub mesh_path: Option<PathBuf>,
    pub metadata_path: PathBuf,
    pub metadata: ProcessingMetadata,
}

/// What to persist.
pub(crate) struct Artifacts<'a> {
    pub cloud: Option<&'a PointCloud>,
    pub mesh: Option<&'a TriangleMesh>,
    pub original_points: usize,
}

pub(crate) fn persist(
    directory: &Path,
    timestamp: &str,
    artifacts: &Artifacts<'_>,
    encoding: PlyEncoding,
) -> Result<PersistReport> {
    std::fs::create_dir_all(directory).map_err(|e| Error::write_failure(directory, e))?;

    let mut first_error = None;
    let mut record = |result: Result<()>, path: PathBuf| match result {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::error!(error = %e, "failed to write {}", path.display());
            first_error.get_or_insert(e);
            None
        }
    };

    let cloud_path = artifacts.cloud.and_then(|cloud| {
        let path = directory.join(format!("processed_cloud_{timestamp}.ply"));
        record(write_point_cloud_file(&path, cloud, encoding), path)
    });

    let mesh_path = artifacts.mesh.and_then(|mesh| {
        let path = directory.join(format!("mesh_{timestamp}.ply"));
        record(write_mesh_file(&path, mesh, encoding), path)
    });

    let metadata = ProcessingMetadata {
        processing_date: timestamp.to_string(),
        original_points: artifacts.original_points,
        final_points: artifacts.cloud.map_or(0, PointCloud::len),
        mesh_vertices: artifacts.mesh.map_or(0, TriangleMesh::num_vertices),
        mesh_faces: artifacts.mesh.map_or(0, TriangleMesh::num_faces),
    };
    let metadata_path = directory.join(format!("metadata_{timestamp}.json"));
    let json = metadata
        .to_json_pretty()
        .map_err(|e| Error::InvalidData(e.to_string()))?;
    let written = std::fs::write(&metadata_path, json)
        .map_err(|e| Error::write_failure(&metadata_path, e));
    record(written, metadata_path.clone());

    if let Some(e) = first_error {
        return Err(e);
    }

    tracing::info!(directory = %directory.display(), timestamp, "results saved");
    Ok(PersistReport {
        directory: directory.to_path_buf(),
        timestamp: timestamp.to_string(),
        cloud_path,
        mesh_path,
        metadata_path,
        metadata,
    })
}
