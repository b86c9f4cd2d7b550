//! Format detection and path-based entry points.

use crate::ply::{write_mesh_ply, write_ply, PlyEncoding};
use crate::{Error, Result};
use cindir_3d::TriangleMesh;
use cindir_core::PointCloud;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Point cloud file formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointCloudFormat {
    Las,
    Laz,
    Ply,
    Pcd,
    Xyz,
}

impl PointCloudFormat {
    pub const ALL: [PointCloudFormat; 5] = [
        PointCloudFormat::Las,
        PointCloudFormat::Laz,
        PointCloudFormat::Ply,
        PointCloudFormat::Pcd,
        PointCloudFormat::Xyz,
    ];

    /// Detects the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        Self::ALL
            .into_iter()
            .find(|f| f.extension() == ext)
            .ok_or_else(|| {
                Error::UnsupportedFormat(if ext.is_empty() {
                    format!("{} has no file extension", path.display())
                } else {
                    format!(".{ext}")
                })
            })
    }

    pub fn extension(self) -> &'static str {
        match self {
            PointCloudFormat::Las => "las",
            PointCloudFormat::Laz => "laz",
            PointCloudFormat::Ply => "ply",
            PointCloudFormat::Pcd => "pcd",
            PointCloudFormat::Xyz => "xyz",
        }
    }
}

impl fmt::Display for PointCloudFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

fn read_by_format(path: &Path, format: PointCloudFormat) -> Result<PointCloud> {
    match format {
        PointCloudFormat::Las | PointCloudFormat::Laz => crate::las::read_las(path),
        PointCloudFormat::Ply => crate::ply::read_ply(BufReader::new(File::open(path)?)),
        PointCloudFormat::Pcd => crate::pcd::read_pcd(BufReader::new(File::open(path)?)),
        PointCloudFormat::Xyz => crate::xyz::read_xyz(BufReader::new(File::open(path)?)),
    }
}

/// Loads a point cloud, picking the reader from the file extension.
///
/// Any failure after format detection is reported as [`Error::LoadFailure`].
pub fn read_point_cloud(path: impl AsRef<Path>) -> Result<PointCloud> {
    let path = path.as_ref();
    let result = PointCloudFormat::from_path(path)
        .and_then(|format| read_by_format(path, format))
        .and_then(|cloud| cloud.validate().map(|_| cloud))
        .map_err(|e| e.into_load_failure(path));

    match &result {
        Ok(cloud) => tracing::info!(
            path = %path.display(),
            points = cloud.len(),
            colors = cloud.has_colors(),
            normals = cloud.has_normals(),
            "loaded point cloud"
        ),
        Err(e) => tracing::error!(error = %e, "point cloud load failed"),
    }
    result
}

fn into_write_failure(path: &Path, err: Error) -> Error {
    match err {
        Error::Io(source) => Error::write_failure(path, source),
        err @ Error::WriteFailure { .. } => err,
        other => Error::write_failure(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        ),
    }
}

/// Writes a point cloud to `path` as PLY.
pub fn write_point_cloud_file(
    path: impl AsRef<Path>,
    cloud: &PointCloud,
    encoding: PlyEncoding,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::write_failure(path, e))?;
    write_ply(&mut BufWriter::new(file), cloud, encoding).map_err(|e| into_write_failure(path, e))
}

/// Writes a triangle mesh to `path` as PLY.
pub fn write_mesh_file(
    path: impl AsRef<Path>,
    mesh: &TriangleMesh,
    encoding: PlyEncoding,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::write_failure(path, e))?;
    write_mesh_ply(&mut BufWriter::new(file), mesh, encoding)
        .map_err(|e| into_write_failure(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_ignores_case() {
        assert_eq!(
            PointCloudFormat::from_path(Path::new("scan.LAZ")).unwrap(),
            PointCloudFormat::Laz
        );
        assert_eq!(
            PointCloudFormat::from_path(Path::new("/data/a.b.Ply")).unwrap(),
            PointCloudFormat::Ply
        );
    }

    #[test]
    fn test_from_path_rejects_unknown() {
        assert!(matches!(
            PointCloudFormat::from_path(Path::new("mesh.obj")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            PointCloudFormat::from_path(Path::new("README")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(PointCloudFormat::Pcd.to_string(), ".pcd");
    }
}
