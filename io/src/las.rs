//! LAS / LAZ reader backed by the `las` crate.

use crate::scalar::capacity_hint;
use crate::{Error, Result};
use cindir_core::PointCloud;
use las::{Read, Reader};
use nalgebra::Point3;
use std::path::Path;

/// Full scale of the 16-bit LAS color channels.
const COLOR_SCALE: f64 = 65535.0;

fn las_error(path: &Path, err: las::Error) -> Error {
    Error::LoadFailure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Read a LAS or LAZ file
///
/// Colors are read when the point format carries RGB.
pub fn read_las(path: &Path) -> Result<PointCloud> {
    let mut reader = Reader::from_path(path).map_err(|e| las_error(path, e))?;
    let has_color = reader.header().point_format().has_color;
    let capacity = capacity_hint(reader.header().number_of_points() as usize);

    let mut points = Vec::with_capacity(capacity);
    let mut colors = has_color.then(|| Vec::with_capacity(capacity));

    for point in reader.points() {
        let point = point.map_err(|e| las_error(path, e))?;
        points.push(Point3::new(point.x, point.y, point.z));
        if let Some(colors) = colors.as_mut() {
            colors.push(point.color.map_or_else(Point3::origin, |c| {
                Point3::new(
                    c.red as f64 / COLOR_SCALE,
                    c.green as f64 / COLOR_SCALE,
                    c.blue as f64 / COLOR_SCALE,
                )
            }));
        }
    }

    Ok(PointCloud {
        points,
        colors,
        normals: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use las::{point::Format, Builder, Color, Point, Write, Writer};

    fn write_fixture(path: &Path, with_color: bool) {
        let mut builder = Builder::from((1, 2));
        builder.point_format = Format::new(if with_color { 2 } else { 0 }).unwrap();
        let header = builder.into_header().unwrap();
        let mut writer = Writer::from_path(path, header).unwrap();
        for i in 0..4 {
            writer
                .write(Point {
                    x: i as f64,
                    y: 2.0 * i as f64,
                    z: 0.5,
                    color: with_color.then(|| Color::new(65535, 0, 32768)),
                    ..Default::default()
                })
                .unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_read_las_with_color() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.las");
        write_fixture(&path, true);

        let cloud = read_las(&path).unwrap();
        assert_eq!(cloud.len(), 4);
        assert!((cloud.points[3].y - 6.0).abs() < 1e-3);
        let colors = cloud.colors.unwrap();
        assert!((colors[0].x - 1.0).abs() < 1e-12);
        assert!((colors[0].z - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_read_las_without_color() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.las");
        write_fixture(&path, false);

        let cloud = read_las(&path).unwrap();
        assert_eq!(cloud.len(), 4);
        assert!(cloud.colors.is_none());
    }

    #[test]
    fn test_garbage_file_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.las");
        std::fs::write(&path, b"not a las file").unwrap();
        assert!(matches!(
            read_las(&path),
            Err(Error::LoadFailure { .. })
        ));
    }
}
