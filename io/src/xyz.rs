//! XYZ plain-text point lists.
//!
//! One point per line, whitespace separated. Blank lines and `#` comments are
//! skipped. When the first data line has six or more fields, fields 4-6 are
//! 0-255 RGB and every later line must carry them too.

use crate::{Error, Result};
use cindir_core::PointCloud;
use nalgebra::Point3;
use std::io::BufRead;

fn parse_field(token: &str, line_no: usize) -> Result<f64> {
    token
        .parse()
        .map_err(|_| Error::Parse(format!("line {line_no}: invalid number '{token}'")))
}

/// Read an XYZ point list
pub fn read_xyz<R: BufRead>(reader: R) -> Result<PointCloud> {
    let mut points = Vec::new();
    let mut colors: Option<Vec<Point3<f64>>> = None;
    let mut first = true;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if first {
            if fields.len() >= 6 {
                colors = Some(Vec::new());
            }
            first = false;
        }

        let needed = if colors.is_some() { 6 } else { 3 };
        if fields.len() < needed {
            return Err(Error::InvalidData(format!(
                "line {line_no}: expected at least {needed} fields, found {}",
                fields.len()
            )));
        }

        points.push(Point3::new(
            parse_field(fields[0], line_no)?,
            parse_field(fields[1], line_no)?,
            parse_field(fields[2], line_no)?,
        ));
        if let Some(colors) = colors.as_mut() {
            colors.push(Point3::new(
                parse_field(fields[3], line_no)? / 255.0,
                parse_field(fields[4], line_no)? / 255.0,
                parse_field(fields[5], line_no)? / 255.0,
            ));
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
    use std::io::Cursor;

    #[test]
    fn test_plain_points_with_comments() {
        let data = "# exported scan\n0 0 0\n\n1.5 2.5 -3\n  4 5 6  \n";
        let cloud = read_xyz(Cursor::new(data)).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.points[1], Point3::new(1.5, 2.5, -3.0));
        assert!(cloud.colors.is_none());
    }

    #[test]
    fn test_colors_from_first_line() {
        let data = "0 0 0 255 0 0\n1 1 1 0 51 255 0.5\n";
        let cloud = read_xyz(Cursor::new(data)).unwrap();
        let colors = cloud.colors.unwrap();
        assert_eq!(colors[0], Point3::new(1.0, 0.0, 0.0));
        assert!((colors[1].y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_missing_color_on_later_line() {
        let data = "0 0 0 255 0 0\n1 1 1\n";
        assert!(matches!(
            read_xyz(Cursor::new(data)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_number_names_line() {
        let data = "0 0 0\n\n1 x 1\n";
        let err = read_xyz(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
