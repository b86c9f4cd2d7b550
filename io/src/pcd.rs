//! PCD (Point Cloud Data) I/O
//!
//! PCD is the native format for Point Cloud Library (PCL). The `ascii` and
//! `binary` data sections are supported; `binary_compressed` is rejected.

use crate::scalar::{capacity_hint, read_header_line, ByteOrder, ScalarType};
use crate::{Error, Result};
use cindir_core::PointCloud;
use nalgebra::{Point3, Vector3};
use std::io::{BufRead, Read};

/// PCD data format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdData {
    Ascii,
    Binary,
    BinaryCompressed,
}

/// Largest binary record accepted, in bytes.
const MAX_RECORD_BYTES: usize = 1 << 16;

#[derive(Debug, Clone)]
struct Field {
    name: String,
    ty: ScalarType,
    count: usize,
    /// Column of the first value in an ascii line.
    column: usize,
    /// Byte offset of the first value in a binary record.
    offset: usize,
}

#[derive(Debug)]
struct Header {
    fields: Vec<Field>,
    points: usize,
    data: PcdData,
}

impl Header {
    fn field(&self, names: &[&str]) -> Option<&Field> {
        self.fields.iter().find(|f| names.contains(&f.name.as_str()))
    }

    fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size() * f.count).sum()
    }

    fn columns(&self) -> usize {
        self.fields.iter().map(|f| f.count).sum()
    }
}

fn parse_list<T: std::str::FromStr>(key: &str, values: &[&str]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|s| {
            s.parse()
                .map_err(|_| Error::Parse(format!("Invalid {key} entry '{s}'")))
        })
        .collect()
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<Header> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width: usize = 0;
    let mut height: usize = 1;
    let mut points_count: Option<usize> = None;

    let data = loop {
        let line = read_header_line(reader)?
            .ok_or_else(|| Error::Parse("Unexpected EOF in header".to_string()))?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let rest = &parts[1..];

        match parts[0] {
            "FIELDS" => names = rest.iter().map(|s| s.to_string()).collect(),
            "SIZE" => sizes = parse_list("SIZE", rest)?,
            "TYPE" => types = rest.iter().filter_map(|s| s.chars().next()).collect(),
            "COUNT" => counts = parse_list("COUNT", rest)?,
            "WIDTH" => width = parse_list("WIDTH", rest)?.first().copied().unwrap_or(0),
            "HEIGHT" => height = parse_list("HEIGHT", rest)?.first().copied().unwrap_or(1),
            "POINTS" => points_count = parse_list("POINTS", rest)?.first().copied(),
            "DATA" => {
                break match rest.first().copied() {
                    Some("ascii") => PcdData::Ascii,
                    Some("binary") => PcdData::Binary,
                    Some("binary_compressed") => PcdData::BinaryCompressed,
                    other => {
                        return Err(Error::Parse(format!(
                            "Unknown PCD data section {}",
                            other.unwrap_or("<missing>")
                        )))
                    }
                };
            }
            // VERSION and VIEWPOINT do not affect decoding.
            _ => {}
        }
    };

    if names.is_empty() {
        return Err(Error::Parse("PCD header has no FIELDS".to_string()));
    }

    let mut fields = Vec::with_capacity(names.len());
    let (mut column, mut offset) = (0usize, 0usize);
    for (i, name) in names.into_iter().enumerate() {
        let size = sizes.get(i).copied().unwrap_or(4);
        let kind = types.get(i).copied().unwrap_or('F');
        let count = counts.get(i).copied().unwrap_or(1);
        if count == 0 {
            return Err(Error::InvalidData(format!("PCD field '{name}' has COUNT 0")));
        }
        let ty = ScalarType::from_pcd(kind, size)?;
        let next_offset = size
            .checked_mul(count)
            .and_then(|bytes| offset.checked_add(bytes))
            .filter(|&end| end <= MAX_RECORD_BYTES)
            .ok_or_else(|| {
                Error::InvalidData(format!("PCD record exceeds {MAX_RECORD_BYTES} bytes"))
            })?;
        fields.push(Field {
            name,
            ty,
            count,
            column,
            offset,
        });
        column += count;
        offset = next_offset;
    }

    Ok(Header {
        fields,
        points: points_count.unwrap_or(width * height),
        data,
    })
}

/// Field lookups resolved once per file.
struct Layout<'a> {
    xyz: [&'a Field; 3],
    normals: Option<[&'a Field; 3]>,
    packed_rgb: Option<&'a Field>,
    rgb: Option<[&'a Field; 3]>,
}

impl<'a> Layout<'a> {
    fn new(header: &'a Header) -> Result<Self> {
        let axis = |name: &str| {
            header.field(&[name]).ok_or_else(|| {
                Error::InvalidData(format!("PCD file has no '{name}' field"))
            })
        };
        let xyz = [axis("x")?, axis("y")?, axis("z")?];

        let normals = match (
            header.field(&["normal_x", "nx"]),
            header.field(&["normal_y", "ny"]),
            header.field(&["normal_z", "nz"]),
        ) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        };
        let packed_rgb = header.field(&["rgb", "rgba"]);
        let rgb = match (
            header.field(&["r"]),
            header.field(&["g"]),
            header.field(&["b"]),
        ) {
            (Some(r), Some(g), Some(b)) if packed_rgb.is_none() => Some([r, g, b]),
            _ => None,
        };

        Ok(Self {
            xyz,
            normals,
            packed_rgb,
            rgb,
        })
    }

    fn has_colors(&self) -> bool {
        self.packed_rgb.is_some() || self.rgb.is_some()
    }
}

fn unpack_rgb(packed: u32) -> Point3<f64> {
    Point3::new(
        ((packed >> 16) & 0xFF) as f64 / 255.0,
        ((packed >> 8) & 0xFF) as f64 / 255.0,
        (packed & 0xFF) as f64 / 255.0,
    )
}

fn channel(field: &Field, value: f64) -> f64 {
    if field.ty.is_float() {
        value
    } else {
        value / 255.0
    }
}

struct Builder {
    points: Vec<Point3<f64>>,
    normals: Option<Vec<Vector3<f64>>>,
    colors: Option<Vec<Point3<f64>>>,
}

impl Builder {
    fn new(layout: &Layout, points: usize) -> Self {
        let capacity = capacity_hint(points);
        Self {
            points: Vec::with_capacity(capacity),
            normals: layout.normals.map(|_| Vec::with_capacity(capacity)),
            colors: layout
                .has_colors()
                .then(|| Vec::with_capacity(capacity)),
        }
    }

    /// Adds one point. `value` reads a field's first value, `packed` its raw
    /// 32 bits.
    fn push(
        &mut self,
        layout: &Layout,
        value: impl Fn(&Field) -> f64,
        packed: impl Fn(&Field) -> u32,
    ) {
        let [x, y, z] = layout.xyz;
        self.points.push(Point3::new(value(x), value(y), value(z)));

        if let (Some([nx, ny, nz]), Some(normals)) = (layout.normals, self.normals.as_mut()) {
            normals.push(Vector3::new(value(nx), value(ny), value(nz)));
        }

        if let Some(colors) = self.colors.as_mut() {
            if let Some(field) = layout.packed_rgb {
                colors.push(unpack_rgb(packed(field)));
            } else if let Some([r, g, b]) = layout.rgb {
                colors.push(Point3::new(
                    channel(r, value(r)),
                    channel(g, value(g)),
                    channel(b, value(b)),
                ));
            }
        }
    }

    fn finish(self) -> PointCloud {
        PointCloud {
            points: self.points,
            colors: self.colors,
            normals: self.normals,
        }
    }
}

/// Read a PCD file
pub fn read_pcd<R: BufRead>(mut reader: R) -> Result<PointCloud> {
    let header = parse_header(&mut reader)?;
    let layout = Layout::new(&header)?;

    match header.data {
        PcdData::Ascii => parse_pcd_ascii(reader, &header, &layout),
        PcdData::Binary => parse_pcd_binary(reader, &header, &layout),
        PcdData::BinaryCompressed => Err(Error::InvalidData(
            "binary_compressed PCD data is not supported".to_string(),
        )),
    }
}

fn parse_pcd_ascii<R: BufRead>(reader: R, header: &Header, layout: &Layout) -> Result<PointCloud> {
    let mut builder = Builder::new(layout, header.points);
    let columns = header.columns();

    for line in reader.lines() {
        if builder.points.len() >= header.points {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<f64> = line
            .split_whitespace()
            .map(|s| {
                s.parse()
                    .map_err(|_| Error::Parse(format!("Invalid number: {s}")))
            })
            .collect::<Result<_>>()?;
        if values.len() < columns {
            return Err(Error::InvalidData(format!(
                "Point {} has {} values, expected {columns}",
                builder.points.len(),
                values.len()
            )));
        }

        builder.push(
            layout,
            |f| values[f.column],
            |f| {
                let v = values[f.column];
                if f.ty.is_float() {
                    (v as f32).to_bits()
                } else {
                    v as u32
                }
            },
        );
    }

    if builder.points.len() < header.points {
        return Err(Error::InvalidData(format!(
            "Expected {} points, found {}",
            header.points,
            builder.points.len()
        )));
    }
    Ok(builder.finish())
}

fn parse_pcd_binary<R: Read>(mut reader: R, header: &Header, layout: &Layout) -> Result<PointCloud> {
    let mut builder = Builder::new(layout, header.points);
    let mut record = vec![0u8; header.record_size()];

    for _ in 0..header.points {
        reader.read_exact(&mut record)?;
        builder.push(
            layout,
            |f| f.ty.decode(&record[f.offset..], ByteOrder::Little),
            |f| {
                let mut raw = [0u8; 4];
                let end = (f.offset + 4).min(record.len());
                raw[..end - f.offset].copy_from_slice(&record[f.offset..end]);
                u32::from_le_bytes(raw)
            },
        );
    }

    Ok(builder.finish())
}
