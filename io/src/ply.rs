//! PLY (Polygon File Format) I/O
//!
//! PLY is a flexible format for storing 3D data with arbitrary properties.
//! Reading supports the ascii and both binary encodings. Only the `vertex`
//! element is decoded; elements before it are skipped and elements after it
//! are ignored.

use crate::scalar::{capacity_hint, read_header_line, ByteOrder, ScalarType};
use crate::{Error, Result};
use cindir_3d::TriangleMesh;
use cindir_core::PointCloud;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Encoding used when writing PLY files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlyEncoding {
    Ascii,
    #[default]
    BinaryLittleEndian,
}

impl PlyEncoding {
    fn header_name(self) -> &'static str {
        match self {
            PlyEncoding::Ascii => "ascii",
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    Binary(ByteOrder),
}

#[derive(Debug, Clone)]
enum Property {
    Scalar {
        name: String,
        ty: ScalarType,
    },
    List {
        count_ty: ScalarType,
        item_ty: ScalarType,
    },
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

impl Element {
    fn scalar(&self, wanted: &str) -> Option<(usize, ScalarType)> {
        self.properties.iter().enumerate().find_map(|(i, p)| match p {
            Property::Scalar { name, ty } if name == wanted => Some((i, *ty)),
            _ => None,
        })
    }

    fn triple(&self, names: [&str; 3]) -> Option<[(usize, ScalarType); 3]> {
        Some([
            self.scalar(names[0])?,
            self.scalar(names[1])?,
            self.scalar(names[2])?,
        ])
    }
}

struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<Header> {
    let eof = || Error::Parse("Unexpected EOF in header".to_string());

    let magic = read_header_line(reader)?.ok_or_else(eof)?;
    if magic.trim() != "ply" {
        return Err(Error::Parse("Missing 'ply' magic line".to_string()));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();

    loop {
        let line = read_header_line(reader)?.ok_or_else(eof)?;
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            ["end_header"] => break,
            ["format", kind, _version] => {
                encoding = Some(match *kind {
                    "ascii" => Encoding::Ascii,
                    "binary_little_endian" => Encoding::Binary(ByteOrder::Little),
                    "binary_big_endian" => Encoding::Binary(ByteOrder::Big),
                    other => {
                        return Err(Error::Parse(format!("Unknown PLY format '{other}'")))
                    }
                });
            }
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| Error::Parse(format!("Invalid element count '{count}'")))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count_ty, item_ty, _name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::Parse("Property before any element".to_string()))?;
                element.properties.push(Property::List {
                    count_ty: ScalarType::from_ply_name(count_ty)?,
                    item_ty: ScalarType::from_ply_name(item_ty)?,
                });
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::Parse("Property before any element".to_string()))?;
                element.properties.push(Property::Scalar {
                    name: name.to_string(),
                    ty: ScalarType::from_ply_name(ty)?,
                });
            }
            ["comment", ..] | ["obj_info", ..] | [] => {}
            _ => return Err(Error::Parse(format!("Invalid header line '{line}'"))),
        }
    }

    let encoding = encoding.ok_or_else(|| Error::Parse("Missing format line".to_string()))?;
    Ok(Header { encoding, elements })
}

/// Scalar values of one element instance, in property order. List properties
/// are consumed and left as NaN.
fn read_record<R: BufRead>(
    reader: &mut R,
    encoding: Encoding,
    element: &Element,
    line_buf: &mut String,
    out: &mut Vec<f64>,
) -> Result<()> {
    out.clear();
    match encoding {
        Encoding::Binary(order) => {
            for property in &element.properties {
                match property {
                    Property::Scalar { ty, .. } => out.push(ty.read(reader, order)?),
                    Property::List { count_ty, item_ty } => {
                        let n = count_ty.read(reader, order)? as usize;
                        for _ in 0..n {
                            item_ty.read(reader, order)?;
                        }
                        out.push(f64::NAN);
                    }
                }
            }
        }
        Encoding::Ascii => {
            line_buf.clear();
            if reader.read_line(line_buf)? == 0 {
                return Err(Error::Parse(format!(
                    "Unexpected EOF in '{}' data",
                    element.name
                )));
            }
            let mut tokens = line_buf.split_whitespace();
            let mut next = || -> Result<f64> {
                let token = tokens.next().ok_or_else(|| {
                    Error::InvalidData(format!("Not enough values for '{}'", element.name))
                })?;
                token
                    .parse()
                    .map_err(|_| Error::Parse(format!("Invalid number: {token}")))
            };
            for property in &element.properties {
                match property {
                    Property::Scalar { .. } => out.push(next()?),
                    Property::List { .. } => {
                        let n = next()? as usize;
                        for _ in 0..n {
                            next()?;
                        }
                        out.push(f64::NAN);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Read a PLY point cloud from a reader
///
/// `x y z` are required. `nx ny nz` and `red green blue` are read when all
/// three are present. Integer colors are scaled from 0-255, float colors are
/// taken as-is.
pub fn read_ply<R: BufRead>(mut reader: R) -> Result<PointCloud> {
    let header = parse_header(&mut reader)?;
    let mut line_buf = String::new();
    let mut values = Vec::new();

    for element in &header.elements {
        if element.name != "vertex" {
            for _ in 0..element.count {
                read_record(&mut reader, header.encoding, element, &mut line_buf, &mut values)?;
            }
            continue;
        }

        let xyz = element.triple(["x", "y", "z"]).ok_or_else(|| {
            Error::InvalidData("PLY vertex element has no x/y/z properties".to_string())
        })?;
        let nxyz = element.triple(["nx", "ny", "nz"]);
        let rgb = element.triple(["red", "green", "blue"]);

        let capacity = capacity_hint(element.count);
        let mut points = Vec::with_capacity(capacity);
        let mut normals = nxyz.map(|_| Vec::with_capacity(capacity));
        let mut colors = rgb.map(|_| Vec::with_capacity(capacity));

        for _ in 0..element.count {
            read_record(&mut reader, header.encoding, element, &mut line_buf, &mut values)?;

            points.push(Point3::new(values[xyz[0].0], values[xyz[1].0], values[xyz[2].0]));
            if let (Some(idx), Some(normals)) = (&nxyz, normals.as_mut()) {
                normals.push(Vector3::new(values[idx[0].0], values[idx[1].0], values[idx[2].0]));
            }
            if let (Some(idx), Some(colors)) = (&rgb, colors.as_mut()) {
                let channel = |(i, ty): (usize, ScalarType)| {
                    if ty.is_float() {
                        values[i]
                    } else {
                        values[i] / 255.0
                    }
                };
                colors.push(Point3::new(channel(idx[0]), channel(idx[1]), channel(idx[2])));
            }
        }

        return Ok(PointCloud {
            points,
            colors,
            normals,
        });
    }

    Err(Error::InvalidData("PLY file has no vertex element".to_string()))
}

fn color_byte(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn write_header<W: Write>(
    writer: &mut W,
    encoding: PlyEncoding,
    vertices: usize,
    has_normals: bool,
    has_colors: bool,
    faces: Option<usize>,
) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format {} 1.0", encoding.header_name())?;
    writeln!(writer, "element vertex {vertices}")?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;

    if has_normals {
        writeln!(writer, "property double nx")?;
        writeln!(writer, "property double ny")?;
        writeln!(writer, "property double nz")?;
    }

    if has_colors {
        writeln!(writer, "property uchar red")?;
        writeln!(writer, "property uchar green")?;
        writeln!(writer, "property uchar blue")?;
    }

    if let Some(faces) = faces {
        writeln!(writer, "element face {faces}")?;
        writeln!(writer, "property list uchar int vertex_indices")?;
    }

    writeln!(writer, "end_header")?;
    Ok(())
}

fn write_vertex<W: Write>(
    writer: &mut W,
    encoding: PlyEncoding,
    p: &Point3<f64>,
    normal: Option<&Vector3<f64>>,
    color: Option<&Point3<f64>>,
) -> Result<()> {
    match encoding {
        PlyEncoding::Ascii => {
            write!(writer, "{} {} {}", p.x, p.y, p.z)?;
            if let Some(n) = normal {
                write!(writer, " {} {} {}", n.x, n.y, n.z)?;
            }
            if let Some(c) = color {
                write!(
                    writer,
                    " {} {} {}",
                    color_byte(c.x),
                    color_byte(c.y),
                    color_byte(c.z)
                )?;
            }
            writeln!(writer)?;
        }
        PlyEncoding::BinaryLittleEndian => {
            for v in p.iter() {
                writer.write_all(&v.to_le_bytes())?;
            }
            if let Some(n) = normal {
                for v in n.iter() {
                    writer.write_all(&v.to_le_bytes())?;
                }
            }
            if let Some(c) = color {
                writer.write_all(&[color_byte(c.x), color_byte(c.y), color_byte(c.z)])?;
            }
        }
    }
    Ok(())
}

/// Write a point cloud to PLY format
pub fn write_ply<W: Write>(writer: &mut W, cloud: &PointCloud, encoding: PlyEncoding) -> Result<()> {
    cloud.validate()?;
    write_header(
        writer,
        encoding,
        cloud.len(),
        cloud.has_normals(),
        cloud.has_colors(),
        None,
    )?;

    for (i, p) in cloud.points.iter().enumerate() {
        let normal = cloud.normals.as_ref().map(|n| &n[i]);
        let color = cloud.colors.as_ref().map(|c| &c[i]);
        write_vertex(writer, encoding, p, normal, color)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a triangle mesh to PLY format
///
/// Vertices carry normals when the mesh has them. Faces are written as
/// `property list uchar int vertex_indices`.
pub fn write_mesh_ply<W: Write>(
    writer: &mut W,
    mesh: &TriangleMesh,
    encoding: PlyEncoding,
) -> Result<()> {
    mesh.validate()?;
    if mesh.num_vertices() > i32::MAX as usize {
        return Err(Error::InvalidData(format!(
            "{} vertices do not fit PLY int indices",
            mesh.num_vertices()
        )));
    }

    write_header(
        writer,
        encoding,
        mesh.num_vertices(),
        mesh.normals.is_some(),
        false,
        Some(mesh.num_faces()),
    )?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        let normal = mesh.normals.as_ref().map(|n| &n[i]);
        write_vertex(writer, encoding, v, normal, None)?;
    }

    for face in &mesh.faces {
        match encoding {
            PlyEncoding::Ascii => writeln!(writer, "3 {} {} {}", face[0], face[1], face[2])?,
            PlyEncoding::BinaryLittleEndian => {
                writer.write_all(&[3u8])?;
                for &idx in face {
                    writer.write_all(&(idx as i32).to_le_bytes())?;
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}
