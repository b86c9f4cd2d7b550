//! Fixed-size scalar types shared by the binary PLY and PCD readers.

use crate::{Error, Result};
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// PLY type names, both the classic and the sized spellings.
    pub fn from_ply_name(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => return Err(Error::Parse(format!("Unknown PLY type '{other}'"))),
        })
    }

    /// PCD `TYPE` letter plus `SIZE` in bytes.
    pub fn from_pcd(kind: char, size: usize) -> Result<Self> {
        Ok(match (kind, size) {
            ('I', 1) => Self::I8,
            ('U', 1) => Self::U8,
            ('I', 2) => Self::I16,
            ('U', 2) => Self::U16,
            ('I', 4) => Self::I32,
            ('U', 4) => Self::U32,
            ('I', 8) => Self::I64,
            ('U', 8) => Self::U64,
            ('F', 4) => Self::F32,
            ('F', 8) => Self::F64,
            _ => {
                return Err(Error::Parse(format!(
                    "Unsupported PCD field type {kind} with size {size}"
                )))
            }
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Decodes one value from the start of `bytes`, which must hold at least
    /// [`size`](Self::size) bytes.
    pub fn decode(self, bytes: &[u8], order: ByteOrder) -> f64 {
        macro_rules! num {
            ($t:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                match order {
                    ByteOrder::Little => <$t>::from_le_bytes(raw),
                    ByteOrder::Big => <$t>::from_be_bytes(raw),
                }
            }};
        }

        match self {
            Self::I8 => num!(i8) as f64,
            Self::U8 => num!(u8) as f64,
            Self::I16 => num!(i16) as f64,
            Self::U16 => num!(u16) as f64,
            Self::I32 => num!(i32) as f64,
            Self::U32 => num!(u32) as f64,
            Self::I64 => num!(i64) as f64,
            Self::U64 => num!(u64) as f64,
            Self::F32 => num!(f32) as f64,
            Self::F64 => num!(f64),
        }
    }

    /// Reads and decodes one value from a stream.
    pub fn read<R: Read>(self, reader: &mut R, order: ByteOrder) -> Result<f64> {
        let mut buf = [0u8; 8];
        let slot = &mut buf[..self.size()];
        reader.read_exact(slot)?;
        Ok(self.decode(slot, order))
    }
}

/// Upper bound on the points preallocated from a header count.
///
/// Larger clouds grow while they are read, so a corrupt count ends in a short
/// read error instead of a failed allocation.
pub const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

/// Capacity to reserve for `count` points announced by a file header.
pub fn capacity_hint(count: usize) -> usize {
    count.min(MAX_PREALLOCATED_POINTS)
}

/// Reads one header line as text, without the line terminator.
///
/// Returns `None` at end of input.
pub fn read_header_line<R: std::io::BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8(buf)
        .map_err(|_| Error::Parse("Header is not valid UTF-8".to_string()))?;
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}
