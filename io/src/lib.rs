//! 3D File I/O Module
//!
//! Reads point clouds from:
//! - LAS / LAZ (through the `las` crate)
//! - PLY (ascii, binary little and big endian)
//! - PCD (Point Cloud Data - PCL format, ascii and binary)
//! - XYZ (plain text)
//!
//! and writes point clouds and triangle meshes as PLY.

pub mod format;
pub mod las;
pub mod pcd;
pub mod ply;
pub mod scalar;
pub mod xyz;

pub use format::{read_point_cloud, write_mesh_file, write_point_cloud_file, PointCloudFormat};
pub use pcd::{read_pcd, PcdData};
pub use ply::{read_ply, write_mesh_ply, write_ply, PlyEncoding};
pub use xyz::read_xyz;

pub use cindir_core::{Error, Result};
