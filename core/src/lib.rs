//! Core types shared by the cindir crates.
//!
//! Holds the [`PointCloud`] container that every processing stage mutates
//! and the workspace-wide [`Error`] type.

pub mod error;
pub mod point_cloud;

pub use error::{Error, Result};
pub use point_cloud::PointCloud;
