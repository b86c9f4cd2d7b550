//! Normal estimation using PCA on hybrid (radius + max_nn) neighborhoods.
//!
//! The sign of each normal is whatever the eigen solver returns. No pass
//! makes orientations agree across neighboring points.

use crate::search::PointIndex;
use crate::NormalEstimationConfig;
use cindir_core::{Error, PointCloud, Result};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rayon::prelude::*;

/// Normal used when a neighborhood is too small to fit a plane.
const DEFAULT_NORMAL: Vector3<f64> = Vector3::new(0.0, 0.0, 1.0);

/// Computes one unit normal per point, in point order.
pub fn compute_normals(
    pc: &PointCloud,
    config: &NormalEstimationConfig,
) -> Result<Vec<Vector3<f64>>> {
    if !config.radius.is_finite() || config.radius <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "radius must be a positive number, got {}",
            config.radius
        )));
    }
    if config.max_nn == 0 {
        return Err(Error::InvalidParameter("max_nn must be >= 1".to_string()));
    }
    if pc.is_empty() {
        return Ok(Vec::new());
    }

    let tree = PointIndex::build(&pc.points);
    tracing::debug!(
        radius = config.radius,
        max_nn = config.max_nn,
        points = pc.len(),
        "estimating normals"
    );

    let normals = pc
        .points
        .par_iter()
        .map(|p| {
            let neighbors = tree.hybrid(p, config.radius, config.max_nn);
            if neighbors.len() < 3 {
                return DEFAULT_NORMAL;
            }

            // Compute centroid
            let mut centroid = Vector3::zeros();
            for &(j, _) in &neighbors {
                centroid += pc.points[j].coords;
            }
            centroid /= neighbors.len() as f64;

            // Compute covariance matrix
            let mut cov = Matrix3::zeros();
            for &(j, _) in &neighbors {
                let d = pc.points[j].coords - centroid;
                cov += d * d.transpose();
            }
            cov /= neighbors.len() as f64;

            plane_normal(cov)
        })
        .collect();

    Ok(normals)
}

/// Estimate normals and store them on the cloud.
///
/// The cloud is left untouched when the parameters are rejected.
pub fn estimate_normals(pc: &mut PointCloud, config: &NormalEstimationConfig) -> Result<()> {
    let normals = compute_normals(pc, config)?;
    pc.normals = Some(normals);
    Ok(())
}

/// Eigenvector of the smallest eigenvalue, normalized.
fn plane_normal(cov: Matrix3<f64>) -> Vector3<f64> {
    let eigen = SymmetricEigen::new(cov);

    // Find index of smallest eigenvalue explicitly to be robust
    let mut min_val = f64::MAX;
    let mut min_idx = 0;
    for i in 0..3 {
        let val = eigen.eigenvalues[i];
        if val < min_val {
            min_val = val;
            min_idx = i;
        }
    }

    let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
    let norm = normal.norm();
    if norm > 1e-12 && norm.is_finite() {
        normal / norm
    } else {
        DEFAULT_NORMAL
    }
}
