//! Point cloud filtering operations
//!
//! - Statistical outlier removal
//! - Voxel downsampling

use crate::search::PointIndex;
use crate::{StatisticalOutlierConfig, VoxelDownsampleConfig};
use cindir_core::{Error, PointCloud, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

/// Remove statistical outliers.
///
/// Every point gets the mean distance to its `nb_neighbors` nearest neighbors.
/// Points whose mean exceeds `global_mean + std_ratio * global_std` are
/// dropped. Returns the filtered cloud and the indices of the kept points.
pub fn remove_statistical_outliers(
    pc: &PointCloud,
    config: &StatisticalOutlierConfig,
) -> Result<(PointCloud, Vec<usize>)> {
    if config.nb_neighbors == 0 {
        return Err(Error::InvalidParameter(
            "nb_neighbors must be >= 1".to_string(),
        ));
    }
    if !config.std_ratio.is_finite() || config.std_ratio <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "std_ratio must be a positive number, got {}",
            config.std_ratio
        )));
    }
    if pc.is_empty() {
        return Ok((pc.clone(), Vec::new()));
    }

    let index = PointIndex::build(&pc.points);
    let k = config.nb_neighbors;

    let distances: Vec<f64> = pc
        .points
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let neighbors = index.knn_excluding(i, p, k);
            if neighbors.is_empty() {
                0.0
            } else {
                neighbors.iter().map(|(_, d)| d).sum::<f64>() / neighbors.len() as f64
            }
        })
        .collect();

    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let std_dev = if distances.len() > 1 {
        let sq_sum: f64 = distances.iter().map(|d| (d - mean) * (d - mean)).sum();
        (sq_sum / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    let threshold = mean + config.std_ratio * std_dev;
    // absorbs summation rounding when every distance is identical
    let threshold = threshold + threshold.abs() * 1e-12;

    let inliers: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= threshold)
        .map(|(i, _)| i)
        .collect();

    tracing::debug!(
        mean,
        std_dev,
        threshold,
        removed = pc.len() - inliers.len(),
        "statistical outlier removal"
    );

    Ok((pc.select_by_index(&inliers), inliers))
}

/// Downsample a point cloud with a voxel grid.
///
/// The grid is anchored at the cloud's minimum bound, so a voxel larger than
/// the bounding box always yields a single point. Returns one point per
/// occupied voxel (the centroid), with colors averaged and normals averaged
/// then renormalized.
pub fn voxel_down_sample(pc: &PointCloud, config: &VoxelDownsampleConfig) -> Result<PointCloud> {
    let voxel_size = config.voxel_size;
    if !voxel_size.is_finite() || voxel_size <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "voxel_size must be a positive number, got {voxel_size}"
        )));
    }

    let Some((min_bound, _)) = pc.bounds() else {
        return Ok(pc.clone());
    };

    let n = pc.len();
    let mut indices: Vec<(i64, i64, i64, usize)> = pc
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let d = (p - min_bound) / voxel_size;
            (
                d.x.floor() as i64,
                d.y.floor() as i64,
                d.z.floor() as i64,
                i,
            )
        })
        .collect();

    // Sort by voxel key; parallel sort if large enough
    if n > 10000 {
        indices.par_sort_unstable_by_key(|&(x, y, z, _)| (x, y, z));
    } else {
        indices.sort_unstable_by_key(|&(x, y, z, _)| (x, y, z));
    }

    let mut new_points = Vec::new();
    let mut new_colors = pc.colors.as_ref().map(|_| Vec::new());
    let mut new_normals = pc.normals.as_ref().map(|_| Vec::new());

    for group in indices.chunk_by(|a, b| (a.0, a.1, a.2) == (b.0, b.1, b.2)) {
        let factor = 1.0 / group.len() as f64;

        let sum_p = group
            .iter()
            .fold(Vector3::zeros(), |acc, &(_, _, _, i)| acc + pc.points[i].coords);
        new_points.push(Point3::from(sum_p * factor));

        if let (Some(out), Some(colors)) = (&mut new_colors, &pc.colors) {
            let sum_c = group
                .iter()
                .fold(Vector3::zeros(), |acc, &(_, _, _, i)| acc + colors[i].coords);
            out.push(Point3::from(sum_c * factor));
        }
        if let (Some(out), Some(normals)) = (&mut new_normals, &pc.normals) {
            let mut sum_n = group
                .iter()
                .fold(Vector3::zeros(), |acc, &(_, _, _, i)| acc + normals[i]);
            if sum_n.norm_squared() > 1e-12 {
                sum_n.normalize_mut();
            }
            out.push(sum_n);
        }
    }

    Ok(PointCloud {
        points: new_points,
        colors: new_colors,
        normals: new_normals,
    })
}
