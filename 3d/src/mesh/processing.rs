//! Mesh Processing Operations
//!
//! Implements:
//! - Quantiles over per-vertex attributes
//! - Low-density vertex pruning

use super::TriangleMesh;
use cindir_core::{Error, Result};

/// Quantile `q` of `values` with linear interpolation between order statistics.
///
/// Returns `None` for an empty slice or `q` outside `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Removes vertices whose density falls below the `q` quantile of all densities.
///
/// Faces touching a removed vertex go with it. Returns the number of removed
/// vertices.
pub fn remove_low_density_vertices(mesh: &mut TriangleMesh, q: f64) -> Result<usize> {
    if !(0.0..=1.0).contains(&q) {
        return Err(Error::InvalidParameter(format!(
            "density quantile must be within [0, 1], got {q}"
        )));
    }
    let densities = mesh
        .densities
        .as_ref()
        .ok_or(Error::MissingPrerequisite {
            stage: "remove_low_density_vertices",
            requirement: "vertex densities",
        })?;

    let Some(threshold) = quantile(densities, q) else {
        return Ok(0);
    };

    let mask: Vec<bool> = densities.iter().map(|&d| d < threshold).collect();
    let removed = mask.iter().filter(|&&m| m).count();
    mesh.remove_vertices_by_mask(&mask)?;

    tracing::debug!(threshold, removed, "pruned low density vertices");
    Ok(removed)
}
