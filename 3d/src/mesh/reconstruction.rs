//! Poisson Surface Reconstruction from Oriented Point Clouds
//!
//! The normals are splatted onto a regular lattice covering the scaled bounding
//! cube of the samples. The indicator function `chi` solves `lap(chi) = div(V)`
//! with `chi = 0` on the lattice boundary. Its level set through the samples
//! is the surface.

use super::isosurface::marching_tetrahedra;
use super::TriangleMesh;
use crate::spatial::RegularGrid;
use cindir_core::{Error, PointCloud, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rstar::RTree;
use serde::{Deserialize, Serialize};

/// Deepest lattice the solver will build, `2^7` cells per axis.
pub const MAX_DEPTH: usize = 7;

/// Empty cells kept between the scaled bounding cube and the Dirichlet boundary.
const PAD: usize = 2;

/// Parameters of [`poisson_reconstruction`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonConfig {
    /// The lattice has `2^depth` cells per axis, clamped to [`MAX_DEPTH`].
    pub depth: usize,
    /// Finest cell width. Only consulted when no depth is given, so it is
    /// validated and otherwise unused.
    pub width: f64,
    /// Ratio between the reconstruction cube and the samples' bounding cube.
    pub scale: f64,
    pub max_iterations: usize,
    /// Relative residual at which conjugate gradients stops.
    pub tolerance: f64,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        Self {
            depth: 8,
            width: 0.1,
            scale: 1.1,
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

impl PoissonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidParameter("depth must be >= 1".to_string()));
        }
        if !self.width.is_finite() || self.width < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "width must be >= 0, got {}",
                self.width
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidParameter(
                "max_iterations must be >= 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Depth actually used by the solver.
    pub fn effective_depth(&self) -> usize {
        self.depth.min(MAX_DEPTH)
    }
}

/// Poisson Surface Reconstruction
///
/// Returns a mesh with per-vertex normals and per-vertex densities. The
/// density of a vertex is the smoothed sample weight around it plus a term
/// that decays with the distance to the nearest sample. It is strictly
/// positive, and extrapolated vertices far from every sample get the lowest
/// values.
pub fn poisson_reconstruction(cloud: &PointCloud, config: &PoissonConfig) -> Result<TriangleMesh> {
    config.validate()?;
    let normals = cloud.normals.as_ref().ok_or(Error::MissingPrerequisite {
        stage: "poisson_reconstruction",
        requirement: "point normals",
    })?;
    cloud.validate()?;

    let (min, max) = cloud
        .bounds()
        .ok_or_else(|| Error::InvalidInput("cannot reconstruct an empty point cloud".to_string()))?;
    let extent = (max - min).max();
    if !extent.is_finite() || extent <= f64::EPSILON {
        return Err(Error::InvalidInput(
            "points span no volume, nothing to reconstruct".to_string(),
        ));
    }

    let depth = config.effective_depth();
    if depth < config.depth {
        tracing::debug!(
            requested = config.depth,
            used = depth,
            "poisson depth clamped"
        );
    }

    let cells = 1usize << depth;
    let cube = extent * config.scale;
    let spacing = cube / cells as f64;
    let center = nalgebra::center(&min, &max);
    let half = cube / 2.0 + PAD as f64 * spacing;
    let nodes = cells + 1 + 2 * PAD;
    let grid = RegularGrid::new(
        center - Vector3::repeat(half),
        spacing,
        [nodes, nodes, nodes],
    );

    let (field, weights) = splat_normals(&grid, &cloud.points, normals);
    let rhs = divergence(&grid, &field);
    let chi = solve_poisson(&grid, &rhs, config.max_iterations, config.tolerance);

    let samples: Vec<f64> = cloud
        .points
        .iter()
        .filter_map(|p| grid.sample(&chi, p))
        .collect();
    let iso = samples.iter().sum::<f64>() / samples.len().max(1) as f64;

    let surface = marching_tetrahedra(&grid, &chi, iso);
    let densities = vertex_densities(
        surface.interpolate(&weights),
        &surface.vertices,
        &cloud.points,
        spacing,
    );
    let mut mesh = TriangleMesh::with_vertices_and_faces(surface.vertices, surface.faces);
    mesh.densities = Some(densities);
    mesh.compute_vertex_normals();

    tracing::debug!(
        depth,
        iso,
        vertices = mesh.num_vertices(),
        faces = mesh.num_faces(),
        "poisson surface extracted"
    );
    Ok(mesh)
}

/// Smoothed normal field (one lattice vector per axis) and sample weights.
fn splat_normals(
    grid: &RegularGrid,
    points: &[Point3<f64>],
    normals: &[Vector3<f64>],
) -> ([Vec<f64>; 3], Vec<f64>) {
    let n = grid.node_count();
    let mut field = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
    let mut weights = vec![0.0; n];

    for (p, normal) in points.iter().zip(normals) {
        let Some(stencil) = grid.trilinear(p) else {
            continue;
        };
        for (idx, w) in stencil {
            for axis in 0..3 {
                field[axis][idx] += w * normal[axis];
            }
            weights[idx] += w;
        }
    }

    for component in field.iter_mut() {
        grid.smooth(component);
    }
    grid.smooth(&mut weights);
    (field, weights)
}

/// Adds `exp(-d / h)` to each splat weight, `d` being the distance from the
/// vertex to its nearest sample and `h` the lattice spacing.
///
/// The splat has compact support, so on its own it is exactly zero a few cells
/// away from the samples and cannot order the extrapolated vertices.
fn vertex_densities(
    weights: Vec<f64>,
    vertices: &[Point3<f64>],
    samples: &[Point3<f64>],
    spacing: f64,
) -> Vec<f64> {
    let tree = RTree::bulk_load(samples.iter().map(|p| [p.x, p.y, p.z]).collect());

    vertices
        .par_iter()
        .zip(weights)
        .map(|(v, w)| {
            let falloff = tree
                .nearest_neighbor_iter_with_distance_2(&[v.x, v.y, v.z])
                .next()
                .map_or(0.0, |(_, d2)| (-d2.sqrt() / spacing).exp());
            w.max(0.0) + falloff
        })
        .collect()
}

/// Right-hand side of the discrete system `6 chi - sum(neighbors) = b`.
///
/// `b = -h^2 div(V)`, with the divergence taken by central differences.
/// Boundary nodes are zero.
fn divergence(grid: &RegularGrid, field: &[Vec<f64>; 3]) -> Vec<f64> {
    let [nx, ny, _] = grid.dims();
    let strides = [1, nx, nx * ny];
    let h = grid.spacing();

    (0..grid.node_count())
        .into_par_iter()
        .map(|idx| {
            let (i, j, k) = grid.coords(idx);
            if grid.is_boundary(i, j, k) {
                return 0.0;
            }
            let diff: f64 = (0..3)
                .map(|axis| field[axis][idx + strides[axis]] - field[axis][idx - strides[axis]])
                .sum();
            -0.5 * h * diff
        })
        .collect()
}

/// Seven point Laplacian with Dirichlet rows on the boundary.
fn apply_laplacian(grid: &RegularGrid, x: &[f64], out: &mut [f64]) {
    let [nx, ny, _] = grid.dims();
    let sy = nx;
    let sz = nx * ny;

    out.par_iter_mut().enumerate().for_each(|(idx, o)| {
        let (i, j, k) = grid.coords(idx);
        *o = if grid.is_boundary(i, j, k) {
            x[idx]
        } else {
            6.0 * x[idx]
                - x[idx - 1]
                - x[idx + 1]
                - x[idx - sy]
                - x[idx + sy]
                - x[idx - sz]
                - x[idx + sz]
        };
    });
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.par_iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Conjugate gradients from a zero start.
fn solve_poisson(grid: &RegularGrid, b: &[f64], max_iterations: usize, tolerance: f64) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut ap = vec![0.0; n];

    let mut rs = dot(&r, &r);
    let b_norm = rs.sqrt();
    if b_norm == 0.0 {
        return x;
    }

    for iteration in 0..max_iterations {
        apply_laplacian(grid, &p, &mut ap);
        let pap = dot(&p, &ap);
        if pap <= 0.0 {
            break;
        }
        let alpha = rs / pap;

        x.par_iter_mut()
            .zip(&p)
            .for_each(|(xi, pi)| *xi += alpha * pi);
        r.par_iter_mut()
            .zip(&ap)
            .for_each(|(ri, api)| *ri -= alpha * api);

        let rs_new = dot(&r, &r);
        let residual = rs_new.sqrt() / b_norm;
        if residual <= tolerance {
            tracing::debug!(iterations = iteration + 1, residual, "poisson solve converged");
            return x;
        }

        let beta = rs_new / rs;
        p.par_iter_mut()
            .zip(&r)
            .for_each(|(pi, ri)| *pi = ri + beta * *pi);
        rs = rs_new;
    }

    tracing::warn!(
        max_iterations,
        residual = rs.sqrt() / b_norm,
        "poisson solve stopped before reaching tolerance"
    );
    x
}

/// Create a sphere point cloud with outward normals for testing
pub fn create_sphere_point_cloud(
    center: Point3<f64>,
    radius: f64,
    num_points: usize,
) -> PointCloud {
    let mut points = Vec::with_capacity(num_points);
    let mut normals = Vec::with_capacity(num_points);

    let phi = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());

    for i in 0..num_points {
        let y = 1.0 - (i as f64 / (num_points - 1).max(1) as f64) * 2.0;
        let radius_at_y = (1.0 - y * y).max(0.0).sqrt();
        let theta = phi * i as f64;

        let dir = Vector3::new(theta.cos() * radius_at_y, y, theta.sin() * radius_at_y);
        points.push(center + radius * dir);
        normals.push(dir.normalize());
    }

    PointCloud {
        points,
        normals: Some(normals),
        colors: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::processing::remove_low_density_vertices;

    fn sphere_config() -> PoissonConfig {
        PoissonConfig {
            depth: 5,
            ..PoissonConfig::default()
        }
    }

    #[test]
    fn test_create_sphere_point_cloud() {
        let cloud = create_sphere_point_cloud(Point3::new(1.0, 2.0, 3.0), 2.0, 100);
        assert_eq!(cloud.points.len(), 100);
        for (p, n) in cloud.points.iter().zip(cloud.normals.as_ref().unwrap()) {
            assert!(((p - Point3::new(1.0, 2.0, 3.0)).norm() - 2.0).abs() < 1e-9);
            assert!((n.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_poisson_sphere() {
        let cloud = create_sphere_point_cloud(Point3::origin(), 1.0, 2000);
        let mesh = poisson_reconstruction(&cloud, &sphere_config()).unwrap();

        assert!(mesh.num_faces() > 0);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.densities.as_ref().unwrap().len(), mesh.num_vertices());

        let mean_radius = mesh
            .vertices
            .iter()
            .map(|v| v.coords.norm())
            .sum::<f64>()
            / mesh.num_vertices() as f64;
        assert!(mean_radius > 0.8 && mean_radius < 1.2, "{mean_radius}");

        let normals = mesh.normals.as_ref().unwrap();
        let outward = mesh
            .vertices
            .iter()
            .zip(normals)
            .filter(|(v, n)| n.dot(&v.coords) > 0.0)
            .count();
        assert!(outward as f64 > 0.95 * mesh.num_vertices() as f64);
    }

    #[test]
    fn test_pruning_reconstructed_sphere() {
        let cloud = create_sphere_point_cloud(Point3::new(3.0, -1.0, 0.5), 0.5, 1500);
        let mut mesh = poisson_reconstruction(&cloud, &sphere_config()).unwrap();
        let before = mesh.num_vertices();

        remove_low_density_vertices(&mut mesh, 0.1).unwrap();
        assert!(mesh.num_vertices() <= before);
        assert!(mesh.num_vertices() > 0);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_densities_fall_off_away_from_samples() {
        let samples = [Point3::origin()];
        let vertices = [
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 30.0),
        ];
        let densities = vertex_densities(vec![0.0; 3], &vertices, &samples, 0.25);

        assert!(densities.iter().all(|&d| d > 0.0), "{densities:?}");
        assert!(densities[0] > densities[1] && densities[1] > densities[2]);

        // Splat weight adds on top of the falloff.
        let weighted = vertex_densities(vec![1.0, 0.0, 0.0], &vertices, &samples, 0.25);
        assert!((weighted[0] - densities[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_poisson_without_normals() {
        let cloud = PointCloud::new(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        let err = poisson_reconstruction(&cloud, &sphere_config()).unwrap_err();
        assert!(matches!(err, Error::MissingPrerequisite { .. }));
        assert_eq!(err.to_string(), "Stage 'poisson_reconstruction' requires point normals");
    }

    #[test]
    fn test_poisson_rejects_bad_config() {
        let cloud = create_sphere_point_cloud(Point3::origin(), 1.0, 10);
        for config in [
            PoissonConfig { depth: 0, ..sphere_config() },
            PoissonConfig { width: -1.0, ..sphere_config() },
            PoissonConfig { scale: 0.0, ..sphere_config() },
        ] {
            assert!(matches!(
                poisson_reconstruction(&cloud, &config),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_depth_is_clamped() {
        let config = PoissonConfig::default();
        assert_eq!(config.effective_depth(), MAX_DEPTH);
        assert_eq!(sphere_config().effective_depth(), 5);
    }

    #[test]
    fn test_degenerate_cloud() {
        let cloud = PointCloud::new(vec![Point3::new(1.0, 1.0, 1.0); 3])
            .with_normals(vec![Vector3::z(); 3])
            .unwrap();
        assert!(matches!(
            poisson_reconstruction(&cloud, &sphere_config()),
            Err(Error::InvalidInput(_))
        ));
    }
}
