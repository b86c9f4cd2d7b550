//! Regular lattice used to discretize implicit functions.

use nalgebra::{Point3, Vector3};

/// Axis-aligned lattice of nodes with uniform spacing.
///
/// Node `(i, j, k)` sits at `origin + spacing * (i, j, k)` and is stored at
/// linear index `i + nx * (j + ny * k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    origin: Point3<f64>,
    spacing: f64,
    dims: [usize; 3],
}

impl RegularGrid {
    /// Grid of `dims` nodes per axis. Each axis needs at least two nodes.
    pub fn new(origin: Point3<f64>, spacing: f64, dims: [usize; 3]) -> Self {
        debug_assert!(spacing > 0.0);
        debug_assert!(dims.iter().all(|&d| d >= 2));
        Self {
            origin,
            spacing,
            dims,
        }
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn node_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let i = index % self.dims[0];
        let rest = index / self.dims[0];
        (i, rest % self.dims[1], rest / self.dims[1])
    }

    /// True for nodes on the outer faces of the lattice.
    #[inline]
    pub fn is_boundary(&self, i: usize, j: usize, k: usize) -> bool {
        i == 0
            || j == 0
            || k == 0
            || i + 1 == self.dims[0]
            || j + 1 == self.dims[1]
            || k + 1 == self.dims[2]
    }

    pub fn node_position(&self, i: usize, j: usize, k: usize) -> Point3<f64> {
        self.origin + Vector3::new(i as f64, j as f64, k as f64) * self.spacing
    }

    pub fn node_position_at(&self, index: usize) -> Point3<f64> {
        let (i, j, k) = self.coords(index);
        self.node_position(i, j, k)
    }

    /// The eight nodes around `p` with their trilinear weights.
    ///
    /// Returns `None` when `p` lies outside the lattice.
    pub fn trilinear(&self, p: &Point3<f64>) -> Option<[(usize, f64); 8]> {
        let local = (p - self.origin) / self.spacing;
        let mut base = [0usize; 3];
        let mut frac = [0.0f64; 3];

        for axis in 0..3 {
            let v = local[axis];
            let max = (self.dims[axis] - 1) as f64;
            if !v.is_finite() || v < 0.0 || v > max {
                return None;
            }
            let cell = (v.floor() as usize).min(self.dims[axis] - 2);
            base[axis] = cell;
            frac[axis] = (v - cell as f64).clamp(0.0, 1.0);
        }

        let mut out = [(0usize, 0.0f64); 8];
        for (c, slot) in out.iter_mut().enumerate() {
            let (dx, dy, dz) = (c & 1, (c >> 1) & 1, (c >> 2) & 1);
            let wx = if dx == 1 { frac[0] } else { 1.0 - frac[0] };
            let wy = if dy == 1 { frac[1] } else { 1.0 - frac[1] };
            let wz = if dz == 1 { frac[2] } else { 1.0 - frac[2] };
            *slot = (
                self.index(base[0] + dx, base[1] + dy, base[2] + dz),
                wx * wy * wz,
            );
        }
        Some(out)
    }

    /// Trilinear interpolation of a per-node field at `p`.
    pub fn sample(&self, values: &[f64], p: &Point3<f64>) -> Option<f64> {
        let stencil = self.trilinear(p)?;
        Some(stencil.iter().map(|&(idx, w)| values[idx] * w).sum())
    }

    /// Separable `[1, 2, 1] / 4` blur along every axis, boundary nodes clamped.
    pub fn smooth(&self, values: &mut [f64]) {
        let mut scratch = vec![0.0; values.len()];
        for axis in 0..3 {
            let stride = match axis {
                0 => 1,
                1 => self.dims[0],
                _ => self.dims[0] * self.dims[1],
            };
            for (idx, out) in scratch.iter_mut().enumerate() {
                let (i, j, k) = self.coords(idx);
                let pos = [i, j, k][axis];
                let prev = if pos > 0 { values[idx - stride] } else { values[idx] };
                let next = if pos + 1 < self.dims[axis] {
                    values[idx + stride]
                } else {
                    values[idx]
                };
                *out = 0.25 * prev + 0.5 * values[idx] + 0.25 * next;
            }
            values.copy_from_slice(&scratch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid() -> RegularGrid {
        RegularGrid::new(Point3::origin(), 1.0, [3, 4, 5])
    }

    #[test]
    fn test_index_roundtrip() {
        let grid = unit_grid();
        assert_eq!(grid.node_count(), 60);
        let idx = grid.index(2, 3, 4);
        assert_eq!(grid.coords(idx), (2, 3, 4));
        assert!(grid.is_boundary(2, 1, 1));
        assert!(!grid.is_boundary(1, 1, 1));
    }

    #[test]
    fn test_trilinear_weights_sum_to_one() {
        let grid = unit_grid();
        let stencil = grid.trilinear(&Point3::new(0.25, 1.5, 3.9)).unwrap();
        let total: f64 = stencil.iter().map(|s| s.1).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(grid.trilinear(&Point3::new(-0.1, 0.0, 0.0)).is_none());
        assert!(grid.trilinear(&Point3::new(2.0, 3.0, 4.0)).is_some());
    }

    #[test]
    fn test_sample_reproduces_linear_field() {
        let grid = unit_grid();
        let values: Vec<f64> = (0..grid.node_count())
            .map(|idx| {
                let p = grid.node_position_at(idx);
                2.0 * p.x - p.y + 0.5 * p.z
            })
            .collect();
        let q = Point3::new(1.3, 2.2, 0.7);
        let v = grid.sample(&values, &q).unwrap();
        assert!((v - (2.0 * 1.3 - 2.2 + 0.5 * 0.7)).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_preserves_constant_field() {
        let grid = unit_grid();
        let mut values = vec![3.0; grid.node_count()];
        grid.smooth(&mut values);
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-12));
    }
}
