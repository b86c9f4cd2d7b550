//! Iso-surface extraction by marching tetrahedra.
//!
//! Each lattice cell is split into six tetrahedra around its main diagonal.
//! The split is the same in every cell, so neighboring cells agree on their
//! shared faces and the extracted surface has no cracks. Vertices on a lattice
//! edge are shared by every triangle that crosses that edge.

use crate::spatial::RegularGrid;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// Cell corner offsets, bit 0 = x, bit 1 = y, bit 2 = z.
const CUBE_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Kuhn decomposition: one tetrahedron per axis ordering, each listed as the
/// path from corner 0 to corner 7.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

/// Triangulated level set of a lattice field.
///
/// Faces are wound so their normals point toward increasing field values.
#[derive(Debug, Clone, Default)]
pub struct IsoSurface {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
    /// For each vertex: the two lattice nodes of its edge and the blend factor.
    sources: Vec<(usize, usize, f64)>,
}

impl IsoSurface {
    /// Interpolates another per-node field at every surface vertex.
    pub fn interpolate(&self, field: &[f64]) -> Vec<f64> {
        self.sources
            .iter()
            .map(|&(a, b, t)| field[a] + t * (field[b] - field[a]))
            .collect()
    }
}

struct Builder<'a> {
    grid: &'a RegularGrid,
    values: &'a [f64],
    iso: f64,
    edge_vertices: HashMap<(usize, usize), usize>,
    surface: IsoSurface,
}

impl Builder<'_> {
    fn edge_vertex(&mut self, a: usize, b: usize) -> usize {
        let key = (a.min(b), a.max(b));
        if let Some(&v) = self.edge_vertices.get(&key) {
            return v;
        }

        let (fa, fb) = (self.values[key.0], self.values[key.1]);
        let denom = fb - fa;
        let t = if denom.abs() > f64::EPSILON {
            ((self.iso - fa) / denom).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let pa = self.grid.node_position_at(key.0);
        let pb = self.grid.node_position_at(key.1);

        let v = self.surface.vertices.len();
        self.surface.vertices.push(pa + (pb - pa) * t);
        self.surface.sources.push((key.0, key.1, t));
        self.edge_vertices.insert(key, v);
        v
    }

    /// Emits a triangle wound so its normal follows `uphill`.
    fn emit(&mut self, mut tri: [usize; 3], uphill: &Vector3<f64>) {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            return;
        }
        let v = &self.surface.vertices;
        let n = (v[tri[1]] - v[tri[0]]).cross(&(v[tri[2]] - v[tri[0]]));
        if n.dot(uphill) < 0.0 {
            tri.swap(1, 2);
        }
        self.surface.faces.push(tri);
    }

    /// `nodes` must walk one lattice step along a distinct axis each time.
    fn polygonize_tetrahedron(&mut self, nodes: [usize; 4]) {
        let mut below = Vec::with_capacity(4);
        let mut above = Vec::with_capacity(4);
        for &n in &nodes {
            if self.values[n] < self.iso {
                below.push(n);
            } else {
                above.push(n);
            }
        }
        if below.is_empty() || above.is_empty() {
            return;
        }

        // The nodes form an axis-aligned path, so this is the gradient of the
        // linear interpolant scaled by the squared spacing.
        let uphill: Vector3<f64> = nodes
            .windows(2)
            .map(|w| {
                let step = self.grid.node_position_at(w[1]) - self.grid.node_position_at(w[0]);
                step * (self.values[w[1]] - self.values[w[0]])
            })
            .sum();

        match below.len() {
            1 | 3 => {
                let (lone, rest) = if below.len() == 1 {
                    (below[0], above)
                } else {
                    (above[0], below)
                };
                let tri = [
                    self.edge_vertex(lone, rest[0]),
                    self.edge_vertex(lone, rest[1]),
                    self.edge_vertex(lone, rest[2]),
                ];
                self.emit(tri, &uphill);
            }
            _ => {
                let q = [
                    self.edge_vertex(below[0], above[0]),
                    self.edge_vertex(below[0], above[1]),
                    self.edge_vertex(below[1], above[1]),
                    self.edge_vertex(below[1], above[0]),
                ];
                self.emit([q[0], q[1], q[2]], &uphill);
                self.emit([q[0], q[2], q[3]], &uphill);
            }
        }
    }
}

/// Extracts the `iso` level set of `values`, one value per lattice node.
pub fn marching_tetrahedra(grid: &RegularGrid, values: &[f64], iso: f64) -> IsoSurface {
    debug_assert_eq!(values.len(), grid.node_count());

    let [nx, ny, nz] = grid.dims();
    let mut builder = Builder {
        grid,
        values,
        iso,
        edge_vertices: HashMap::new(),
        surface: IsoSurface::default(),
    };

    for k in 0..nz - 1 {
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let corners: [usize; 8] = std::array::from_fn(|c| {
                    let [dx, dy, dz] = CUBE_CORNERS[c];
                    grid.index(i + dx, j + dy, k + dz)
                });

                let below = corners.iter().filter(|&&c| values[c] < iso).count();
                if below == 0 || below == 8 {
                    continue;
                }

                for tet in TETRAHEDRA {
                    builder.polygonize_tetrahedron(tet.map(|c| corners[c]));
                }
            }
        }
    }

    builder.surface
}
