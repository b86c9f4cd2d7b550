//! Triangle Mesh Data Structure and Processing

pub mod isosurface;
pub mod processing;
pub mod reconstruction;

use cindir_core::{Error, Result};
use nalgebra::{Point3, Vector3};

/// Triangle mesh with vertices and face indices
///
/// `densities` carries the per-vertex support estimate produced by surface
/// reconstruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3<f64>>>,
    pub densities: Option<Vec<f64>>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertices_and_faces(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            densities: None,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Checks face indices and attribute lengths against the vertex count.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        if let Some((i, face)) = self
            .faces
            .iter()
            .enumerate()
            .find(|(_, f)| f.iter().any(|&v| v >= n))
        {
            return Err(Error::InvalidData(format!(
                "Face {i} {face:?} references a vertex outside 0..{n}"
            )));
        }
        if self.normals.as_ref().is_some_and(|v| v.len() != n) {
            return Err(Error::InvalidData(
                "Normal count does not match vertex count".to_string(),
            ));
        }
        if self.densities.as_ref().is_some_and(|v| v.len() != n) {
            return Err(Error::InvalidData(
                "Density count does not match vertex count".to_string(),
            ));
        }
        Ok(())
    }

    /// Compute face normals. Degenerate faces get a zero vector.
    pub fn compute_face_normals(&self) -> Vec<Vector3<f64>> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let n = (v1 - v0).cross(&(v2 - v0));
                n.try_normalize(1e-15).unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }

    /// Compute vertex normals by averaging adjacent face normals
    pub fn compute_vertex_normals(&mut self) {
        let mut vertex_normals: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];
        let face_normals = self.compute_face_normals();

        for (face, normal) in self.faces.iter().zip(&face_normals) {
            for &vertex_idx in face.iter() {
                vertex_normals[vertex_idx] += normal;
            }
        }

        for normal in vertex_normals.iter_mut() {
            if let Some(n) = normal.try_normalize(1e-15) {
                *normal = n;
            }
        }

        self.normals = Some(vertex_normals);
    }

    /// Removes every vertex whose mask entry is `true`.
    ///
    /// Faces touching a removed vertex are dropped and the remaining faces
    /// are reindexed. Per-vertex normals and densities stay aligned.
    pub fn remove_vertices_by_mask(&mut self, mask: &[bool]) -> Result<()> {
        if mask.len() != self.vertices.len() {
            return Err(Error::InvalidInput(format!(
                "Mask length {} does not match vertex count {}",
                mask.len(),
                self.vertices.len()
            )));
        }

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        for (old, &remove) in mask.iter().enumerate() {
            if !remove {
                remap[old] = next;
                next += 1;
            }
        }

        self.vertices = retain_unmasked(&self.vertices, mask);
        if let Some(normals) = &self.normals {
            self.normals = Some(retain_unmasked(normals, mask));
        }
        if let Some(densities) = &self.densities {
            self.densities = Some(retain_unmasked(densities, mask));
        }

        self.faces = self
            .faces
            .iter()
            .filter(|face| face.iter().all(|&v| !mask[v]))
            .map(|face| [remap[face[0]], remap[face[1]], remap[face[2]]])
            .collect();

        Ok(())
    }
}

fn retain_unmasked<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter(|&(_, &remove)| !remove)
        .map(|(v, _)| v.clone())
        .collect()
}
