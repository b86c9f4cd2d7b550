//! Meshes and surface reconstruction.
//!
//! - `mesh`: [`TriangleMesh`], density pruning, Poisson reconstruction and
//!   iso-surface extraction
//! - `spatial`: the [`RegularGrid`] lattice the solver works on

pub mod mesh;
pub mod spatial;

pub use cindir_core::PointCloud;
pub use mesh::isosurface::{marching_tetrahedra, IsoSurface};
pub use mesh::processing::{quantile, remove_low_density_vertices};
pub use mesh::reconstruction::{poisson_reconstruction, PoissonConfig, MAX_DEPTH};
pub use mesh::TriangleMesh;
pub use spatial::RegularGrid;
