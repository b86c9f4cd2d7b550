//! Nearest-neighbor queries over a fixed set of points.

use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

// Wrapper for RTree
struct IndexedPoint(usize, [f64; 3]);

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.1)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.1[0] - point[0];
        let dy = self.1[1] - point[1];
        let dz = self.1[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Bulk-loaded R-tree over point positions.
///
/// Query results are `(point index, distance)` pairs sorted by distance.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn build(points: &[Point3<f64>]) -> Self {
        let wrappers = points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint(i, [p.x, p.y, p.z]))
            .collect();
        Self {
            tree: RTree::bulk_load(wrappers),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` nearest neighbors of the indexed point `index`, itself excluded.
    pub fn knn_excluding(&self, index: usize, query: &Point3<f64>, k: usize) -> Vec<(usize, f64)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[query.x, query.y, query.z])
            .filter(|(p, _)| p.0 != index)
            .take(k)
            .map(|(p, d2)| (p.0, d2.sqrt()))
            .collect()
    }

    /// Up to `max_nn` nearest points within `radius` of `query`.
    pub fn hybrid(&self, query: &Point3<f64>, radius: f64, max_nn: usize) -> Vec<(usize, f64)> {
        let radius_2 = radius * radius;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[query.x, query.y, query.z])
            .take_while(|(_, d2)| *d2 <= radius_2)
            .take(max_nn)
            .map(|(p, d2)| (p.0, d2.sqrt()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<Point3<f64>> {
        (0..10).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_hybrid_sorted_and_includes_self() {
        let points = line();
        let index = PointIndex::build(&points);
        assert_eq!(index.len(), 10);

        let result = index.hybrid(&points[5], 10.0, 3);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], (5, 0.0));
        assert!((result[1].1 - 1.0).abs() < 1e-12);
        assert!((result[2].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_knn_excluding_skips_query() {
        let points = line();
        let index = PointIndex::build(&points);
        let result = index.knn_excluding(0, &points[0], 2);
        assert_eq!(result.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_hybrid_respects_radius_and_cap() {
        let points = line();
        let index = PointIndex::build(&points);

        let within = index.hybrid(&points[5], 1.5, 30);
        assert_eq!(within.len(), 3);

        let capped = index.hybrid(&points[5], 100.0, 4);
        assert_eq!(capped.len(), 4);
    }
}
