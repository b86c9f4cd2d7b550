use nalgebra::{Point3, Scalar, Vector3};

/// Points with optional per-point colors and normals.
///
/// Colors are RGB in `[0, 1]`. When `colors` or `normals` is present it holds
/// exactly one entry per point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud<T: Scalar = f64> {
    pub points: Vec<Point3<T>>,
    pub colors: Option<Vec<Point3<T>>>,
    pub normals: Option<Vec<Vector3<T>>>,
}

impl<T: Scalar> PointCloud<T> {
    pub fn new(points: Vec<Point3<T>>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Point3<T>>) -> crate::Result<Self> {
        if colors.len() == self.points.len() {
            self.colors = Some(colors);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Color count {} does not match point count {}",
                colors.len(),
                self.points.len()
            )))
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vector3<T>>) -> crate::Result<Self> {
        if normals.len() == self.points.len() {
            self.normals = Some(normals);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Normal count {} does not match point count {}",
                normals.len(),
                self.points.len()
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Checks that every attribute array matches the point count.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(colors) = &self.colors {
            if colors.len() != self.points.len() {
                return Err(crate::Error::InvalidData(format!(
                    "Color count {} does not match point count {}",
                    colors.len(),
                    self.points.len()
                )));
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != self.points.len() {
                return Err(crate::Error::InvalidData(format!(
                    "Normal count {} does not match point count {}",
                    normals.len(),
                    self.points.len()
                )));
            }
        }
        Ok(())
    }

    /// Returns the points at `indices`, in that order, with their attributes.
    ///
    /// Indices out of range are ignored.
    pub fn select_by_index(&self, indices: &[usize]) -> Self {
        let indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.points.len())
            .collect();

        Self {
            points: indices.iter().map(|&i| self.points[i].clone()).collect(),
            colors: self
                .colors
                .as_ref()
                .map(|c| indices.iter().map(|&i| c[i].clone()).collect()),
            normals: self
                .normals
                .as_ref()
                .map(|n| indices.iter().map(|&i| n[i].clone()).collect()),
        }
    }
}

impl PointCloud<f64> {
    /// Axis-aligned bounding box, `None` for an empty cloud.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.points.first()?;
        let mut min = first;
        let mut max = first;

        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }
}
