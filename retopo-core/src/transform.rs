//! 3D transformation utilities

use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D transformation applied to mesh nodes and geometry buffers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Create a rotation transformation from a quaternion
    pub fn rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Create a scaling transformation
    pub fn scaling(scale: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&scale),
        }
    }

    /// Create a uniform scaling transformation
    pub fn uniform_scaling(scale: f32) -> Self {
        Self {
            matrix: Matrix4::new_scaling(scale),
        }
    }

    /// Compose a transformation from translation, rotation, and scale
    pub fn from_trs(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation)
                * rotation.to_homogeneous()
                * Matrix4::new_nonuniform_scaling(&scale),
        }
    }

    /// Recover translation, rotation, and scale from the matrix.
    ///
    /// A negative determinant means one axis is mirrored; the mirroring is
    /// folded into the X scale so the remaining basis is a pure rotation.
    pub fn decompose(&self) -> (Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>) {
        let m = &self.matrix;
        let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

        let col_x = m.fixed_view::<3, 1>(0, 0).into_owned();
        let col_y = m.fixed_view::<3, 1>(0, 1).into_owned();
        let col_z = m.fixed_view::<3, 1>(0, 2).into_owned();

        let mut sx = col_x.norm();
        let sy = col_y.norm();
        let sz = col_z.norm();
        if m.fixed_view::<3, 3>(0, 0).determinant() < 0.0 {
            sx = -sx;
        }

        let safe = |s: f32| if s != 0.0 { s } else { 1.0 };
        let basis = Matrix3::from_columns(&[col_x / safe(sx), col_y / safe(sy), col_z / safe(sz)]);
        let rotation = UnitQuaternion::from_matrix(&basis);

        (translation, rotation, Vector3::new(sx, sy, sz))
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Apply the transformation to a direction vector (no translation)
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.matrix.fixed_view::<3, 3>(0, 0) * vector
    }

    /// Compose this transformation with another
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(self) -> Option<Self> {
        self.matrix.try_inverse().map(|inv_matrix| Self {
            matrix: inv_matrix,
        })
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4<f32>> for Transform3D {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}
