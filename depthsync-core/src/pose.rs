use crate::CameraPoint;
use nalgebra::{Matrix3, Rotation3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The rigid transform taking points from one stream's camera frame into another's.
///
/// `to = rotation * from + translation`, with the translation in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Extrinsics {
    pub rotation: Rotation3<f32>,
    pub translation: Vector3<f32>,
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

impl Extrinsics {
    pub fn new(rotation: Rotation3<f32>, translation: Vector3<f32>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Rotation3::identity(), Vector3::zeros())
    }

    /// Builds extrinsics from the column-major rotation layout devices report.
    ///
    /// The rotation is trusted to be orthonormal.
    pub fn from_column_major(rotation: [f32; 9], translation: [f32; 3]) -> Self {
        Self::new(
            Rotation3::from_matrix_unchecked(Matrix3::from_column_slice(&rotation)),
            Vector3::from(translation),
        )
    }

    /// The rotation in column-major order followed by the translation.
    pub fn to_column_major(&self) -> ([f32; 9], [f32; 3]) {
        let mut rotation = [0.0; 9];
        rotation.copy_from_slice(self.rotation.matrix().as_slice());
        (rotation, self.translation.into())
    }

    pub fn transform(&self, point: CameraPoint) -> CameraPoint {
        CameraPoint(self.rotation * point.0 + self.translation)
    }

    /// The transform going the opposite direction.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self::new(rotation, -(rotation * self.translation))
    }

    /// Distance between the two optical centers.
    pub fn baseline(&self) -> f32 {
        self.translation.norm()
    }
}
