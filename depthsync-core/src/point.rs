use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A 3d point relative to a camera's optical center, in meters.
///
/// The positive X axis is right, positive Y axis is down, and positive Z axis is
/// forwards from the optical center of the camera.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraPoint(pub Point3<f32>);

impl CameraPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Point3::new(x, y, z))
    }

    /// The optical center itself, used to report points without a measurement.
    pub fn origin() -> Self {
        Self(Point3::origin())
    }

    /// The depth of the point along the optical axis.
    pub fn depth(&self) -> f32 {
        self.0.z
    }
}
