use crate::CameraPoint;
use nalgebra::Point2;

/// Allows conversion between a pixel with a measured depth and the 3d point
/// in the camera frame which produced it.
pub trait CameraModel {
    /// Converts a pixel location and its depth (in meters) into a [`CameraPoint`].
    ///
    /// The returned point always has `z == depth`.
    fn deproject(&self, pixel: Point2<f32>, depth: f32) -> CameraPoint;

    /// Converts a [`CameraPoint`] into the pixel location it is imaged at.
    ///
    /// Points on the plane `z == 0` have no image; their projection is not finite.
    fn project(&self, point: CameraPoint) -> Point2<f32>;
}
