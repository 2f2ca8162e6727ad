//! This crate plugs into `depthsync-core` and provides the pinhole camera model that depth
//! cameras report for each of their video streams. It converts a pixel with a measured depth
//! into a [`CameraPoint`] (deprojection) and a [`CameraPoint`] back into the pixel it is imaged
//! at (projection), compensating for lens distortion with one of the [`Distortion`] models.
//!
//! It also produces the [`CalibrationRecord`] that accompanies every published image.

mod calibration;
mod distortion;

pub use calibration::*;
pub use distortion::*;

use depthsync_core::nalgebra::{Matrix3, Point2};
use depthsync_core::{CameraModel, CameraPoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Intrinsic parameters of one video stream as reported by the device, as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// The principal point and focal lengths are in pixels. `coeffs` are interpreted
/// according to `model`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    pub ppx: f32,
    pub ppy: f32,
    pub fx: f32,
    pub fy: f32,
    pub model: Distortion,
    pub coeffs: [f32; 5],
}

impl Intrinsics {
    /// Creates intrinsics without any distortion.
    pub fn new(width: u32, height: u32, fx: f32, fy: f32, ppx: f32, ppy: f32) -> Self {
        Self {
            width,
            height,
            ppx,
            ppy,
            fx,
            fy,
            model: Distortion::None,
            coeffs: [0.0; 5],
        }
    }

    /// Intrinsics of an ideal camera with the principal point in the image center.
    pub fn centered(width: u32, height: u32, focal: f32) -> Self {
        Self::new(
            width,
            height,
            focal,
            focal,
            width as f32 / 2.0 - 0.5,
            height as f32 / 2.0 - 0.5,
        )
    }

    pub fn distortion(self, model: Distortion, coeffs: [f32; 5]) -> Self {
        Self {
            model,
            coeffs,
            ..self
        }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx,  0.0,      self.ppx,
            0.0,      self.fy,  self.ppy,
            0.0,      0.0,      1.0,
        )
    }

    /// Checks if a pixel location lies within the image.
    ///
    /// Non-finite locations are never inside.
    pub fn contains(&self, pixel: Point2<f32>) -> bool {
        pixel.x >= 0.0
            && pixel.y >= 0.0
            && pixel.x < self.width as f32
            && pixel.y < self.height as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn calibration(&self) -> CalibrationRecord {
        CalibrationRecord::from(self)
    }
}

impl CameraModel for Intrinsics {
    /// ```
    /// use depthsync_core::{CameraModel, nalgebra::Point2};
    /// use depthsync_pinhole::Intrinsics;
    /// let intrinsics = Intrinsics::new(640, 480, 600.0, 600.0, 320.0, 240.0);
    /// let point = intrinsics.deproject(Point2::new(620.0, 240.0), 2.0);
    /// assert_eq!((point.x, point.y, point.z), (1.0, 0.0, 2.0));
    /// ```
    fn deproject(&self, pixel: Point2<f32>, depth: f32) -> CameraPoint {
        let x = (pixel.x - self.ppx) / self.fx;
        let y = (pixel.y - self.ppy) / self.fy;
        let (x, y) = self.model.undistort(&self.coeffs, x, y);
        CameraPoint::new(depth * x, depth * y, depth)
    }

    /// ```
    /// use depthsync_core::{CameraModel, CameraPoint};
    /// use depthsync_pinhole::Intrinsics;
    /// let intrinsics = Intrinsics::new(640, 480, 600.0, 600.0, 320.0, 240.0);
    /// let pixel = intrinsics.project(CameraPoint::new(-0.5, 0.25, 1.0));
    /// assert_eq!((pixel.x, pixel.y), (20.0, 390.0));
    /// ```
    fn project(&self, point: CameraPoint) -> Point2<f32> {
        let x = point.x / point.z;
        let y = point.y / point.z;
        let (x, y) = self.model.distort(&self.coeffs, x, y);
        Point2::new(x * self.fx + self.ppx, y * self.fy + self.ppy)
    }
}
