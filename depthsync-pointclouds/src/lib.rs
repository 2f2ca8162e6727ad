//! Organized point clouds reconstructed from depth frames.
//!
//! Clouds keep the layout of the depth frame they came from: one point per depth pixel,
//! row-major. Pixels without a valid measurement are reported as the origin instead of
//! being left out, so a point can always be found from its pixel.

mod cloud;

pub use cloud::*;

use depthsync_core::nalgebra::Point2;
use depthsync_core::{CameraModel, CameraPoint, DepthImage, Extrinsics, RgbImage};
use depthsync_pinhole::Intrinsics;
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Color assigned to points the color camera does not see.
pub const OUT_OF_BOUNDS_COLOR: [u8; 3] = [96, 157, 198];

/// Colored clouds drop points further away than this, in meters.
pub const MAX_COLORED_DEPTH: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("depth frame is {actual:?} but the depth calibration is {expected:?}")]
    DepthDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("color frame is {actual:?} but the color calibration is {expected:?}")]
    ColorDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// The color camera a cloud is painted from.
#[derive(Debug, Clone, Copy)]
pub struct ColorSource<'a> {
    pub image: &'a RgbImage,
    pub intrinsics: &'a Intrinsics,
    /// Moves points from the depth camera into the color camera.
    pub extrinsics: &'a Extrinsics,
}

/// Deprojects depth frames of one camera into organized clouds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCloudBuilder {
    intrinsics: Intrinsics,
    depth_scale: f32,
}

impl PointCloudBuilder {
    pub fn new(intrinsics: Intrinsics, depth_scale: f32) -> Self {
        Self {
            intrinsics,
            depth_scale,
        }
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// A point for every depth pixel, or the origin where depth is not positive.
    pub fn depth_cloud(&self, depth: &DepthImage) -> Result<OrganizedCloud<CameraPoint>, CloudError> {
        self.check_depth(depth)?;
        Ok(self.build(depth, |x, y| {
            let point = self.point(depth, x, y);
            if point.z <= 0.0 {
                CameraPoint::origin()
            } else {
                point
            }
        }))
    }

    /// A point for every depth pixel, colored by the pixel of `color` it projects into.
    ///
    /// Points with depth outside `(0, MAX_COLORED_DEPTH]` are moved to the origin before
    /// they are colored. Points imaged outside the color frame get [`OUT_OF_BOUNDS_COLOR`].
    pub fn colored_cloud(
        &self,
        depth: &DepthImage,
        color: ColorSource<'_>,
    ) -> Result<OrganizedCloud<PointXyzRgb>, CloudError> {
        self.check_depth(depth)?;
        let expected = (color.intrinsics.width, color.intrinsics.height);
        if color.image.dimensions() != expected {
            return Err(CloudError::ColorDimensions {
                expected,
                actual: color.image.dimensions(),
            });
        }

        Ok(self.build(depth, |x, y| {
            let mut point = self.point(depth, x, y);
            if point.z <= 0.0 || point.z > MAX_COLORED_DEPTH {
                point = CameraPoint::origin();
            }
            let pixel = color
                .intrinsics
                .project(color.extrinsics.transform(point));
            PointXyzRgb::new(point, sample(color.image, color.intrinsics, pixel))
        }))
    }

    fn check_depth(&self, depth: &DepthImage) -> Result<(), CloudError> {
        let expected = (self.intrinsics.width, self.intrinsics.height);
        if depth.dimensions() != expected {
            return Err(CloudError::DepthDimensions {
                expected,
                actual: depth.dimensions(),
            });
        }
        Ok(())
    }

    fn point(&self, depth: &DepthImage, x: u32, y: u32) -> CameraPoint {
        let meters = self.depth_scale * depth.get_pixel(x, y).0[0] as f32;
        self.intrinsics
            .deproject(Point2::new(x as f32, y as f32), meters)
    }

    fn build<P, F>(&self, depth: &DepthImage, f: F) -> OrganizedCloud<P>
    where
        P: Send,
        F: Fn(u32, u32) -> P + Sync,
    {
        let (width, height) = depth.dimensions();
        let at = |i: usize| f(i as u32 % width, i as u32 / width);
        let len = width as usize * height as usize;
        #[cfg(not(feature = "rayon"))]
        let points = (0..len).map(at).collect();
        #[cfg(feature = "rayon")]
        let points = (0..len).into_par_iter().map(at).collect();
        OrganizedCloud::new(width, height, points)
    }
}

/// The color of the pixel nearest to `pixel`, if `pixel` is inside the image.
fn sample(image: &RgbImage, intrinsics: &Intrinsics, pixel: Point2<f32>) -> [u8; 3] {
    if !intrinsics.contains(pixel) {
        return OUT_OF_BOUNDS_COLOR;
    }
    let x = ((pixel.x + 0.5).floor() as u32).min(image.width() - 1);
    let y = ((pixel.y + 0.5).floor() as u32).min(image.height() - 1);
    image.get_pixel(x, y).0
}
