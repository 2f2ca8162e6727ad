//! Aligns depth frames to other cameras of the same device.
//!
//! Every source pixel with a measurement is treated as a small square patch at its measured
//! depth. Both corners of the patch are deprojected, moved into the target camera with the
//! source to target [`Extrinsics`], and projected into the target image. Every target pixel
//! covered by the resulting rectangle receives the source depth.
//!
//! This forward splat covers visible surfaces without holes, but it does not resolve occlusion.
//! When two source pixels cover the same target pixel, whichever is written last wins. Rows are
//! processed in parallel when the `rayon` feature is enabled, so the winner of such a collision
//! is not deterministic.

mod buffer;

pub use buffer::*;

use depthsync_core::nalgebra::Point2;
use depthsync_core::{CameraModel, DepthImage, Extrinsics};
use depthsync_pinhole::Intrinsics;
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Meters per unit of the aligned output unless configured otherwise.
pub const DEFAULT_OUTPUT_UNIT: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("depth frame is {actual:?} but the source calibration is {expected:?}")]
    SourceDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("aligned buffer is {actual:?} but the target calibration is {expected:?}")]
    TargetDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Maps depth frames of one camera onto the pixel grid of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojector {
    source: Intrinsics,
    target: Intrinsics,
    extrinsics: Extrinsics,
    depth_scale: f32,
    output_unit: f32,
}

impl Reprojector {
    /// `depth_scale` is meters per raw source unit and `extrinsics` moves points
    /// from the source camera into the target camera.
    pub fn new(
        source: Intrinsics,
        target: Intrinsics,
        extrinsics: Extrinsics,
        depth_scale: f32,
    ) -> Self {
        Self {
            source,
            target,
            extrinsics,
            depth_scale,
            output_unit: DEFAULT_OUTPUT_UNIT,
        }
    }

    /// Sets the meters per unit of the aligned output.
    pub fn output_unit(self, output_unit: f32) -> Self {
        Self {
            output_unit,
            ..self
        }
    }

    pub fn source(&self) -> &Intrinsics {
        &self.source
    }

    pub fn target(&self) -> &Intrinsics {
        &self.target
    }

    /// Creates an empty buffer with the target resolution.
    pub fn buffer(&self) -> AlignedBuffer {
        AlignedBuffer::new(self.target.width, self.target.height)
    }

    /// Clears `out` and splats every measured pixel of `depth` into it.
    pub fn reproject(&self, depth: &DepthImage, out: &mut AlignedBuffer) -> Result<(), AlignError> {
        let expected = (self.source.width, self.source.height);
        if depth.dimensions() != expected {
            return Err(AlignError::SourceDimensions {
                expected,
                actual: depth.dimensions(),
            });
        }
        let expected = (self.target.width, self.target.height);
        if out.dimensions() != expected {
            return Err(AlignError::TargetDimensions {
                expected,
                actual: out.dimensions(),
            });
        }

        out.clear();
        let out = &*out;

        #[cfg(not(feature = "rayon"))]
        {
            (0..depth.height()).for_each(|y| self.splat_row(depth, y, out));
        }
        #[cfg(feature = "rayon")]
        {
            (0..depth.height())
                .into_par_iter()
                .for_each(|y| self.splat_row(depth, y, out));
        }
        Ok(())
    }

    /// Allocates a buffer, reprojects into it, and returns the result as an image.
    pub fn reproject_image(&self, depth: &DepthImage) -> Result<DepthImage, AlignError> {
        let mut out = self.buffer();
        self.reproject(depth, &mut out)?;
        Ok(out.to_image())
    }

    fn splat_row(&self, depth: &DepthImage, y: u32, out: &AlignedBuffer) {
        let scale = self.depth_scale / self.output_unit;
        for x in 0..depth.width() {
            let raw = depth.get_pixel(x, y).0[0];
            if raw == 0 {
                continue;
            }
            let meters = self.depth_scale * raw as f32;
            let (x, y) = (x as f32, y as f32);
            let Some((x0, y0)) = self.target_pixel(Point2::new(x - 0.5, y - 0.5), meters) else {
                continue;
            };
            let Some((x1, y1)) = self.target_pixel(Point2::new(x + 0.5, y + 0.5), meters) else {
                continue;
            };
            let value = (raw as f32 * scale).round() as u16;
            for ty in y0..=y1 {
                for tx in x0..=x1 {
                    out.store(tx, ty, value);
                }
            }
        }
    }

    /// The target pixel nearest to where a source location at `depth` is imaged.
    fn target_pixel(&self, source: Point2<f32>, depth: f32) -> Option<(u32, u32)> {
        let point = self
            .extrinsics
            .transform(self.source.deproject(source, depth));
        let pixel = self.target.project(point);
        let rounded = Point2::new((pixel.x + 0.5).floor(), (pixel.y + 0.5).floor());
        self.target
            .contains(rounded)
            .then(|| (rounded.x as u32, rounded.y as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthsync_core::nalgebra::{Rotation3, Vector3};
    use depthsync_core::image::Luma;

    /// A source pixel covers a quarter of a target pixel.
    fn quarter_scale() -> Reprojector {
        Reprojector::new(
            Intrinsics::new(8, 8, 8.0, 8.0, 3.5, 3.5),
            Intrinsics::new(2, 2, 2.0, 2.0, 0.5, 0.5),
            Extrinsics::identity(),
            0.001,
        )
    }

    fn single(value: u16, x: u32, y: u32) -> DepthImage {
        let mut depth = DepthImage::new(8, 8);
        depth.put_pixel(x, y, Luma([value]));
        depth
    }

    #[test]
    fn empty_frame_writes_nothing() {
        let out = quarter_scale().reproject_image(&DepthImage::new(8, 8)).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn single_target_pixel() {
        let out = quarter_scale().reproject_image(&single(1500, 2, 2)).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[0], 1500);
        assert_eq!(out.pixels().filter(|p| p.0[0] != 0).count(), 1);
    }

    #[test]
    fn magnified_pixel_fills_its_whole_rectangle() {
        // Three target pixels per source pixel; corners of source (2, 2) land at 5.25 and 8.25.
        let reprojector = Reprojector::new(
            Intrinsics::new(8, 8, 8.0, 8.0, 3.5, 3.5),
            Intrinsics::new(24, 24, 24.0, 24.0, 11.25, 11.25),
            Extrinsics::identity(),
            0.001,
        );
        let out = reprojector.reproject_image(&single(1500, 2, 2)).unwrap();
        for (x, y, pixel) in out.enumerate_pixels() {
            let inside = (5..=8).contains(&x) && (5..=8).contains(&y);
            assert_eq!(pixel.0[0], if inside { 1500 } else { 0 }, "at ({}, {})", x, y);
        }
    }

    #[test]
    fn partly_outside_is_skipped() {
        // Covers the last target pixel and the column past it.
        let out = quarter_scale().reproject_image(&single(1500, 7, 7)).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn fully_outside_is_skipped() {
        let reprojector = Reprojector::new(
            Intrinsics::new(8, 8, 8.0, 8.0, 3.5, 3.5),
            Intrinsics::new(2, 2, 2.0, 2.0, 0.5, 0.5),
            Extrinsics::new(Rotation3::identity(), Vector3::new(5.0, 0.0, 0.0)),
            0.001,
        );
        let out = reprojector.reproject_image(&single(1500, 2, 2)).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn rescales_into_output_unit() {
        let reprojector = Reprojector {
            depth_scale: 0.0001,
            ..quarter_scale()
        };
        let out = reprojector.reproject_image(&single(12340, 2, 2)).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[0], 1234);
        let meters = reprojector.output_unit(0.0001);
        let out = meters.reproject_image(&single(12340, 2, 2)).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[0], 12340);
    }

    #[test]
    fn collisions_keep_one_of_the_writers() {
        // Both pixels land on target (0, 0).
        let mut depth = single(1000, 2, 2);
        depth.put_pixel(1, 2, Luma([2000]));
        let out = quarter_scale().reproject_image(&depth).unwrap();
        assert!([1000, 2000].contains(&out.get_pixel(0, 0).0[0]));
    }

    #[test]
    fn buffer_is_cleared_between_frames() {
        let reprojector = quarter_scale();
        let mut out = reprojector.buffer();
        reprojector.reproject(&single(1000, 2, 2), &mut out).unwrap();
        reprojector.reproject(&DepthImage::new(8, 8), &mut out).unwrap();
        assert_eq!(out.get(0, 0), 0);
    }

    #[test]
    fn dimension_mismatch() {
        let reprojector = quarter_scale();
        assert_eq!(
            reprojector.reproject_image(&DepthImage::new(4, 8)),
            Err(AlignError::SourceDimensions {
                expected: (8, 8),
                actual: (4, 8)
            })
        );
        let mut out = AlignedBuffer::new(3, 2);
        assert_eq!(
            reprojector.reproject(&DepthImage::new(8, 8), &mut out),
            Err(AlignError::TargetDimensions {
                expected: (2, 2),
                actual: (3, 2)
            })
        );
    }
}
