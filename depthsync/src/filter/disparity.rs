use depthsync_core::{DepthImage, DisparityImage};

/// Converts between raw depth and disparity, `disparity = factor / depth`.
///
/// A zero depth and a zero disparity both mean "no measurement" and map onto each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisparityConverter {
    factor: f32,
}

impl DisparityConverter {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// `focal` in pixels, `baseline` in meters, and `depth_scale` in meters per raw unit.
    pub fn from_calibration(focal: f32, baseline: f32, depth_scale: f32) -> Self {
        Self::new(focal * baseline / depth_scale)
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn to_disparity(&self, depth: &DepthImage, out: &mut DisparityImage) {
        if out.dimensions() != depth.dimensions() {
            *out = DisparityImage::new(depth.width(), depth.height());
        }
        for (d, &raw) in out.iter_mut().zip(depth.iter()) {
            *d = if raw == 0 {
                0.0
            } else {
                self.factor / f32::from(raw)
            };
        }
    }

    /// Writes the depth of `disparity` into `out`, which must have the same dimensions.
    pub fn to_depth(&self, disparity: &DisparityImage, out: &mut DepthImage) {
        debug_assert_eq!(disparity.dimensions(), out.dimensions());
        for (raw, &d) in out.iter_mut().zip(disparity.iter()) {
            *raw = if d > 0.0 {
                (f64::from(self.factor) / f64::from(d))
                    .round()
                    .min(f64::from(u16::MAX)) as u16
            } else {
                0
            };
        }
    }
}
