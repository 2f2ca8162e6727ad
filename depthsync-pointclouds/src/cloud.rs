use depthsync_core::CameraPoint;
use derive_more::Deref;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Points laid out on the pixel grid they were measured on.
#[derive(Debug, Clone, PartialEq, Deref)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct OrganizedCloud<P> {
    width: u32,
    height: u32,
    #[deref]
    points: Vec<P>,
}

impl<P> OrganizedCloud<P> {
    /// `points` must hold exactly `width * height` entries, row-major.
    pub(crate) fn new(width: u32, height: u32, points: Vec<P>) -> Self {
        debug_assert_eq!(points.len(), width as usize * height as usize);
        Self {
            width,
            height,
            points,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn into_points(self) -> Vec<P> {
        self.points
    }

    pub fn get(&self, x: u32, y: u32) -> &P {
        &self.points[y as usize * self.width as usize + x as usize]
    }
}

/// A point with its color packed as `0x00RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PointXyzRgb {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rgb: u32,
}

impl PointXyzRgb {
    pub fn new(point: CameraPoint, [r, g, b]: [u8; 3]) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
            rgb: u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b),
        }
    }

    pub fn point(&self) -> CameraPoint {
        CameraPoint::new(self.x, self.y, self.z)
    }

    pub fn color(&self) -> [u8; 3] {
        [(self.rgb >> 16) as u8, (self.rgb >> 8) as u8, self.rgb as u8]
    }
}
