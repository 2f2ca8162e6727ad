use crate::Intrinsics;
use nalgebra::{Matrix3, Matrix3x4};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The distortion model name consumers expect alongside five coefficients.
pub const PLUMB_BOB: &str = "plumb_bob";

/// Per-frame calibration published with every image of a stream.
///
/// Each stream is treated as its own monocular camera, so the rectification is the
/// identity and the projection carries no baseline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CalibrationRecord {
    pub width: u32,
    pub height: u32,
    pub k: Matrix3<f32>,
    pub p: Matrix3x4<f32>,
    pub r: Matrix3<f32>,
    pub d: [f32; 5],
    pub distortion_model: String,
}

impl From<&Intrinsics> for CalibrationRecord {
    fn from(intrinsics: &Intrinsics) -> Self {
        let k = intrinsics.matrix();
        Self {
            width: intrinsics.width,
            height: intrinsics.height,
            k,
            p: k.insert_column(3, 0.0),
            r: Matrix3::identity(),
            d: intrinsics.coeffs,
            distortion_model: PLUMB_BOB.to_owned(),
        }
    }
}
