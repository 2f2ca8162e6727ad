#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Calibration of an inertial stream as reported by the device.
///
/// `data` is a 3x4 matrix (scale and cross-axis terms followed by the bias),
/// stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MotionIntrinsics {
    pub data: [[f32; 4]; 3],
    pub noise_variances: [f32; 3],
    pub bias_variances: [f32; 3],
}

impl Default for MotionIntrinsics {
    /// Unit scale, no bias, and no noise.
    fn default() -> Self {
        Self {
            data: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            noise_variances: [0.0; 3],
            bias_variances: [0.0; 3],
        }
    }
}

impl MotionIntrinsics {
    /// The matrix flattened row-major into twelve values.
    pub fn flattened(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (row, chunk) in self.data.iter().zip(out.chunks_exact_mut(4)) {
            chunk.copy_from_slice(row);
        }
        out
    }
}
