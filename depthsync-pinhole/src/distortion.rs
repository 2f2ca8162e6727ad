#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Iterations used when a distortion has no closed-form inverse.
const INVERSION_ITERATIONS: usize = 10;

/// The lens distortion model attached to a set of intrinsics.
///
/// All Brown-Conrady variants share the coefficient layout `[k1, k2, p1, p2, k3]`:
/// three radial terms and two tangential terms. [`Distortion::FTheta`] only uses `k1`,
/// the field of view parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Distortion {
    /// Rectilinear images, no distortion compensation required.
    None,
    /// Brown-Conrady where the tangential terms are computed from the radially
    /// distorted coordinates.
    ModifiedBrownConrady,
    /// Brown-Conrady whose coefficients describe the undistortion instead of
    /// the distortion.
    InverseBrownConrady,
    /// Classic Brown-Conrady.
    BrownConrady,
    /// Equidistant fisheye model.
    FTheta,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::None
    }
}

fn radial(c: &[f32; 5], r2: f32) -> f32 {
    1.0 + ((c[4] * r2 + c[1]) * r2 + c[0]) * r2
}

fn tangential(c: &[f32; 5], x: f32, y: f32, r2: f32) -> (f32, f32) {
    (
        2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x),
        2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y),
    )
}

/// Applies Brown-Conrady to undistorted normalized coordinates.
fn brown_conrady(c: &[f32; 5], x: f32, y: f32) -> (f32, f32) {
    let r2 = x * x + y * y;
    let f = radial(c, r2);
    let (dx, dy) = tangential(c, x, y, r2);
    (x * f + dx, y * f + dy)
}

/// Inverts [`brown_conrady`] with a fixed point iteration.
///
/// When `scaled_tangential` is set the tangential terms are evaluated on the
/// radially scaled coordinates, which inverts the modified variant instead.
fn invert_brown_conrady(c: &[f32; 5], u: f32, v: f32, scaled_tangential: bool) -> (f32, f32) {
    let (mut x, mut y) = (u, v);
    for _ in 0..INVERSION_ITERATIONS {
        let r2 = x * x + y * y;
        let f = radial(c, r2);
        let (dx, dy) = if scaled_tangential {
            tangential(c, x * f, y * f, r2)
        } else {
            tangential(c, x, y, r2)
        };
        x = (u - dx) / f;
        y = (v - dy) / f;
    }
    (x, y)
}

fn clamped_radius(x: f32, y: f32) -> f32 {
    (x * x + y * y).sqrt().max(f32::EPSILON)
}

impl Distortion {
    /// Maps undistorted normalized coordinates to where the lens images them.
    pub fn distort(self, coeffs: &[f32; 5], x: f32, y: f32) -> (f32, f32) {
        match self {
            Self::None => (x, y),
            Self::BrownConrady => brown_conrady(coeffs, x, y),
            Self::ModifiedBrownConrady => {
                let r2 = x * x + y * y;
                let f = radial(coeffs, r2);
                let (x, y) = (x * f, y * f);
                let (dx, dy) = tangential(coeffs, x, y, r2);
                (x + dx, y + dy)
            }
            Self::InverseBrownConrady => invert_brown_conrady(coeffs, x, y, false),
            Self::FTheta => {
                let r = clamped_radius(x, y);
                let k = coeffs[0];
                let rd = (2.0 * r * (k / 2.0).tan()).atan() / k;
                (x * rd / r, y * rd / r)
            }
        }
    }

    /// Maps distorted normalized coordinates back to the ideal pinhole image.
    pub fn undistort(self, coeffs: &[f32; 5], x: f32, y: f32) -> (f32, f32) {
        match self {
            Self::None => (x, y),
            Self::BrownConrady => invert_brown_conrady(coeffs, x, y, false),
            Self::ModifiedBrownConrady => invert_brown_conrady(coeffs, x, y, true),
            Self::InverseBrownConrady => brown_conrady(coeffs, x, y),
            Self::FTheta => {
                let rd = clamped_radius(x, y);
                let k = coeffs[0];
                let r = (k * rd).tan() / (2.0 * (k / 2.0).tan());
                (x * r / rd, y * r / rd)
            }
        }
    }
}
