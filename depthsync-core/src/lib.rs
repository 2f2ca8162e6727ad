//! # depthsync core
//!
//! This crate provides the types shared by every crate in the depthsync family.
//! A depth camera delivers several streams at once (depth, stereo infrared, color,
//! fisheye, and inertial samples) and each of them is identified by a [`StreamKey`].
//! Video streams carry a [`StreamGeometry`] negotiated with the device, and the
//! geometric relationship between two streams is expressed with [`Extrinsics`].
//!
//! The camera model itself lives in `depthsync-pinhole`, which implements
//! [`CameraModel`] for the intrinsics a device reports. Everything that needs to
//! move a pixel from one camera into another only depends on the trait here.
//!
//! ## Coordinate conventions
//!
//! All [`CameraPoint`]s are expressed in meters in the optical frame of a camera:
//! the positive X axis points right, positive Y axis points down, and positive Z
//! axis points forwards out of the optical center. Depth is therefore the `z`
//! component of a point, not its distance from the optical center.
//!
//! ```text
//!            Z (forward)
//!           /
//!          /
//!         O-------- X (right)
//!         |
//!         |
//!         Y (down)
//! ```
//!
//! Pixel coordinates use the same orientation: `x` grows to the right and `y`
//! grows downwards, with the center of the top-left pixel at `(0, 0)`.

mod buffers;
mod camera;
mod motion;
mod point;
mod pose;
mod stream;

pub use buffers::*;
pub use camera::*;
pub use image;
pub use motion::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use stream::*;
