use image::{ImageBuffer, Luma};

pub use image::{GrayImage, RgbImage};

/// A depth frame in raw device units, one `u16` per pixel, row-major.
///
/// A raw value of `0` always means "no measurement".
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// A disparity frame, one `f32` per pixel, row-major.
///
/// A value of `0.0` means "no measurement".
pub type DisparityImage = ImageBuffer<Luma<f32>, Vec<f32>>;
