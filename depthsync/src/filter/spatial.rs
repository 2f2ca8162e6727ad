use depthsync_core::DisparityImage;

/// Edge-preserving recursive smoothing.
///
/// Each pass sweeps every row left to right and back, then every column top to bottom
/// and back. A pixel is blended with its already filtered neighbor when both hold a
/// measurement and they differ by less than `delta`, so depth edges are left alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialFilter {
    pub alpha: f32,
    /// Largest disparity step still considered the same surface.
    pub delta: f32,
    pub iterations: usize,
}

impl Default for SpatialFilter {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            delta: 20.0,
            iterations: 2,
        }
    }
}

impl SpatialFilter {
    pub fn apply(&self, image: &mut DisparityImage) {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return;
        }
        let data: &mut [f32] = image;
        for _ in 0..self.iterations {
            for row in data.chunks_exact_mut(width) {
                self.sweep(row.iter_mut());
                self.sweep(row.iter_mut().rev());
            }
            for x in 0..width {
                self.sweep(data.iter_mut().skip(x).step_by(width));
                self.sweep(data.iter_mut().skip(x).step_by(width).rev());
            }
        }
    }

    fn sweep<'a>(&self, pixels: impl Iterator<Item = &'a mut f32>) {
        let mut previous = 0.0;
        for pixel in pixels {
            let current = *pixel;
            if current > 0.0 && previous > 0.0 && (current - previous).abs() < self.delta {
                *pixel = self.alpha * current + (1.0 - self.alpha) * previous;
            }
            previous = *pixel;
        }
    }
}
