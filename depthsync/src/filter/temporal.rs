use depthsync_core::DisparityImage;
use log::*;

/// Per-pixel exponential smoothing against the previous filtered frame.
///
/// History is dropped whenever the resolution changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalFilter {
    pub alpha: f32,
    /// Largest disparity change between frames still considered the same surface.
    pub delta: f32,
    previous: Option<DisparityImage>,
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            delta: 20.0,
            previous: None,
        }
    }
}

impl TemporalFilter {
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn apply(&mut self, image: &mut DisparityImage) {
        let same_size = self
            .previous
            .as_ref()
            .map_or(false, |previous| previous.dimensions() == image.dimensions());
        if !same_size {
            if self.previous.is_some() {
                debug!("resolution changed, temporal filter history reset");
            }
            self.previous = Some(image.clone());
            return;
        }
        if let Some(previous) = &mut self.previous {
            for (current, last) in image.iter_mut().zip(previous.iter()) {
                if *current > 0.0 && *last > 0.0 && (*current - *last).abs() < self.delta {
                    *current = self.alpha * *current + (1.0 - self.alpha) * *last;
                }
            }
            previous.copy_from_slice(image.as_raw());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use depthsync_core::image::Luma;

    #[test]
    fn blends_with_history() {
        let mut filter = TemporalFilter::default();
        let mut first = DisparityImage::from_pixel(2, 2, Luma([10.0]));
        filter.apply(&mut first);
        assert_eq!(first.get_pixel(0, 0).0[0], 10.0);

        let mut second = DisparityImage::from_pixel(2, 2, Luma([15.0]));
        second.put_pixel(1, 1, Luma([90.0]));
        filter.apply(&mut second);
        assert_relative_eq!(second.get_pixel(0, 0).0[0], 0.4 * 15.0 + 0.6 * 10.0);
        assert_eq!(second.get_pixel(1, 1).0[0], 90.0);
    }

    #[test]
    fn resolution_change_resets() {
        let mut filter = TemporalFilter::default();
        filter.apply(&mut DisparityImage::from_pixel(2, 2, Luma([10.0])));
        let mut other = DisparityImage::from_pixel(3, 2, Luma([15.0]));
        filter.apply(&mut other);
        assert!(other.pixels().all(|p| p.0[0] == 15.0));
    }
}
