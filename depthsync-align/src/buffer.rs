use core::sync::atomic::{AtomicU16, Ordering};
use depthsync_core::image::{ImageBuffer, Luma};
use depthsync_core::DepthImage;

/// Value of an aligned pixel that received no depth.
pub const NO_DEPTH: u16 = 0;

/// Depth samples on a target camera's pixel grid.
///
/// Rows of a source frame are splatted concurrently, so samples are stored atomically.
/// A sample is only ever overwritten as a whole; there is no ordering between writers.
#[derive(Debug)]
pub struct AlignedBuffer {
    width: u32,
    height: u32,
    samples: Vec<AtomicU16>,
}

impl AlignedBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: (0..width as usize * height as usize)
                .map(|_| AtomicU16::new(NO_DEPTH))
                .collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resets every sample to [`NO_DEPTH`].
    pub fn clear(&mut self) {
        for sample in &mut self.samples {
            *sample.get_mut() = NO_DEPTH;
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.samples[self.index(x, y)].load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self, x: u32, y: u32, value: u16) {
        self.samples[self.index(x, y)].store(value, Ordering::Relaxed);
    }

    /// Copies the samples out into a depth image.
    pub fn to_image(&self) -> DepthImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| Luma([self.get(x, y)]))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
