use core::fmt;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The kind of data a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Modality {
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
}

impl Modality {
    pub fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Color => "color",
            Self::Infrared => "infra",
            Self::Fisheye => "fisheye",
            Self::Gyro => "gyro",
            Self::Accel => "accel",
        }
    }

    pub fn is_motion(self) -> bool {
        matches!(self, Self::Gyro | Self::Accel)
    }
}

/// Identifies one stream of a device: its modality plus an index that
/// distinguishes repeated modalities such as the two infrared imagers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct StreamKey {
    pub modality: Modality,
    pub index: u8,
}

impl StreamKey {
    pub const DEPTH: Self = Self::new(Modality::Depth, 0);
    pub const INFRA1: Self = Self::new(Modality::Infrared, 1);
    pub const INFRA2: Self = Self::new(Modality::Infrared, 2);
    pub const COLOR: Self = Self::new(Modality::Color, 0);
    pub const FISHEYE: Self = Self::new(Modality::Fisheye, 0);
    pub const GYRO: Self = Self::new(Modality::Gyro, 0);
    pub const ACCEL: Self = Self::new(Modality::Accel, 0);

    /// Every video stream, depth first.
    pub const VIDEO: [Self; 5] = [
        Self::DEPTH,
        Self::INFRA1,
        Self::INFRA2,
        Self::COLOR,
        Self::FISHEYE,
    ];

    pub const MOTION: [Self; 2] = [Self::GYRO, Self::ACCEL];

    pub const fn new(modality: Modality, index: u8) -> Self {
        Self { modality, index }
    }

    pub fn is_depth(self) -> bool {
        self.modality == Modality::Depth
    }

    pub fn is_motion(self) -> bool {
        self.modality.is_motion()
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 && self.modality != Modality::Infrared {
            write!(f, "{}", self.modality.name())
        } else {
            write!(f, "{}{}", self.modality.name(), self.index)
        }
    }
}

/// Pixel layout of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum PixelFormat {
    /// 16-bit depth in device units.
    Z16,
    /// 8-bit luminance.
    Y8,
    Rgb8,
    /// 8-bit raw sensor values, used by fisheye imagers.
    Raw8,
    /// Three `f32` axes per sample.
    MotionXyz32f,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Z16 => 2,
            Self::Y8 | Self::Raw8 => 1,
            Self::Rgb8 => 3,
            Self::MotionXyz32f => 12,
        }
    }
}

/// Negotiated size and layout of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fps: u32,
}

impl StreamGeometry {
    pub fn new(width: u32, height: u32, format: PixelFormat, fps: u32) -> Self {
        Self {
            width,
            height,
            format,
            fps,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Bytes per image row.
    pub fn row_step(&self) -> u32 {
        self.width * self.bytes_per_pixel()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Which clock a frame timestamp was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum TimestampDomain {
    /// The device's own clock, in milliseconds since an arbitrary epoch.
    HardwareClock,
    /// The host's clock, stamped when the frame reached the driver.
    SystemTime,
    /// The device clock translated into the host time base by the driver.
    GlobalTime,
}

impl TimestampDomain {
    /// Whether timestamps in this domain were taken on the device.
    pub fn is_device_clock(self) -> bool {
        !matches!(self, Self::SystemTime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names() {
        let names: Vec<String> = StreamKey::VIDEO
            .iter()
            .chain(StreamKey::MOTION.iter())
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            names,
            ["depth", "infra1", "infra2", "color", "fisheye", "gyro", "accel"]
        );
    }

    #[test]
    fn geometry_steps() {
        let geometry = StreamGeometry::new(640, 480, PixelFormat::Z16, 30);
        assert_eq!(geometry.row_step(), 1280);
        assert_eq!(geometry.pixel_count(), 307_200);
        assert_eq!(StreamGeometry::new(4, 2, PixelFormat::Rgb8, 0).row_step(), 12);
    }
}
