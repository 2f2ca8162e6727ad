//! The interface of the device collaborator.

use crate::DeviceError;
use depthsync_core::nalgebra::Vector3;
use depthsync_core::{
    DepthImage, Extrinsics, GrayImage, MotionIntrinsics, PixelFormat, RgbImage, StreamGeometry,
    StreamKey, TimestampDomain,
};
use depthsync_pinhole::Intrinsics;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub product_id: String,
}

/// A stream configuration a sensor module can deliver.
///
/// Motion profiles have zero width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamProfile {
    pub key: StreamKey,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamProfile {
    pub fn video(key: StreamKey, format: PixelFormat, width: u32, height: u32, fps: u32) -> Self {
        Self {
            key,
            format,
            width,
            height,
            fps,
        }
    }

    pub fn motion(key: StreamKey, fps: u32) -> Self {
        Self::video(key, PixelFormat::MotionXyz32f, 0, 0, fps)
    }

    pub fn geometry(&self) -> StreamGeometry {
        StreamGeometry::new(self.width, self.height, self.format, self.fps)
    }
}

/// A group of streams sharing one sensor, started and stopped together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorModule {
    pub name: String,
    pub profiles: Vec<StreamProfile>,
}

/// Pixels or samples carried by a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Depth(DepthImage),
    Color(RgbImage),
    /// Infrared and fisheye imagers.
    Gray(GrayImage),
    /// One sample of three axes.
    Motion(Vector3<f32>),
}

impl FrameData {
    /// An all-zero image laid out for `geometry`, or `None` for motion formats.
    pub fn blank(geometry: &StreamGeometry) -> Option<Self> {
        let (width, height) = (geometry.width, geometry.height);
        Some(match geometry.format {
            PixelFormat::Z16 => Self::Depth(DepthImage::new(width, height)),
            PixelFormat::Rgb8 => Self::Color(RgbImage::new(width, height)),
            PixelFormat::Y8 | PixelFormat::Raw8 => Self::Gray(GrayImage::new(width, height)),
            PixelFormat::MotionXyz32f => return None,
        })
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Depth(image) => Some(image.dimensions()),
            Self::Color(image) => Some(image.dimensions()),
            Self::Gray(image) => Some(image.dimensions()),
            Self::Motion(_) => None,
        }
    }

    /// Copies the pixels of `other` over these. Returns `false`, changing nothing,
    /// when the kinds or dimensions differ.
    pub fn copy_from(&mut self, other: &FrameData) -> bool {
        match (self, other) {
            (Self::Depth(a), Self::Depth(b)) if a.dimensions() == b.dimensions() => {
                a.copy_from_slice(b.as_raw())
            }
            (Self::Color(a), Self::Color(b)) if a.dimensions() == b.dimensions() => {
                a.copy_from_slice(b.as_raw())
            }
            (Self::Gray(a), Self::Gray(b)) if a.dimensions() == b.dimensions() => {
                a.copy_from_slice(b.as_raw())
            }
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub key: StreamKey,
    pub frame_number: u64,
    /// Device time in milliseconds.
    pub timestamp: f64,
    pub domain: TimestampDomain,
    pub data: FrameData,
}

/// One invocation of a frame sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Single(Frame),
    /// Frames captured at the same instant.
    Set(Vec<Frame>),
}

impl Delivery {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn into_frames(self) -> Vec<Frame> {
        match self {
            Self::Single(frame) => vec![frame],
            Self::Set(frames) => frames,
        }
    }
}

/// Receives deliveries on whatever thread the device produces them.
pub type FrameSink = Arc<dyn Fn(Delivery) + Send + Sync>;

/// A depth camera.
///
/// Modules are addressed by their [`SensorModule::name`].
pub trait Device: Send + Sync {
    fn info(&self) -> DeviceInfo;

    fn modules(&self) -> Vec<SensorModule>;

    /// Meters per raw unit of the depth module, valid once it is opened.
    fn depth_scale(&self, module: &str) -> Result<f32, DeviceError>;

    fn intrinsics(&self, profile: &StreamProfile) -> Result<Intrinsics, DeviceError>;

    fn motion_intrinsics(&self, profile: &StreamProfile) -> Result<MotionIntrinsics, DeviceError>;

    /// The transform moving points from the camera of `from` into the camera of `to`.
    fn extrinsics(&self, from: &StreamProfile, to: &StreamProfile)
        -> Result<Extrinsics, DeviceError>;

    fn open(&self, module: &str, profiles: &[StreamProfile]) -> Result<(), DeviceError>;

    /// Starts delivering frames of the opened profiles into `sink`.
    fn start(&self, module: &str, sink: FrameSink) -> Result<(), DeviceError>;

    fn stop(&self, module: &str) -> Result<(), DeviceError>;
}

/// Finds attached devices.
pub trait DeviceProvider: Send + Sync {
    /// The device with the given serial number, or any device when `serial` is `None`.
    fn acquire(&self, serial: Option<&str>) -> Option<Arc<dyn Device>>;
}
