use depthsync_core::{PixelFormat, StreamKey};
use log::*;
use std::time::Duration;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The requested configuration of one stream.
///
/// A zero width, height, or fps accepts whatever the device offers first.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StreamSettings {
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_enabled"))]
    pub enabled: bool,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub width: u32,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub height: u32,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub fps: u32,
    /// Overrides the format the stream is normally requested in.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub format: Option<PixelFormat>,
}

impl StreamSettings {
    pub fn video(width: u32, height: u32, fps: u32) -> Self {
        Self {
            enabled: true,
            width,
            height,
            fps,
            format: None,
        }
    }

    pub fn motion(fps: u32) -> Self {
        Self::video(0, 0, fps)
    }

    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }
}

/// Toggles for the depth post-processing stages.
///
/// The two conversions must be enabled together, and the smoothing stages
/// require them.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub depth_to_disparity: bool,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub spatial: bool,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub temporal: bool,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub disparity_to_depth: bool,
}

impl FilterSettings {
    /// Every stage enabled.
    pub fn all() -> Self {
        Self {
            depth_to_disparity: true,
            spatial: true,
            temporal: true,
            disparity_to_depth: true,
        }
    }
}

/// The settings for a depth camera node.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_depth"))]
    pub depth: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_infra"))]
    pub infra1: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_infra"))]
    pub infra2: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_color"))]
    pub color: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_fisheye"))]
    pub fisheye: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_gyro"))]
    pub gyro: StreamSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_accel"))]
    pub accel: StreamSettings,
    /// Publish depth aligned to every other enabled video stream.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub align_depth: bool,
    /// Publish point clouds built from depth.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub pointcloud: bool,
    /// Group frames captured together before dispatching them.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub sync_frames: bool,
    /// Stamp frames with the host time they were dispatched at instead of the device clock.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub host_time: bool,
    /// Seconds without video frames before the device is reacquired.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_watchdog_timeout_secs")
    )]
    pub watchdog_timeout_secs: f64,
    /// Only acquire the device with this serial number.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub serial_no: Option<String>,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub filters: FilterSettings,
    /// Meters per unit of aligned depth.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_output_depth_unit")
    )]
    pub output_depth_unit: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            infra1: default_infra(),
            infra2: default_infra(),
            color: default_color(),
            fisheye: default_fisheye(),
            gyro: default_gyro(),
            accel: default_accel(),
            align_depth: false,
            pointcloud: false,
            sync_frames: false,
            host_time: false,
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            serial_no: None,
            filters: FilterSettings::default(),
            output_depth_unit: default_output_depth_unit(),
        }
    }
}

impl Settings {
    pub fn stream(&self, key: StreamKey) -> Option<&StreamSettings> {
        Some(match key {
            StreamKey::DEPTH => &self.depth,
            StreamKey::INFRA1 => &self.infra1,
            StreamKey::INFRA2 => &self.infra2,
            StreamKey::COLOR => &self.color,
            StreamKey::FISHEYE => &self.fisheye,
            StreamKey::GYRO => &self.gyro,
            StreamKey::ACCEL => &self.accel,
            _ => return None,
        })
    }

    pub fn stream_mut(&mut self, key: StreamKey) -> Option<&mut StreamSettings> {
        Some(match key {
            StreamKey::DEPTH => &mut self.depth,
            StreamKey::INFRA1 => &mut self.infra1,
            StreamKey::INFRA2 => &mut self.infra2,
            StreamKey::COLOR => &mut self.color,
            StreamKey::FISHEYE => &mut self.fisheye,
            StreamKey::GYRO => &mut self.gyro,
            StreamKey::ACCEL => &mut self.accel,
            _ => return None,
        })
    }

    /// Whether a stream is known and enabled.
    pub fn is_enabled(&self, key: StreamKey) -> bool {
        self.stream(key).map_or(false, |stream| stream.enabled)
    }

    /// The format a stream is requested in.
    pub fn format(&self, key: StreamKey) -> PixelFormat {
        self.stream(key)
            .and_then(|stream| stream.format)
            .unwrap_or_else(|| natural_format(key))
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.watchdog_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_watchdog_timeout_secs()))
    }

    /// Applies the dependencies between options.
    ///
    /// Derived products need the frames they combine to be delivered together, and grouped
    /// frames from independently clocked sensors can only share a host stamp.
    pub fn normalized(mut self) -> Self {
        if (self.pointcloud || self.align_depth) && !self.sync_frames {
            info!("point clouds and alignment require synchronized frames, enabling sync");
            self.sync_frames = true;
        }
        if self.sync_frames && !self.host_time {
            info!("synchronized frames are stamped with host time");
            self.host_time = true;
        }
        self
    }
}

/// The format each stream is requested in unless overridden.
pub fn natural_format(key: StreamKey) -> PixelFormat {
    use depthsync_core::Modality::*;
    match key.modality {
        Depth => PixelFormat::Z16,
        Infrared => PixelFormat::Y8,
        Color => PixelFormat::Rgb8,
        Fisheye => PixelFormat::Raw8,
        Gyro | Accel => PixelFormat::MotionXyz32f,
    }
}

fn default_enabled() -> bool {
    true
}

fn default_depth() -> StreamSettings {
    StreamSettings::video(640, 480, 30)
}

fn default_infra() -> StreamSettings {
    StreamSettings::video(640, 480, 30)
}

fn default_color() -> StreamSettings {
    StreamSettings::video(640, 480, 30)
}

fn default_fisheye() -> StreamSettings {
    StreamSettings::video(640, 480, 30)
}

fn default_gyro() -> StreamSettings {
    StreamSettings::motion(200)
}

fn default_accel() -> StreamSettings {
    StreamSettings::motion(250)
}

fn default_watchdog_timeout_secs() -> f64 {
    30.0
}

fn default_output_depth_unit() -> f32 {
    0.001
}
