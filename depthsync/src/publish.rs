//! The interface of the publishing collaborator.

use crate::FrameData;
use depthsync_core::nalgebra::Vector3;
use depthsync_core::{CameraPoint, DepthImage, Extrinsics, MotionIntrinsics, StreamKey};
use depthsync_pinhole::CalibrationRecord;
use depthsync_pointclouds::{OrganizedCloud, PointXyzRgb};
use std::fmt;
use std::time::SystemTime;

/// Everything a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    Image(StreamKey),
    /// Depth aligned to the given stream.
    AlignedDepth(StreamKey),
    DepthCloud,
    ColoredCloud,
    Imu(StreamKey),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(key) if key.is_depth() || key.modality == depthsync_core::Modality::Infrared => {
                write!(f, "{}/image_rect_raw", key)
            }
            Self::Image(key) => write!(f, "{}/image_raw", key),
            Self::AlignedDepth(key) => write!(f, "aligned_depth_to_{}/image_raw", key),
            Self::DepthCloud => write!(f, "depth/points"),
            Self::ColoredCloud => write!(f, "depth/color/points"),
            Self::Imu(key) => write!(f, "{}/sample", key),
        }
    }
}

/// Header shared by every per-frame message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub time: SystemTime,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImuReading {
    /// Radians per second.
    AngularVelocity(Vector3<f32>),
    /// Meters per second squared.
    LinearAcceleration(Vector3<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub stream: StreamKey,
    pub stamp: Stamp,
    pub reading: ImuReading,
}

/// Hands products to consumers. Implementations must not block for long; they are called
/// while a dispatch holds the pipeline.
pub trait Publisher: Send + Sync {
    fn has_subscribers(&self, topic: Topic) -> bool;

    fn publish_image(
        &self,
        stream: StreamKey,
        stamp: Stamp,
        image: &FrameData,
        calibration: &CalibrationRecord,
    );

    /// Depth aligned to `target`, described by the target's calibration.
    fn publish_aligned_depth(
        &self,
        target: StreamKey,
        stamp: Stamp,
        depth: &DepthImage,
        calibration: &CalibrationRecord,
    );

    fn publish_depth_cloud(&self, time: SystemTime, cloud: &OrganizedCloud<CameraPoint>);

    fn publish_colored_cloud(&self, time: SystemTime, cloud: &OrganizedCloud<PointXyzRgb>);

    /// Published once per pipeline, labeled `depth_to_<stream>_extrinsics`.
    fn publish_extrinsics(&self, label: &str, extrinsics: &Extrinsics);

    fn publish_imu(&self, sample: &ImuSample);

    /// Published once per pipeline.
    fn publish_imu_info(&self, stream: StreamKey, intrinsics: &MotionIntrinsics);
}
