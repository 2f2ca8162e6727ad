use depthsync::{FrameData, ImuSample, Publisher, Stamp, Topic};
use depthsync_core::{CameraPoint, DepthImage, Extrinsics, MotionIntrinsics, StreamKey};
use depthsync_pinhole::CalibrationRecord;
use depthsync_pointclouds::{OrganizedCloud, PointXyzRgb};
use log::*;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Subscribes to everything and counts what gets published on each topic.
#[derive(Default)]
pub struct TopicCounter {
    counts: Mutex<BTreeMap<String, usize>>,
}

impl TopicCounter {
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn count(&self, topic: impl ToString) {
        *self
            .counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default() += 1;
    }
}

impl Publisher for TopicCounter {
    fn has_subscribers(&self, _topic: Topic) -> bool {
        true
    }

    fn publish_image(
        &self,
        stream: StreamKey,
        stamp: Stamp,
        _image: &FrameData,
        _calibration: &CalibrationRecord,
    ) {
        trace!("{} seq {}", stream, stamp.seq);
        self.count(Topic::Image(stream));
    }

    fn publish_aligned_depth(
        &self,
        target: StreamKey,
        stamp: Stamp,
        depth: &DepthImage,
        _calibration: &CalibrationRecord,
    ) {
        let covered = depth.pixels().filter(|p| p.0[0] != 0).count();
        trace!("depth aligned to {} seq {} covers {} pixels", target, stamp.seq, covered);
        self.count(Topic::AlignedDepth(target));
    }

    fn publish_depth_cloud(&self, _time: SystemTime, cloud: &OrganizedCloud<CameraPoint>) {
        trace!("depth cloud of {}x{}", cloud.width(), cloud.height());
        self.count(Topic::DepthCloud);
    }

    fn publish_colored_cloud(&self, _time: SystemTime, cloud: &OrganizedCloud<PointXyzRgb>) {
        trace!("colored cloud of {}x{}", cloud.width(), cloud.height());
        self.count(Topic::ColoredCloud);
    }

    fn publish_extrinsics(&self, label: &str, extrinsics: &Extrinsics) {
        info!("{}: translation {:?}", label, extrinsics.translation.as_slice());
        self.count(label);
    }

    fn publish_imu(&self, sample: &ImuSample) {
        self.count(Topic::Imu(sample.stream));
    }

    fn publish_imu_info(&self, stream: StreamKey, _intrinsics: &MotionIntrinsics) {
        self.count(format!("{}/imu_info", stream));
    }
}
