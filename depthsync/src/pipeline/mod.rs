//! Everything that lives as long as one device configuration.

mod dispatch;

pub use dispatch::Context;

use crate::{
    ClockSynchronizer, Device, DeviceError, DeviceInfo, Error, FilterChain, FilterSettings,
    FrameArrivalTracker, FrameData, FrameSyncer, HealthWatchdog, Publisher, Result,
    SensorModule, Settings, StreamProfile, StreamingError, TimeSource,
};
use crate::filter::DisparityConverter;
use depthsync_align::{AlignedBuffer, Reprojector};
use depthsync_core::{Extrinsics, MotionIntrinsics, StreamGeometry, StreamKey};
use depthsync_pinhole::{CalibrationRecord, Intrinsics};
use depthsync_pointclouds::PointCloudBuilder;
use log::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// The streams each supported sensor module serves.
pub fn module_streams(name: &str) -> Option<&'static [StreamKey]> {
    let streams: &'static [StreamKey] = match name {
        "Stereo Module" => &[StreamKey::DEPTH, StreamKey::INFRA1, StreamKey::INFRA2],
        "Coded-Light Depth Sensor" => &[StreamKey::DEPTH, StreamKey::INFRA1],
        "RGB Camera" => &[StreamKey::COLOR],
        "Wide FOV Camera" => &[StreamKey::FISHEYE],
        "Motion Module" => &[StreamKey::GYRO, StreamKey::ACCEL],
        _ => return None,
    };
    Some(streams)
}

/// Streams that receive depth extrinsics, in publication order.
const EXTRINSICS_TARGETS: [StreamKey; 4] = [
    StreamKey::FISHEYE,
    StreamKey::COLOR,
    StreamKey::INFRA1,
    StreamKey::INFRA2,
];

struct VideoStream {
    profile: StreamProfile,
    intrinsics: Intrinsics,
    calibration: CalibrationRecord,
    /// The most recently delivered frame, after filtering.
    buffer: FrameData,
}

struct MotionStream {
    intrinsics: MotionIntrinsics,
}

struct Alignment {
    reprojector: Reprojector,
    buffer: AlignedBuffer,
}

/// The negotiated streams, calibration, buffers, and per-stream state of one device
/// configuration.
///
/// A pipeline is never reconfigured in place. Recovery builds a new one.
pub struct Pipeline {
    device: Arc<dyn Device>,
    info: DeviceInfo,
    settings: Settings,
    modules: Vec<String>,
    video: BTreeMap<StreamKey, VideoStream>,
    motion: BTreeMap<StreamKey, MotionStream>,
    depth_scale: f32,
    extrinsics: BTreeMap<StreamKey, Extrinsics>,
    alignments: BTreeMap<StreamKey, Alignment>,
    clouds: Option<PointCloudBuilder>,
    filters: FilterChain,
    clock: ClockSynchronizer,
    arrivals: FrameArrivalTracker,
    syncer: Option<FrameSyncer>,
    sequences: BTreeMap<StreamKey, u64>,
    aligned_sequences: BTreeMap<StreamKey, u64>,
    watchdog: HealthWatchdog,
    streaming: bool,
}

impl Pipeline {
    /// Negotiates streams with the device, opens the sensor modules, and prepares every
    /// buffer the configuration needs.
    pub fn build(device: Arc<dyn Device>, settings: &Settings) -> Result<Self> {
        let info = device.info();
        info!("device name: {}", info.name);
        info!("device serial no: {}", info.serial_number);
        info!("device firmware version: {}", info.firmware_version);
        info!("device product id: 0x{}", info.product_id);
        info!(
            "point cloud: {}, align depth: {}, sync mode: {}",
            on_off(settings.pointcloud),
            on_off(settings.align_depth),
            on_off(settings.sync_frames)
        );

        let modules = device.modules();
        let selected = negotiate(&modules, settings)?;

        let mut opened: Vec<(String, Vec<StreamProfile>)> = Vec::new();
        for (module, profile) in &selected {
            match opened.iter_mut().find(|(name, _)| name == *module) {
                Some((_, profiles)) => profiles.push(*profile),
                None => opened.push((module.to_string(), vec![*profile])),
            }
        }
        for (module, profiles) in &opened {
            device.open(module, profiles)?;
            debug!("opened {} with {} profiles", module, profiles.len());
        }

        let depth = selected.iter().find(|(_, profile)| profile.key.is_depth());
        let depth_scale = match depth {
            Some((module, _)) => device.depth_scale(module)?,
            None => 0.0,
        };

        let mut video = BTreeMap::new();
        let mut motion = BTreeMap::new();
        for &(_, profile) in &selected {
            let key = profile.key;
            if key.is_motion() {
                let intrinsics = device.motion_intrinsics(&profile)?;
                motion.insert(key, MotionStream { intrinsics });
                continue;
            }
            let intrinsics = device.intrinsics(&profile)?;
            if (intrinsics.width, intrinsics.height) != (profile.width, profile.height) {
                return Err(Error::CalibrationMismatch(key));
            }
            let buffer = FrameData::blank(&profile.geometry()).ok_or(Error::FrameMismatch(key))?;
            video.insert(
                key,
                VideoStream {
                    profile,
                    calibration: intrinsics.calibration(),
                    intrinsics,
                    buffer,
                },
            );
        }

        let mut extrinsics = BTreeMap::new();
        if let Some((_, depth)) = depth {
            for key in EXTRINSICS_TARGETS {
                if let Some(stream) = video.get(&key) {
                    extrinsics.insert(key, device.extrinsics(depth, &stream.profile)?);
                }
            }
        }

        let depth_intrinsics = video.get(&StreamKey::DEPTH).map(|stream| stream.intrinsics);
        let converter = match depth_intrinsics {
            Some(intrinsics) => {
                let baseline = extrinsics
                    .get(&StreamKey::INFRA2)
                    .map(Extrinsics::baseline)
                    .filter(|&baseline| baseline > 0.0)
                    .unwrap_or(1.0);
                DisparityConverter::from_calibration(intrinsics.fx, baseline, depth_scale)
            }
            None => DisparityConverter::new(1.0),
        };
        let filters = FilterChain::new(settings.filters, converter)?;

        let mut alignments = BTreeMap::new();
        if let (true, Some(source)) = (settings.align_depth, depth_intrinsics) {
            for (&key, stream) in video.iter().filter(|(key, _)| !key.is_depth()) {
                if let Some(&extrinsics) = extrinsics.get(&key) {
                    let reprojector =
                        Reprojector::new(source, stream.intrinsics, extrinsics, depth_scale)
                            .output_unit(settings.output_depth_unit);
                    let buffer = reprojector.buffer();
                    alignments.insert(key, Alignment { reprojector, buffer });
                }
            }
        }

        let clouds = depth_intrinsics
            .filter(|_| settings.pointcloud)
            .map(|intrinsics| PointCloudBuilder::new(intrinsics, depth_scale));

        let syncer = settings.sync_frames.then(|| {
            FrameSyncer::new(
                video
                    .values()
                    .map(|stream| (stream.profile.key, stream.profile.fps)),
            )
        });

        let source = if settings.host_time {
            TimeSource::Host
        } else {
            TimeSource::Device
        };

        Ok(Self {
            arrivals: FrameArrivalTracker::new(video.keys().copied()),
            sequences: video.keys().chain(motion.keys()).map(|&key| (key, 0)).collect(),
            aligned_sequences: alignments.keys().map(|&key| (key, 0)).collect(),
            device,
            info,
            settings: settings.clone(),
            modules: opened.into_iter().map(|(module, _)| module).collect(),
            video,
            motion,
            depth_scale,
            extrinsics,
            alignments,
            clouds,
            filters,
            clock: ClockSynchronizer::new(source),
            syncer,
            watchdog: HealthWatchdog::new(settings.watchdog_timeout()),
            streaming: false,
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn device(&self) -> Arc<dyn Device> {
        self.device.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The opened sensor modules.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Negotiated video streams.
    pub fn streams(&self) -> impl Iterator<Item = StreamKey> + '_ {
        self.video.keys().copied()
    }

    pub fn motion_streams(&self) -> impl Iterator<Item = StreamKey> + '_ {
        self.motion.keys().copied()
    }

    pub fn geometry(&self, key: StreamKey) -> Option<StreamGeometry> {
        self.video.get(&key).map(|stream| stream.profile.geometry())
    }

    pub fn intrinsics(&self, key: StreamKey) -> Option<&Intrinsics> {
        self.video.get(&key).map(|stream| &stream.intrinsics)
    }

    /// Meters per raw depth unit.
    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    /// Extrinsics from depth to `key`.
    pub fn extrinsics(&self, key: StreamKey) -> Option<&Extrinsics> {
        self.extrinsics.get(&key)
    }

    pub fn clock(&self) -> &ClockSynchronizer {
        &self.clock
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn configure_filters(&mut self, settings: FilterSettings) -> Result<()> {
        self.filters.configure(settings)
    }

    pub fn watchdog(&self) -> &HealthWatchdog {
        &self.watchdog
    }

    /// Frames published for a stream so far.
    pub fn sequence(&self, key: StreamKey) -> u64 {
        self.sequences.get(&key).copied().unwrap_or(0)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool, now: Instant) {
        self.streaming = streaming;
        if streaming {
            self.watchdog.arm(now);
        } else {
            self.watchdog.disarm();
        }
    }

    pub(crate) fn poll_watchdog(&mut self, now: Instant) -> bool {
        self.watchdog.poll(now)
    }

    /// Publishes what only changes with the configuration.
    pub fn publish_static(&self, publisher: &dyn Publisher) {
        for (key, extrinsics) in &self.extrinsics {
            let label = format!("depth_to_{}_extrinsics", key);
            debug!("publishing {}", label);
            publisher.publish_extrinsics(&label, extrinsics);
        }
        for (&key, stream) in &self.motion {
            publisher.publish_imu_info(key, &stream.intrinsics);
        }
    }

    /// Stops every opened module, continuing past failures.
    pub fn stop_modules(&self) -> Result<(), StreamingError> {
        for_each_module(&self.modules, "stop", |module| self.device.stop(module))
    }
}

/// Runs `f` on every module, collecting the failures.
pub(crate) fn for_each_module(
    modules: &[String],
    action: &'static str,
    mut f: impl FnMut(&str) -> Result<(), DeviceError>,
) -> Result<(), StreamingError> {
    let failures: Vec<_> = modules
        .iter()
        .filter_map(|module| match f(module) {
            Ok(()) => {
                debug!("{} {}", action, module);
                None
            }
            Err(e) => {
                error!("failed to {} {}: {}", action, module, e);
                Some((module.clone(), e))
            }
        })
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(StreamingError { action, failures })
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Picks a profile for every enabled stream some module serves.
fn negotiate<'a>(
    modules: &'a [SensorModule],
    settings: &Settings,
) -> Result<Vec<(&'a str, StreamProfile)>> {
    let mut owners: BTreeMap<StreamKey, &SensorModule> = BTreeMap::new();
    for module in modules {
        let streams = module_streams(&module.name)
            .ok_or_else(|| Error::UnsupportedModule(module.name.clone()))?;
        for &key in streams {
            owners.insert(key, module);
        }
        info!("{} was found", module.name);
    }

    let accepts = |wanted: u32, offered: u32| wanted == 0 || wanted == offered;
    let mut selected = Vec::new();
    for key in StreamKey::VIDEO.into_iter().chain(StreamKey::MOTION) {
        let requested = match settings.stream(key) {
            Some(requested) if requested.enabled => requested,
            _ => continue,
        };
        let Some(module) = owners.get(&key) else {
            info!("{} sensor is not supported by the current device, skipping", key);
            continue;
        };
        let format = settings.format(key);
        let found = module.profiles.iter().find(|profile| {
            profile.key == key
                && profile.format == format
                && accepts(requested.width, profile.width)
                && accepts(requested.height, profile.height)
                && accepts(requested.fps, profile.fps)
        });
        match found {
            Some(profile) => {
                info!(
                    "{} stream is enabled - width: {}, height: {}, fps: {}",
                    key, profile.width, profile.height, profile.fps
                );
                selected.push((module.name.as_str(), *profile));
            }
            None => warn!(
                "given {} stream configuration is not supported by the device: format {:?}, width {}, height {}, fps {}",
                key, format, requested.width, requested.height, requested.fps
            ),
        }
    }

    let has_video = selected.iter().any(|(_, profile)| !profile.key.is_motion());
    let has_depth = selected.iter().any(|(_, profile)| profile.key.is_depth());
    if has_video && !has_depth {
        return Err(Error::MissingDepthProfile);
    }
    Ok(selected)
}
