#![allow(dead_code)]

use depthsync::*;
use depthsync_core::image::{Luma, Rgb};
use depthsync_core::nalgebra::Vector3;
use depthsync_core::{
    CameraPoint, DepthImage, Extrinsics, GrayImage, MotionIntrinsics, PixelFormat, RgbImage,
    StreamKey, TimestampDomain,
};
use depthsync_pinhole::{CalibrationRecord, Intrinsics};
use depthsync_pointclouds::{OrganizedCloud, PointXyzRgb};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;
pub const STEREO: &str = "Stereo Module";
pub const RGB: &str = "RGB Camera";
pub const MOTION: &str = "Motion Module";

pub fn init_logging() {
    let _ = pretty_env_logger::try_init_timed();
}

/// A host clock that only moves when told to.
pub struct ManualClock {
    wall: Mutex<SystemTime>,
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            wall: Mutex::new(UNIX_EPOCH + Duration::from_secs(1000)),
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        })
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn wall_start(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1000)
    }

    pub fn advance(&self, by: Duration) {
        *self.wall.lock().unwrap() += by;
        *self.elapsed.lock().unwrap() += by;
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.wall.lock().unwrap()
    }

    fn monotonic(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap()
    }
}

pub fn intrinsics(width: u32, height: u32) -> Intrinsics {
    Intrinsics::new(width, height, 8.0, 8.0, 3.5, 2.5)
}

/// A camera with a stereo depth module, a color camera, and an IMU.
pub struct MockDevice {
    pub modules: Vec<SensorModule>,
    pub sinks: Mutex<BTreeMap<String, FrameSink>>,
    pub opened: Mutex<Vec<(String, Vec<StreamProfile>)>>,
    pub stopped: Mutex<Vec<String>>,
    pub failing: Option<String>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_modules(vec![
            SensorModule {
                name: STEREO.to_owned(),
                profiles: vec![
                    StreamProfile::video(StreamKey::DEPTH, PixelFormat::Z16, WIDTH, HEIGHT, 30),
                    StreamProfile::video(StreamKey::INFRA1, PixelFormat::Y8, WIDTH, HEIGHT, 30),
                    StreamProfile::video(StreamKey::INFRA2, PixelFormat::Y8, WIDTH, HEIGHT, 30),
                ],
            },
            SensorModule {
                name: RGB.to_owned(),
                profiles: vec![
                    StreamProfile::video(StreamKey::COLOR, PixelFormat::Rgb8, WIDTH, HEIGHT, 30),
                    StreamProfile::video(StreamKey::COLOR, PixelFormat::Rgb8, WIDTH, HEIGHT, 15),
                ],
            },
            SensorModule {
                name: MOTION.to_owned(),
                profiles: vec![
                    StreamProfile::motion(StreamKey::GYRO, 200),
                    StreamProfile::motion(StreamKey::ACCEL, 250),
                ],
            },
        ])
    }

    pub fn with_modules(modules: Vec<SensorModule>) -> Self {
        Self {
            modules,
            sinks: Mutex::new(BTreeMap::new()),
            opened: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            failing: None,
        }
    }

    pub fn failing(mut self, module: &str) -> Self {
        self.failing = Some(module.to_owned());
        self
    }

    /// The sink a module currently delivers into.
    pub fn sink(&self, module: &str) -> FrameSink {
        self.sinks.lock().unwrap()[module].clone()
    }

    pub fn deliver(&self, module: &str, delivery: Delivery) {
        (self.sink(module))(delivery)
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

impl Device for MockDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Mock D400".to_owned(),
            serial_number: "0001".to_owned(),
            firmware_version: "5.13.0".to_owned(),
            product_id: "0b07".to_owned(),
        }
    }

    fn modules(&self) -> Vec<SensorModule> {
        self.modules.clone()
    }

    fn depth_scale(&self, _module: &str) -> Result<f32, DeviceError> {
        Ok(0.001)
    }

    fn intrinsics(&self, profile: &StreamProfile) -> Result<Intrinsics, DeviceError> {
        Ok(intrinsics(profile.width, profile.height))
    }

    fn motion_intrinsics(&self, _profile: &StreamProfile) -> Result<MotionIntrinsics, DeviceError> {
        Ok(MotionIntrinsics::default())
    }

    fn extrinsics(&self, _from: &StreamProfile, to: &StreamProfile) -> Result<Extrinsics, DeviceError> {
        Ok(if to.key == StreamKey::INFRA2 {
            Extrinsics::from_column_major(
                [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                [-0.05, 0.0, 0.0],
            )
        } else {
            Extrinsics::identity()
        })
    }

    fn open(&self, module: &str, profiles: &[StreamProfile]) -> Result<(), DeviceError> {
        self.opened
            .lock()
            .unwrap()
            .push((module.to_owned(), profiles.to_vec()));
        Ok(())
    }

    fn start(&self, module: &str, sink: FrameSink) -> Result<(), DeviceError> {
        if self.failing.as_deref() == Some(module) {
            return Err(DeviceError::new("usb transfer failed"));
        }
        self.sinks.lock().unwrap().insert(module.to_owned(), sink);
        Ok(())
    }

    fn stop(&self, module: &str) -> Result<(), DeviceError> {
        self.stopped.lock().unwrap().push(module.to_owned());
        Ok(())
    }
}

/// Hands out the attached device, if any, and counts acquisitions.
#[derive(Default)]
pub struct MockProvider {
    device: Mutex<Option<Arc<MockDevice>>>,
    acquisitions: AtomicUsize,
}

impl MockProvider {
    pub fn with(device: Arc<MockDevice>) -> Arc<Self> {
        let provider = Self::default();
        provider.attach(device);
        Arc::new(provider)
    }

    pub fn attach(&self, device: Arc<MockDevice>) {
        *self.device.lock().unwrap() = Some(device);
    }

    pub fn detach(&self) {
        *self.device.lock().unwrap() = None;
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl DeviceProvider for MockProvider {
    fn acquire(&self, serial: Option<&str>) -> Option<Arc<dyn Device>> {
        let device = self.device.lock().unwrap().clone()?;
        if serial.map_or(false, |serial| serial != device.info().serial_number) {
            return None;
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Some(device)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Image { stream: StreamKey, seq: u64, time: SystemTime },
    Aligned { target: StreamKey, seq: u64, depth: DepthImage, width: u32 },
    DepthCloud(OrganizedCloud<CameraPoint>),
    ColoredCloud(OrganizedCloud<PointXyzRgb>),
    Extrinsics(String),
    Imu(ImuSample),
    ImuInfo(StreamKey),
}

/// Records everything published to the topics it subscribes to.
pub struct Recorder {
    topics: Option<BTreeSet<Topic>>,
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn everything() -> Arc<Self> {
        Arc::new(Self {
            topics: None,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn only(topics: impl IntoIterator<Item = Topic>) -> Arc<Self> {
        Arc::new(Self {
            topics: Some(topics.into_iter().collect()),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Publisher for Recorder {
    fn has_subscribers(&self, topic: Topic) -> bool {
        self.topics.as_ref().map_or(true, |topics| topics.contains(&topic))
    }

    fn publish_image(&self, stream: StreamKey, stamp: Stamp, _: &FrameData, _: &CalibrationRecord) {
        self.record(Event::Image {
            stream,
            seq: stamp.seq,
            time: stamp.time,
        });
    }

    fn publish_aligned_depth(
        &self,
        target: StreamKey,
        stamp: Stamp,
        depth: &DepthImage,
        calibration: &CalibrationRecord,
    ) {
        self.record(Event::Aligned {
            target,
            seq: stamp.seq,
            depth: depth.clone(),
            width: calibration.width,
        });
    }

    fn publish_depth_cloud(&self, _: SystemTime, cloud: &OrganizedCloud<CameraPoint>) {
        self.record(Event::DepthCloud(cloud.clone()));
    }

    fn publish_colored_cloud(&self, _: SystemTime, cloud: &OrganizedCloud<PointXyzRgb>) {
        self.record(Event::ColoredCloud(cloud.clone()));
    }

    fn publish_extrinsics(&self, label: &str, _: &Extrinsics) {
        self.record(Event::Extrinsics(label.to_owned()));
    }

    fn publish_imu(&self, sample: &ImuSample) {
        self.record(Event::Imu(*sample));
    }

    fn publish_imu_info(&self, stream: StreamKey, _: &MotionIntrinsics) {
        self.record(Event::ImuInfo(stream));
    }
}

/// Depth and color at the mock resolution, everything else off.
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    for key in StreamKey::VIDEO.into_iter().chain(StreamKey::MOTION) {
        if let Some(stream) = settings.stream_mut(key) {
            stream.enabled = false;
        }
    }
    settings.depth = StreamSettings::video(WIDTH, HEIGHT, 30);
    settings.color = StreamSettings::video(WIDTH, HEIGHT, 30);
    settings.watchdog_timeout_secs = 1.0;
    settings
}

pub fn depth_frame(number: u64, timestamp: f64, value: u16) -> Frame {
    Frame {
        key: StreamKey::DEPTH,
        frame_number: number,
        timestamp,
        domain: TimestampDomain::HardwareClock,
        data: FrameData::Depth(DepthImage::from_pixel(WIDTH, HEIGHT, Luma([value]))),
    }
}

pub fn color_frame(number: u64, timestamp: f64, rgb: [u8; 3]) -> Frame {
    Frame {
        key: StreamKey::COLOR,
        frame_number: number,
        timestamp,
        domain: TimestampDomain::HardwareClock,
        data: FrameData::Color(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(rgb))),
    }
}

pub fn infra_frame(number: u64, timestamp: f64) -> Frame {
    Frame {
        key: StreamKey::INFRA1,
        frame_number: number,
        timestamp,
        domain: TimestampDomain::HardwareClock,
        data: FrameData::Gray(GrayImage::new(WIDTH, HEIGHT)),
    }
}

pub fn gyro_frame(number: u64, timestamp: f64) -> Frame {
    Frame {
        key: StreamKey::GYRO,
        frame_number: number,
        timestamp,
        domain: TimestampDomain::HardwareClock,
        data: FrameData::Motion(Vector3::new(0.0, 0.0, 0.5)),
    }
}

/// A node over a fresh mock device with every topic subscribed.
pub fn node(settings: Settings) -> (Node, Arc<MockDevice>, Arc<MockProvider>, Arc<Recorder>, Arc<ManualClock>) {
    node_with(settings, MockDevice::new(), Recorder::everything())
}

pub fn node_with(
    settings: Settings,
    device: MockDevice,
    recorder: Arc<Recorder>,
) -> (Node, Arc<MockDevice>, Arc<MockProvider>, Arc<Recorder>, Arc<ManualClock>) {
    init_logging();
    let device = Arc::new(device);
    let provider = MockProvider::with(device.clone());
    let clock = ManualClock::new();
    let node = Node::new(settings, provider.clone(), recorder.clone(), clock.clone())
        .expect("node setup failed");
    (node, device, provider, recorder, clock)
}
