//! A camera that images a tilted plane in front of a color gradient.

use depthsync::{
    Delivery, Device, DeviceError, DeviceInfo, DeviceProvider, Frame, FrameData, FrameSink,
    SensorModule, StreamProfile,
};
use depthsync_core::image::{GrayImage, Luma, Rgb, RgbImage};
use depthsync_core::nalgebra::{Rotation3, Vector3};
use depthsync_core::{
    DepthImage, Extrinsics, MotionIntrinsics, PixelFormat, StreamKey, TimestampDomain,
};
use depthsync_pinhole::Intrinsics;
use log::*;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const STEREO: &str = "Stereo Module";
const RGB: &str = "RGB Camera";
const MOTION: &str = "Motion Module";

const GYRO_FPS: u32 = 200;
const ACCEL_FPS: u32 = 250;

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Scene {
    width: u32,
    height: u32,
    epoch: Instant,
    /// Frames stop flowing after this instant until the modules are stopped.
    stall_at: Mutex<Option<Instant>>,
}

impl Scene {
    fn device_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn is_stalled(&self) -> bool {
        self.stall_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(false, |at| Instant::now() >= at)
    }

    fn frame(&self, profile: &StreamProfile, number: u64, timestamp: f64) -> Frame {
        let (width, height) = (self.width, self.height);
        let phase = (number % 64) as u16;
        let data = match profile.key.modality {
            depthsync_core::Modality::Depth => FrameData::Depth(DepthImage::from_fn(width, height, |x, y| {
                // A plane leaning away towards the top of the image, with a hole in one corner.
                if x < width / 8 && y < height / 8 {
                    Luma([0])
                } else {
                    Luma([800 + 6 * (height - y) as u16 + x as u16 + phase])
                }
            })),
            depthsync_core::Modality::Color => FrameData::Color(RgbImage::from_fn(width, height, |x, y| {
                Rgb([
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    (phase * 4) as u8,
                ])
            })),
            depthsync_core::Modality::Gyro => {
                FrameData::Motion(Vector3::new(0.0, 0.01 * phase as f32, 0.0))
            }
            depthsync_core::Modality::Accel => FrameData::Motion(Vector3::new(0.0, 9.81, 0.0)),
            _ => FrameData::Gray(GrayImage::from_fn(width, height, |x, _| {
                Luma([(x * 255 / width.max(1)) as u8])
            })),
        };
        Frame {
            key: profile.key,
            frame_number: number,
            timestamp,
            domain: TimestampDomain::HardwareClock,
            data,
        }
    }
}

/// A depth camera with a stereo module, a color camera, and an IMU that renders its frames
/// on one thread per started module.
pub struct SyntheticDevice {
    fps: u32,
    scene: Arc<Scene>,
    opened: Mutex<BTreeMap<String, Vec<StreamProfile>>>,
    workers: Mutex<BTreeMap<String, Worker>>,
}

impl SyntheticDevice {
    pub fn new(width: u32, height: u32, fps: u32, stall_after: Option<Duration>) -> Self {
        let epoch = Instant::now();
        Self {
            fps: fps.max(1),
            scene: Arc::new(Scene {
                width,
                height,
                epoch,
                stall_at: Mutex::new(stall_after.map(|after| epoch + after)),
            }),
            opened: Mutex::new(BTreeMap::new()),
            workers: Mutex::new(BTreeMap::new()),
        }
    }

    fn intrinsics_for(&self, width: u32, height: u32) -> Intrinsics {
        Intrinsics::centered(width, height, width as f32 * 0.9)
    }
}

impl Device for SyntheticDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Synthetic D400".to_owned(),
            serial_number: "000000000001".to_owned(),
            firmware_version: "0.1.0".to_owned(),
            product_id: "0000".to_owned(),
        }
    }

    fn modules(&self) -> Vec<SensorModule> {
        let (width, height, fps) = (self.scene.width, self.scene.height, self.fps);
        vec![
            SensorModule {
                name: STEREO.to_owned(),
                profiles: vec![
                    StreamProfile::video(StreamKey::DEPTH, PixelFormat::Z16, width, height, fps),
                    StreamProfile::video(StreamKey::INFRA1, PixelFormat::Y8, width, height, fps),
                    StreamProfile::video(StreamKey::INFRA2, PixelFormat::Y8, width, height, fps),
                ],
            },
            SensorModule {
                name: RGB.to_owned(),
                profiles: vec![StreamProfile::video(
                    StreamKey::COLOR,
                    PixelFormat::Rgb8,
                    width,
                    height,
                    fps,
                )],
            },
            SensorModule {
                name: MOTION.to_owned(),
                profiles: vec![
                    StreamProfile::motion(StreamKey::GYRO, GYRO_FPS),
                    StreamProfile::motion(StreamKey::ACCEL, ACCEL_FPS),
                ],
            },
        ]
    }

    fn depth_scale(&self, _module: &str) -> Result<f32, DeviceError> {
        Ok(0.001)
    }

    fn intrinsics(&self, profile: &StreamProfile) -> Result<Intrinsics, DeviceError> {
        Ok(self.intrinsics_for(profile.width, profile.height))
    }

    fn motion_intrinsics(&self, _profile: &StreamProfile) -> Result<MotionIntrinsics, DeviceError> {
        Ok(MotionIntrinsics::default())
    }

    fn extrinsics(&self, _from: &StreamProfile, to: &StreamProfile) -> Result<Extrinsics, DeviceError> {
        let translation = match to.key {
            StreamKey::INFRA2 => Vector3::new(-0.05, 0.0, 0.0),
            StreamKey::COLOR => Vector3::new(0.015, 0.0, 0.0),
            _ => Vector3::zeros(),
        };
        Ok(Extrinsics::new(Rotation3::identity(), translation))
    }

    fn open(&self, module: &str, profiles: &[StreamProfile]) -> Result<(), DeviceError> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.to_owned(), profiles.to_vec());
        Ok(())
    }

    fn start(&self, module: &str, sink: FrameSink) -> Result<(), DeviceError> {
        let profiles = self
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .cloned()
            .ok_or_else(|| DeviceError::new(format!("{} is not open", module)))?;
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if workers.contains_key(module) {
            return Err(DeviceError::new(format!("{} is already streaming", module)));
        }

        let fps = profiles.iter().map(|profile| profile.fps).max().unwrap_or(self.fps);
        let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let grouped = module == STEREO;
        let scene = self.scene.clone();
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(format!("synthetic-{}", module))
            .spawn(move || {
                let mut number = 0u64;
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(period) {
                    if scene.is_stalled() {
                        continue;
                    }
                    number += 1;
                    let timestamp = scene.device_time();
                    let frames = profiles
                        .iter()
                        .map(|profile| scene.frame(profile, number, timestamp));
                    if grouped {
                        sink(Delivery::Set(frames.collect()));
                    } else {
                        frames.for_each(|frame| sink(Delivery::Single(frame)));
                    }
                }
            })
            .map_err(|e| DeviceError::new(e.to_string()))?;
        workers.insert(module.to_owned(), Worker { stop, handle });
        debug!("{} streaming at {:?} per frame", module, period);
        Ok(())
    }

    fn stop(&self, module: &str) -> Result<(), DeviceError> {
        let worker = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(module)
            .ok_or_else(|| DeviceError::new(format!("{} is not streaming", module)))?;
        drop(worker.stop);
        worker
            .handle
            .join()
            .map_err(|_| DeviceError::new(format!("{} worker panicked", module)))?;
        // A reset clears the stall.
        *self.scene.stall_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Hands out the one synthetic device.
pub struct Attached(pub Arc<SyntheticDevice>);

impl DeviceProvider for Attached {
    fn acquire(&self, serial: Option<&str>) -> Option<Arc<dyn Device>> {
        match serial {
            Some(serial) if serial != self.0.info().serial_number => None,
            _ => Some(self.0.clone()),
        }
    }
}
