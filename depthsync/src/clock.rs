use depthsync_core::TimestampDomain;
use log::*;
use std::time::{Duration, Instant, SystemTime};

/// Supplies the host's notion of time.
pub trait HostClock: Send + Sync {
    /// Wall-clock time used for stamps.
    fn now(&self) -> SystemTime;

    /// Monotonic time used for liveness deadlines.
    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// The operating system clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl HostClock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// How dispatched frames are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Device timestamps carried over into the host time base.
    Device,
    /// The host time at dispatch.
    Host,
}

/// A pair of simultaneous host and device times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockBase {
    pub host: SystemTime,
    /// Device time in milliseconds.
    pub device: f64,
}

impl ClockBase {
    /// The host time corresponding to a device time in milliseconds.
    pub fn map(&self, device: f64) -> SystemTime {
        let delta = device - self.device;
        let offset = Duration::try_from_secs_f64(delta.abs() / 1000.0).unwrap_or_default();
        let mapped = if delta >= 0.0 {
            self.host.checked_add(offset)
        } else {
            self.host.checked_sub(offset)
        };
        mapped.unwrap_or(self.host)
    }
}

/// Maps device timestamps onto the host clock.
///
/// The first frame, and any frame whose device time goes backwards, establishes a new
/// [`ClockBase`]. Device time going backwards means the device clock was reset.
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    source: TimeSource,
    base: Option<ClockBase>,
    previous: f64,
}

impl ClockSynchronizer {
    pub fn new(source: TimeSource) -> Self {
        Self {
            source,
            base: None,
            previous: 0.0,
        }
    }

    pub fn source(&self) -> TimeSource {
        self.source
    }

    pub fn base(&self) -> Option<ClockBase> {
        self.base
    }

    pub fn is_initialized(&self) -> bool {
        self.base.is_some()
    }

    /// Stamps a video frame taken at `device` milliseconds, rebasing if needed.
    pub fn stamp(&mut self, device: f64, domain: TimestampDomain, clock: &dyn HostClock) -> SystemTime {
        let base = match self.base {
            Some(base) if device >= self.previous => base,
            _ => {
                if !domain.is_device_clock() {
                    warn!("frame metadata is not available, timestamps come from the host clock");
                }
                let base = ClockBase {
                    host: clock.now(),
                    device,
                };
                debug!("clock base set at device time {} ms", device);
                self.base = Some(base);
                base
            }
        };
        self.previous = device;
        match self.source {
            TimeSource::Device => base.map(device),
            TimeSource::Host => clock.now(),
        }
    }

    /// Maps a device time through the current base without rebasing.
    ///
    /// Returns `None` until a video frame has established the base.
    pub fn map(&self, device: f64) -> Option<SystemTime> {
        self.base.map(|base| base.map(device))
    }
}
