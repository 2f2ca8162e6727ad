//! The long-lived owner of the device lifecycle.

use crate::pipeline::{for_each_module, Context};
use crate::{
    DeviceInfo, DeviceProvider, FilterSettings, FrameSink, HostClock, Pipeline, Publisher, Result,
    Settings, WatchdogState,
};
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Shared {
    settings: Settings,
    filters: Mutex<FilterSettings>,
    provider: Arc<dyn DeviceProvider>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn HostClock>,
    /// Bumped whenever the pipeline is replaced. Sinks of older generations are ignored.
    generation: AtomicU64,
    pipeline: Mutex<Option<Pipeline>>,
    /// Held while a pipeline is built and installed.
    installing: Mutex<()>,
    /// When a detached node looks for its device again.
    retry_at: Mutex<Option<Instant>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Pipeline>> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retry_at(&self) -> MutexGuard<'_, Option<Instant>> {
        self.retry_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn filters(&self) -> FilterSettings {
        *self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(self: &Arc<Self>, generation: u64) -> FrameSink {
        let shared = Arc::downgrade(self);
        Arc::new(move |delivery: crate::Delivery| {
            if let Some(shared) = shared.upgrade() {
                shared.deliver(generation, delivery);
            }
        })
    }

    fn deliver(&self, generation: u64, delivery: crate::Delivery) {
        let mut guard = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            trace!("dropping a delivery of a retired pipeline");
            return;
        }
        if let Some(pipeline) = guard.as_mut() {
            let ctx = Context {
                publisher: &*self.publisher,
                clock: &*self.clock,
            };
            pipeline.ingest(delivery, &ctx);
        }
    }

    /// Acquires a device, builds its pipeline, and starts streaming.
    ///
    /// Returns `false` when no device is attached, in which case discovery is retried one
    /// watchdog timeout later.
    fn install(self: &Arc<Self>, now: Instant) -> Result<bool> {
        let _installing = self.installing.lock().unwrap_or_else(PoisonError::into_inner);
        if self.lock().is_some() {
            return Ok(true);
        }
        let Some(device) = self.provider.acquire(self.settings.serial_no.as_deref()) else {
            warn!("no device attached");
            *self.retry_at() = Some(now + self.settings.watchdog_timeout());
            return Ok(false);
        };
        *self.retry_at() = None;
        let mut settings = self.settings.clone();
        settings.filters = self.filters();
        let pipeline = Pipeline::build(device, &settings)?;
        pipeline.publish_static(&*self.publisher);
        {
            let mut guard = self.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            *guard = Some(pipeline);
        }
        if let Err(e) = self.start_streaming(now) {
            error!("{}", e);
        }
        Ok(true)
    }

    fn start_streaming(self: &Arc<Self>, now: Instant) -> Result<()> {
        let (device, modules, generation) = match self.lock().as_ref() {
            Some(pipeline) if !pipeline.is_streaming() => (
                pipeline.device(),
                pipeline.modules().to_vec(),
                self.generation.load(Ordering::SeqCst),
            ),
            _ => return Ok(()),
        };
        let sink = self.sink(generation);
        let started = for_each_module(&modules, "start", |module| {
            device.start(module, sink.clone())
        });
        if self.generation.load(Ordering::SeqCst) == generation {
            if let Some(pipeline) = self.lock().as_mut() {
                pipeline.set_streaming(true, now);
            }
        }
        Ok(started?)
    }

    fn stop_streaming(&self) -> Result<()> {
        let (device, modules) = match self.lock().as_mut() {
            Some(pipeline) if pipeline.is_streaming() => {
                pipeline.set_streaming(false, self.clock.monotonic());
                (pipeline.device(), pipeline.modules().to_vec())
            }
            _ => return Ok(()),
        };
        Ok(for_each_module(&modules, "stop", |module| device.stop(module))?)
    }

    fn poll_watchdog(self: &Arc<Self>, now: Instant) -> bool {
        let fired = self
            .lock()
            .as_mut()
            .map(|pipeline| pipeline.poll_watchdog(now));
        match fired {
            Some(true) => {
                self.recover(now);
                true
            }
            Some(false) => false,
            None => self.rediscover(now),
        }
    }

    /// Looks for the device again once the retry deadline of a detached node passed.
    fn rediscover(self: &Arc<Self>, now: Instant) -> bool {
        if !self.retry_at().map_or(false, |at| now >= at) {
            return false;
        }
        match self.install(now) {
            Ok(attached) => {
                if attached {
                    info!("device attached");
                }
                attached
            }
            Err(e) => {
                error!("failed to build the pipeline: {}", e);
                false
            }
        }
    }

    /// Tears down the stalled pipeline and builds a fresh one.
    fn recover(self: &Arc<Self>, now: Instant) {
        let stalled = self.lock().take();
        if let Some(stalled) = stalled {
            warn!(
                "device {} delivered no frames for {:?}, resetting",
                stalled.info().serial_number,
                stalled.watchdog().timeout()
            );
            if let Err(e) = stalled.stop_modules() {
                warn!("{}", e);
            }
        }
        match self.install(now) {
            Ok(true) => info!("device reacquired"),
            Ok(false) => {}
            Err(e) => error!("failed to rebuild the pipeline: {}", e),
        }
    }
}

/// Polls the watchdog of a node from a background thread.
struct WatchdogTimer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WatchdogTimer {
    fn spawn(shared: Weak<Shared>, period: Duration) -> std::io::Result<Self> {
        let (stop, ticks) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("depthsync-watchdog".to_owned())
            .spawn(move || loop {
                match ticks.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(shared) = shared.upgrade() else {
                            break;
                        };
                        let now = shared.clock.monotonic();
                        shared.poll_watchdog(now);
                    }
                    _ => break,
                }
            })?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl Drop for WatchdogTimer {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("watchdog timer panicked");
            }
        }
    }
}

/// Owns the device, its current [`Pipeline`], and the health watchdog.
///
/// When the watchdog fires the pipeline is torn down and the device is acquired and
/// configured again from the same settings. Deliveries still in flight for the old
/// pipeline are dropped.
pub struct Node {
    shared: Arc<Shared>,
    timer: Option<WatchdogTimer>,
}

impl Node {
    /// Builds the first pipeline without a background timer.
    ///
    /// The watchdog then only fires through [`Node::poll_watchdog`].
    pub fn new(
        settings: Settings,
        provider: Arc<dyn DeviceProvider>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn HostClock>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            filters: Mutex::new(settings.filters),
            settings,
            provider,
            publisher,
            clock,
            generation: AtomicU64::new(0),
            pipeline: Mutex::new(None),
            installing: Mutex::new(()),
            retry_at: Mutex::new(None),
        });
        shared.install(shared.clock.monotonic())?;
        Ok(Self {
            shared,
            timer: None,
        })
    }

    /// Builds the first pipeline and polls the watchdog from a background thread.
    pub fn start(
        settings: Settings,
        provider: Arc<dyn DeviceProvider>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn HostClock>,
    ) -> Result<Self> {
        let mut node = Self::new(settings, provider, publisher, clock)?;
        let period = (node.shared.settings.watchdog_timeout() / 10)
            .clamp(Duration::from_millis(10), Duration::from_secs(1));
        node.timer = Some(WatchdogTimer::spawn(Arc::downgrade(&node.shared), period)?);
        Ok(node)
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn is_attached(&self) -> bool {
        self.shared.lock().is_some()
    }

    /// How many pipelines have been installed.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.shared.lock().as_ref().map(|pipeline| pipeline.info().clone())
    }

    pub fn watchdog_state(&self) -> Option<WatchdogState> {
        self.shared
            .lock()
            .as_ref()
            .map(|pipeline| pipeline.watchdog().state())
    }

    /// Runs `f` with the current pipeline, if any.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&Pipeline) -> R) -> Option<R> {
        self.shared.lock().as_ref().map(f)
    }

    /// Tries to acquire a device when none is attached.
    pub fn reacquire(&self) -> Result<bool> {
        self.shared.install(self.shared.clock.monotonic())
    }

    /// Starts or stops every opened sensor module.
    ///
    /// Failures of single modules do not keep the others from changing state.
    pub fn set_streaming(&self, streaming: bool) -> Result<()> {
        if streaming {
            self.shared.start_streaming(self.shared.clock.monotonic())
        } else {
            self.shared.stop_streaming()
        }
    }

    /// Replaces the depth filter toggles, for this and every rebuilt pipeline.
    pub fn configure_filters(&self, filters: FilterSettings) -> Result<()> {
        if let Some(pipeline) = self.shared.lock().as_mut() {
            pipeline.configure_filters(filters)?;
        } else {
            crate::filter::validate(&filters)?;
        }
        *self.shared.filters.lock().unwrap_or_else(PoisonError::into_inner) = filters;
        Ok(())
    }

    /// Fires the watchdog when its deadline passed, rebuilding the pipeline.
    ///
    /// A detached node instead looks for its device once per watchdog timeout. Returns
    /// whether the watchdog fired or a missing device was acquired.
    pub fn poll_watchdog(&self, now: Instant) -> bool {
        self.shared.poll_watchdog(now)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.timer.take();
        if let Err(e) = self.shared.stop_streaming() {
            warn!("{}", e);
        }
    }
}
