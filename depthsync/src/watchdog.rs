use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Not watching, either because nothing is streaming or no device is attached.
    Inactive,
    Armed { deadline: Instant },
    /// The deadline passed. Terminal for the pipeline that owns the watchdog.
    Fired,
}

/// Detects a device that stopped delivering frames.
#[derive(Debug, Clone)]
pub struct HealthWatchdog {
    timeout: Duration,
    state: WatchdogState,
}

impl HealthWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: WatchdogState::Inactive,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, WatchdogState::Armed { .. })
    }

    /// Starts watching with a full timeout from `now`.
    pub fn arm(&mut self, now: Instant) {
        if self.state != WatchdogState::Fired {
            self.state = WatchdogState::Armed {
                deadline: now + self.timeout,
            };
        }
    }

    /// Pushes the deadline out after a successful dispatch. Does nothing unless armed.
    pub fn rearm(&mut self, now: Instant) {
        if self.is_armed() {
            self.arm(now);
        }
    }

    pub fn disarm(&mut self) {
        if self.state != WatchdogState::Fired {
            self.state = WatchdogState::Inactive;
        }
    }

    /// Returns `true` exactly once, when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            WatchdogState::Armed { deadline } if now >= deadline => {
                self.state = WatchdogState::Fired;
                true
            }
            _ => false,
        }
    }
}
