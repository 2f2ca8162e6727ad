use depthsync_align::AlignError;
use depthsync_core::StreamKey;
use depthsync_pointclouds::CloudError;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sensor module \"{0}\" is not supported")]
    UnsupportedModule(String),
    #[error("no depth profile matches the requested configuration")]
    MissingDepthProfile,
    #[error("filter stages are toggled inconsistently: {0}")]
    FilterOrder(&'static str),
    #[error("stream {0} is not configured")]
    UnsupportedStream(StreamKey),
    #[error("frame does not match the negotiated {0} stream")]
    FrameMismatch(StreamKey),
    #[error("calibration of {0} does not match its profile")]
    CalibrationMismatch(StreamKey),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Streaming(#[from] StreamingError),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error("failed to spawn the watchdog timer: {0}")]
    Timer(#[from] std::io::Error),
}

/// A failed exchange with the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The sensor modules that failed to change their streaming state.
///
/// The remaining modules were still started or stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} sensor module(s) failed to {}", .failures.len(), .action)]
pub struct StreamingError {
    pub action: &'static str,
    pub failures: Vec<(String, DeviceError)>,
}
