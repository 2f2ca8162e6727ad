//! Turns the frame stream of a depth camera into timestamped, calibrated products.
//!
//! A [`Node`] acquires a device through a [`DeviceProvider`], negotiates stream profiles
//! from [`Settings`], and builds a [`Pipeline`]. The pipeline receives every delivery of the
//! device, keeps the latest frame of each stream, optionally filters depth, and hands
//! images, aligned depth, point clouds, and motion samples to a [`Publisher`].
//!
//! Timestamps of the device clock are mapped onto host time by a [`ClockSynchronizer`], and
//! a [`HealthWatchdog`] rebuilds the pipeline when the device stops delivering.

mod arrival;
mod clock;
mod device;
mod error;
pub mod filter;
mod node;
mod pipeline;
mod publish;
mod settings;
mod syncer;
mod watchdog;

pub use arrival::*;
pub use clock::*;
pub use device::*;
pub use error::*;
pub use filter::{FilterChain, StageKind};
pub use node::*;
pub use pipeline::{module_streams, Context, Pipeline};
pub use publish::*;
pub use settings::*;
pub use syncer::*;
pub use watchdog::*;
