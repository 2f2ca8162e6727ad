use crate::{Error, Result};
use depthsync_core::StreamKey;
use std::collections::{BTreeMap, BTreeSet};

/// Knows which streams are configured and hands out a fresh [`ArrivalSet`] per dispatch.
#[derive(Debug, Clone, Default)]
pub struct FrameArrivalTracker {
    configured: BTreeSet<StreamKey>,
}

impl FrameArrivalTracker {
    pub fn new(configured: impl IntoIterator<Item = StreamKey>) -> Self {
        Self {
            configured: configured.into_iter().collect(),
        }
    }

    pub fn is_configured(&self, key: StreamKey) -> bool {
        self.configured.contains(&key)
    }

    /// Starts tracking a new dispatch with nothing arrived.
    pub fn begin(&self) -> ArrivalSet {
        ArrivalSet {
            arrived: self.configured.iter().map(|&key| (key, false)).collect(),
        }
    }
}

/// The streams present in one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalSet {
    arrived: BTreeMap<StreamKey, bool>,
}

impl ArrivalSet {
    /// Records that a frame of `key` is part of this dispatch.
    pub fn mark(&mut self, key: StreamKey) -> Result<()> {
        match self.arrived.get_mut(&key) {
            Some(arrived) => {
                *arrived = true;
                Ok(())
            }
            None => Err(Error::UnsupportedStream(key)),
        }
    }

    pub fn arrived(&self, key: StreamKey) -> bool {
        self.arrived.get(&key).copied().unwrap_or(false)
    }

    pub fn all_arrived(&self, keys: &[StreamKey]) -> bool {
        keys.iter().all(|&key| self.arrived(key))
    }
}
