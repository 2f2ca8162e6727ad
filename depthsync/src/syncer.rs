use crate::Frame;
use depthsync_core::StreamKey;
use log::*;
use std::collections::BTreeSet;

/// Groups frames of independently delivering sensors into framesets.
///
/// A pending group is emitted once it holds every expected stream, when another frame of a
/// stream already in the group shows up, or when a frame falls outside the capture window
/// of the group. The window is half the frame period of the slowest expected stream.
#[derive(Debug)]
pub struct FrameSyncer {
    expected: BTreeSet<StreamKey>,
    window: f64,
    pending: Vec<Frame>,
}

impl FrameSyncer {
    /// `streams` lists each expected stream with its frame rate.
    pub fn new(streams: impl IntoIterator<Item = (StreamKey, u32)>) -> Self {
        let mut expected = BTreeSet::new();
        let mut slowest = u32::MAX;
        for (key, fps) in streams {
            expected.insert(key);
            slowest = slowest.min(fps.max(1));
        }
        let window = if expected.is_empty() {
            0.0
        } else {
            500.0 / f64::from(slowest)
        };
        Self {
            expected,
            window,
            pending: Vec::new(),
        }
    }

    /// Capture window in milliseconds.
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Adds a frame and returns every group it completed.
    pub fn push(&mut self, frame: Frame) -> Vec<Vec<Frame>> {
        let mut groups = Vec::new();
        if let Some(first) = self.pending.first() {
            let repeated = self.pending.iter().any(|pending| pending.key == frame.key);
            let outside = (frame.timestamp - first.timestamp).abs() > self.window;
            if repeated || outside {
                trace!(
                    "emitting partial frameset of {} frames before {}",
                    self.pending.len(),
                    frame.key
                );
                groups.extend(self.flush());
            }
        }
        self.pending.push(frame);
        if self.is_complete() {
            groups.extend(self.flush());
        }
        groups
    }

    /// Emits the pending group, if any.
    pub fn flush(&mut self) -> Option<Vec<Frame>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    fn is_complete(&self) -> bool {
        self.expected
            .iter()
            .all(|key| self.pending.iter().any(|frame| frame.key == *key))
    }
}
