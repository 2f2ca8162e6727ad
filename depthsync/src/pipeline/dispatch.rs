use super::Pipeline;
use crate::{
    ArrivalSet, Error, Frame, FrameData, HostClock, ImuReading, ImuSample, Publisher, Result,
    Stamp, Topic,
};
use depthsync_core::{Modality, StreamKey};
use depthsync_pointclouds::ColorSource;
use log::*;
use std::time::SystemTime;

/// What a dispatch needs from outside the pipeline.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub publisher: &'a dyn Publisher,
    pub clock: &'a dyn HostClock,
}

impl Pipeline {
    /// Handles one delivery from the device.
    ///
    /// Motion samples are published on their own. Video frames go through the syncer when
    /// one is configured and are otherwise dispatched as delivered.
    pub fn ingest(&mut self, delivery: crate::Delivery, ctx: &Context<'_>) {
        let is_set = delivery.is_set();
        let (motion, video): (Vec<Frame>, Vec<Frame>) = delivery
            .into_frames()
            .into_iter()
            .partition(|frame| frame.key.is_motion());

        for frame in motion {
            self.dispatch_motion(frame, ctx);
        }
        if video.is_empty() {
            return;
        }

        let groups: Vec<(Vec<Frame>, bool)> = match self.syncer.as_mut() {
            Some(syncer) => video
                .into_iter()
                .flat_map(|frame| syncer.push(frame))
                .map(|group| (group, true))
                .collect(),
            None => vec![(video, is_set)],
        };
        for (frames, is_set) in groups {
            self.dispatch(frames, is_set, ctx);
        }
    }

    fn dispatch(&mut self, frames: Vec<Frame>, is_set: bool, ctx: &Context<'_>) {
        if is_set {
            debug!("frameset with {} frames arrived", frames.len());
        }
        let mut arrivals = self.arrivals.begin();
        let mut stored = Vec::with_capacity(frames.len());
        for frame in &frames {
            debug!(
                "{} frame arrived, frame number {}, device time {:.3} ms",
                frame.key, frame.frame_number, frame.timestamp
            );
            match self.store(frame).and_then(|()| arrivals.mark(frame.key)) {
                Ok(()) => stored.push(frame),
                Err(e) => error!("an error occurred during frame dispatch: {}", e),
            }
        }
        // Only frames of configured streams prove liveness and set the time base.
        let Some(first) = stored.first() else {
            return;
        };
        self.watchdog.rearm(ctx.clock.monotonic());
        let time = self.clock.stamp(first.timestamp, first.domain, ctx.clock);

        let mut targets = Vec::new();
        for frame in stored {
            if !frame.key.is_depth() {
                targets.push(frame.key);
            }
            self.publish_frame(frame.key, time, ctx.publisher);
        }

        if is_set && self.settings.align_depth && arrivals.arrived(StreamKey::DEPTH) {
            for target in targets {
                if let Err(e) = self.publish_aligned(target, time, ctx.publisher) {
                    error!("failed to align depth to {}: {}", target, e);
                }
            }
        }

        if self.clouds.is_some() {
            if ctx.publisher.has_subscribers(Topic::ColoredCloud) {
                if let Err(e) = self.publish_colored_cloud(time, &arrivals, ctx.publisher) {
                    error!("failed to build the colored cloud: {}", e);
                }
            }
            if ctx.publisher.has_subscribers(Topic::DepthCloud) {
                if let Err(e) = self.publish_depth_cloud(time, &arrivals, ctx.publisher) {
                    error!("failed to build the depth cloud: {}", e);
                }
            }
        }
    }

    /// Copies a frame into its stream buffer, filtering depth in place.
    fn store(&mut self, frame: &Frame) -> Result<()> {
        let stream = self
            .video
            .get_mut(&frame.key)
            .ok_or(Error::UnsupportedStream(frame.key))?;
        if !stream.buffer.copy_from(&frame.data) {
            return Err(Error::FrameMismatch(frame.key));
        }
        if let FrameData::Depth(depth) = &mut stream.buffer {
            self.filters.apply(depth);
        }
        Ok(())
    }

    fn next_stamp(&mut self, key: StreamKey, time: SystemTime) -> Stamp {
        let seq = self.sequences.entry(key).or_default();
        *seq += 1;
        Stamp { time, seq: *seq }
    }

    fn publish_frame(&mut self, key: StreamKey, time: SystemTime, publisher: &dyn Publisher) {
        let stamp = self.next_stamp(key, time);
        if !publisher.has_subscribers(Topic::Image(key)) {
            return;
        }
        if let Some(stream) = self.video.get(&key) {
            publisher.publish_image(key, stamp, &stream.buffer, &stream.calibration);
        }
    }

    fn publish_aligned(
        &mut self,
        target: StreamKey,
        time: SystemTime,
        publisher: &dyn Publisher,
    ) -> Result<()> {
        if !publisher.has_subscribers(Topic::AlignedDepth(target)) {
            return Ok(());
        }
        let (Some(alignment), Some(depth), Some(stream)) = (
            self.alignments.get_mut(&target),
            self.video.get(&StreamKey::DEPTH),
            self.video.get(&target),
        ) else {
            return Ok(());
        };
        let FrameData::Depth(depth) = &depth.buffer else {
            return Ok(());
        };
        alignment.reprojector.reproject(depth, &mut alignment.buffer)?;
        let seq = self.aligned_sequences.entry(target).or_default();
        *seq += 1;
        let stamp = Stamp { time, seq: *seq };
        publisher.publish_aligned_depth(
            target,
            stamp,
            &alignment.buffer.to_image(),
            &stream.calibration,
        );
        Ok(())
    }

    fn publish_depth_cloud(
        &self,
        time: SystemTime,
        arrivals: &ArrivalSet,
        publisher: &dyn Publisher,
    ) -> Result<()> {
        if !arrivals.arrived(StreamKey::DEPTH) {
            return Ok(());
        }
        let (Some(builder), Some(FrameData::Depth(depth))) =
            (&self.clouds, self.buffer(StreamKey::DEPTH))
        else {
            return Ok(());
        };
        publisher.publish_depth_cloud(time, &builder.depth_cloud(depth)?);
        Ok(())
    }

    fn publish_colored_cloud(
        &self,
        time: SystemTime,
        arrivals: &ArrivalSet,
        publisher: &dyn Publisher,
    ) -> Result<()> {
        if !arrivals.all_arrived(&[StreamKey::DEPTH, StreamKey::COLOR]) {
            return Ok(());
        }
        let (Some(builder), Some(FrameData::Depth(depth)), Some(color), Some(extrinsics)) = (
            &self.clouds,
            self.buffer(StreamKey::DEPTH),
            self.video.get(&StreamKey::COLOR),
            self.extrinsics.get(&StreamKey::COLOR),
        ) else {
            return Ok(());
        };
        let FrameData::Color(image) = &color.buffer else {
            debug!("color stream is not rgb, skipping the colored cloud");
            return Ok(());
        };
        let source = ColorSource {
            image,
            intrinsics: &color.intrinsics,
            extrinsics,
        };
        publisher.publish_colored_cloud(time, &builder.colored_cloud(depth, source)?);
        Ok(())
    }

    fn buffer(&self, key: StreamKey) -> Option<&FrameData> {
        self.video.get(&key).map(|stream| &stream.buffer)
    }

    /// Publishes a motion sample once the clock base exists.
    fn dispatch_motion(&mut self, frame: Frame, ctx: &Context<'_>) {
        let Some(time) = self.clock.map(frame.timestamp) else {
            trace!("dropping {} sample until the clock base is set", frame.key);
            return;
        };
        if !self.motion.contains_key(&frame.key) {
            error!("{}", Error::UnsupportedStream(frame.key));
            return;
        }
        let FrameData::Motion(axes) = frame.data else {
            error!("{}", Error::FrameMismatch(frame.key));
            return;
        };
        let stamp = self.next_stamp(frame.key, time);
        if !ctx.publisher.has_subscribers(Topic::Imu(frame.key)) {
            return;
        }
        let reading = match frame.key.modality {
            Modality::Gyro => ImuReading::AngularVelocity(axes),
            _ => ImuReading::LinearAcceleration(axes),
        };
        ctx.publisher.publish_imu(&ImuSample {
            stream: frame.key,
            stamp,
            reading,
        });
    }
}
