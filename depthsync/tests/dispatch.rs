mod common;

use approx::assert_relative_eq;
use common::*;
use depthsync::*;
use depthsync_core::StreamKey;
use depthsync_pointclouds::OUT_OF_BOUNDS_COLOR;
use std::time::Duration;

fn derived_products() -> Settings {
    let mut settings = settings();
    settings.align_depth = true;
    settings.pointcloud = true;
    settings
}

fn images(events: &[Event]) -> Vec<(StreamKey, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Image { stream, seq, .. } => Some((*stream, *seq)),
            _ => None,
        })
        .collect()
}

#[test]
fn startup_publishes_extrinsics() {
    let (_node, _, _, recorder, _) = node(settings());
    assert_eq!(
        recorder.take(),
        vec![Event::Extrinsics("depth_to_color_extrinsics".to_owned())]
    );
}

#[test]
fn single_frames_are_not_aligned() {
    let (_node, device, _, recorder, _) = node(derived_products());
    recorder.take();

    device.deliver(STEREO, Delivery::Single(depth_frame(1, 100.0, 1000)));
    let events = recorder.take();
    assert_eq!(images(&events), vec![(StreamKey::DEPTH, 1)]);
    assert!(!events.iter().any(|e| matches!(e, Event::Aligned { .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::ColoredCloud(_))));
    let cloud = events
        .iter()
        .find_map(|e| match e {
            Event::DepthCloud(cloud) => Some(cloud),
            _ => None,
        })
        .expect("depth cloud");
    assert_eq!((cloud.width(), cloud.height()), (WIDTH, HEIGHT));
    assert!(cloud.iter().all(|point| (point.z - 1.0).abs() < 1e-6));

    device.deliver(RGB, Delivery::Single(color_frame(1, 101.0, [10, 20, 30])));
    let events = recorder.take();
    assert_eq!(images(&events), vec![(StreamKey::COLOR, 1)]);
    assert_eq!(events.len(), 1);
}

#[test]
fn framesets_produce_every_product() {
    let (_node, device, _, recorder, _) = node(derived_products());
    recorder.take();

    device.deliver(
        STEREO,
        Delivery::Set(vec![
            depth_frame(1, 100.0, 1000),
            color_frame(1, 100.0, [10, 20, 30]),
        ]),
    );
    let events = recorder.take();
    assert_eq!(
        images(&events),
        vec![(StreamKey::DEPTH, 1), (StreamKey::COLOR, 1)]
    );

    let aligned = events.iter().find_map(|e| match e {
        Event::Aligned {
            target,
            seq,
            depth,
            width,
        } => Some((*target, *seq, depth, *width)),
        _ => None,
    });
    let (target, seq, depth, width) = aligned.expect("aligned depth");
    assert_eq!((target, seq, width), (StreamKey::COLOR, 1, WIDTH));
    assert!(depth.pixels().all(|p| p.0[0] == 1000));

    let colored = events
        .iter()
        .find_map(|e| match e {
            Event::ColoredCloud(cloud) => Some(cloud),
            _ => None,
        })
        .expect("colored cloud");
    assert_eq!(colored.len(), (WIDTH * HEIGHT) as usize);
    assert!(colored.iter().all(|point| point.color() == [10, 20, 30]));
    assert!(events.iter().any(|e| matches!(e, Event::DepthCloud(_))));
}

#[test]
fn far_points_are_colored_from_the_origin() {
    let (_node, device, _, recorder, _) = node(derived_products());
    recorder.take();

    device.deliver(
        STEREO,
        Delivery::Set(vec![
            depth_frame(1, 100.0, 6000),
            color_frame(1, 100.0, [10, 20, 30]),
        ]),
    );
    let colored = recorder
        .take()
        .into_iter()
        .find_map(|e| match e {
            Event::ColoredCloud(cloud) => Some(cloud),
            _ => None,
        })
        .expect("colored cloud");
    for point in colored.iter() {
        assert_relative_eq!(point.z, 0.0);
        assert_eq!(point.color(), OUT_OF_BOUNDS_COLOR);
    }
}

#[test]
fn synchronized_frames_are_grouped() {
    let (_node, device, _, recorder, clock) = node(derived_products().normalized());
    recorder.take();

    device.deliver(STEREO, Delivery::Single(depth_frame(1, 100.0, 1000)));
    assert!(recorder.take().is_empty());

    clock.advance(Duration::from_millis(5));
    device.deliver(RGB, Delivery::Single(color_frame(1, 101.0, [10, 20, 30])));
    let events = recorder.take();
    assert_eq!(
        images(&events),
        vec![(StreamKey::DEPTH, 1), (StreamKey::COLOR, 1)]
    );
    for event in &events {
        if let Event::Image { time, .. } = event {
            assert_eq!(*time, clock.now());
        }
    }
    assert!(events.iter().any(|e| matches!(e, Event::Aligned { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::ColoredCloud(_))));
}

#[test]
fn device_time_is_carried_into_stamps() {
    let (_node, device, _, recorder, clock) = node(settings());
    recorder.take();

    device.deliver(STEREO, Delivery::Single(depth_frame(1, 100.0, 1000)));
    clock.advance(Duration::from_secs(3));
    device.deliver(STEREO, Delivery::Single(depth_frame(2, 600.0, 1000)));
    let times: Vec<_> = recorder
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Image { time, .. } => Some(time),
            _ => None,
        })
        .collect();
    assert_eq!(
        times,
        vec![
            clock.wall_start(),
            clock.wall_start() + Duration::from_millis(500)
        ]
    );
}

#[test]
fn unconfigured_and_mismatched_frames_are_skipped() {
    let (node, device, _, recorder, _) = node(settings());
    recorder.take();

    let mut small = depth_frame(2, 133.0, 1000);
    small.data = FrameData::Depth(depthsync_core::DepthImage::new(2, 2));
    device.deliver(
        STEREO,
        Delivery::Set(vec![infra_frame(1, 100.0), depth_frame(1, 100.0, 1000)]),
    );
    device.deliver(STEREO, Delivery::Single(small));

    assert_eq!(images(&recorder.take()), vec![(StreamKey::DEPTH, 1)]);
    assert_eq!(node.with_pipeline(|p| p.sequence(StreamKey::DEPTH)), Some(1));
}

#[test]
fn skipped_frames_neither_stamp_nor_feed_the_watchdog() {
    let mut settings = settings();
    settings.gyro.enabled = true;
    let (node, device, _, recorder, clock) = node(settings);
    recorder.take();

    clock.advance(Duration::from_millis(800));
    device.deliver(STEREO, Delivery::Single(infra_frame(1, 100.0)));
    device.deliver(MOTION, Delivery::Single(gyro_frame(1, 600.0)));
    assert!(recorder.take().is_empty());
    assert!(node.poll_watchdog(clock.start() + Duration::from_millis(1000)));
}

#[test]
fn publishing_follows_subscriptions() {
    let (node, device, _, recorder, _) = node_with(
        derived_products(),
        MockDevice::new(),
        Recorder::only([Topic::Image(StreamKey::COLOR)]),
    );
    recorder.take();

    device.deliver(
        STEREO,
        Delivery::Set(vec![
            depth_frame(1, 100.0, 1000),
            color_frame(1, 100.0, [10, 20, 30]),
        ]),
    );
    assert_eq!(images(&recorder.take()), vec![(StreamKey::COLOR, 1)]);
    assert_eq!(node.with_pipeline(|p| p.sequence(StreamKey::DEPTH)), Some(1));
}

#[test]
fn motion_waits_for_the_clock_base() {
    let mut settings = settings();
    settings.gyro.enabled = true;
    let (_node, device, _, recorder, clock) = node(settings);
    assert!(recorder.take().contains(&Event::ImuInfo(StreamKey::GYRO)));

    device.deliver(MOTION, Delivery::Single(gyro_frame(1, 50.0)));
    assert!(recorder.take().is_empty());

    device.deliver(STEREO, Delivery::Single(depth_frame(1, 100.0, 1000)));
    recorder.take();
    device.deliver(MOTION, Delivery::Single(gyro_frame(2, 600.0)));
    match recorder.take().as_slice() {
        [Event::Imu(sample)] => {
            assert_eq!(sample.stream, StreamKey::GYRO);
            assert_eq!(sample.stamp.seq, 1);
            assert_eq!(
                sample.stamp.time,
                clock.wall_start() + Duration::from_millis(500)
            );
            assert!(matches!(sample.reading, ImuReading::AngularVelocity(_)));
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn filters_keep_flat_depth() {
    let mut settings = settings();
    settings.filters = FilterSettings::all();
    let (node, device, _, recorder, _) = node(settings);
    recorder.take();

    device.deliver(STEREO, Delivery::Single(depth_frame(1, 100.0, 1000)));
    assert_eq!(images(&recorder.take()), vec![(StreamKey::DEPTH, 1)]);
    assert_eq!(
        node.with_pipeline(|p| p.filters().is_active()),
        Some(true)
    );
}
