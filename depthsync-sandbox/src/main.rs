mod counter;
mod synthetic;

use counter::TopicCounter;
use depthsync::{Node, Settings, SystemClock};
use depthsync_core::StreamKey;
use log::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use synthetic::{Attached, SyntheticDevice};

#[derive(StructOpt, Clone)]
#[structopt(
    name = "depthsync-sandbox",
    about = "Runs the depth sync engine against a synthetic camera"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `depthsync::Settings`. Without it every stream the
    /// synthetic camera offers is enabled, with alignment and point clouds.
    #[structopt(short, long, default_value = "depthsync-settings.json")]
    settings: PathBuf,
    /// Seconds to stream for.
    #[structopt(short, long, default_value = "5")]
    duration: f64,
    /// Stop delivering frames this many seconds in, until the device is reset.
    #[structopt(long)]
    stall_after: Option<f64>,
    /// Watchdog timeout in seconds, overriding the settings.
    #[structopt(long)]
    watchdog_timeout: Option<f64>,
    /// Width of the synthetic video streams.
    #[structopt(long, default_value = "64")]
    width: u32,
    /// Height of the synthetic video streams.
    #[structopt(long, default_value = "48")]
    height: u32,
    /// Frame rate of the synthetic video streams.
    #[structopt(long, default_value = "30")]
    fps: u32,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let mut settings: Settings = settings.unwrap_or_else(|| synthetic_settings(&opt));
    if let Some(timeout) = opt.watchdog_timeout {
        settings.watchdog_timeout_secs = timeout;
    }
    let settings = settings.normalized();

    let device = Arc::new(SyntheticDevice::new(
        opt.width,
        opt.height,
        opt.fps,
        opt.stall_after.map(Duration::from_secs_f64),
    ));
    let publisher = Arc::new(TopicCounter::default());
    let node = match Node::start(
        settings,
        Arc::new(Attached(device)),
        publisher.clone(),
        Arc::new(SystemClock),
    ) {
        Ok(node) => node,
        Err(e) => {
            error!("unable to set up the device: {}", e);
            std::process::exit(1);
        }
    };

    std::thread::sleep(Duration::from_secs_f64(opt.duration.max(0.0)));
    info!(
        "stopping after {} pipeline generation(s)",
        node.generation()
    );
    drop(node);

    for (topic, count) in publisher.counts() {
        info!("{}: {} messages", topic, count);
    }
}

/// Every stream at whatever the camera offers, with every derived product.
fn synthetic_settings(opt: &Opt) -> Settings {
    let mut settings = Settings::default();
    for key in StreamKey::VIDEO {
        if let Some(stream) = settings.stream_mut(key) {
            stream.width = opt.width;
            stream.height = opt.height;
            stream.fps = 0;
        }
    }
    settings.align_depth = true;
    settings.pointcloud = true;
    settings
}
