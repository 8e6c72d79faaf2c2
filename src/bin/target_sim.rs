// Synthetic detector: a target sweeping left/right with periodic dropouts
// Publishes heartbeats too, so the runtime can be exercised without teleop.
use clap::Parser;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use diffbot_runtime::config::{TOPIC_CMD_MODE, TOPIC_DETECTION, TOPIC_HEARTBEAT};
use diffbot_runtime::messages::{ControlMode, Detection, Heartbeat, ModeCommand};

#[derive(Parser)]
struct Args {
    /// Frames per second (clamped to 1..=1000)
    #[arg(long, default_value_t = 30)]
    fps: u64,

    /// Sweep period in seconds
    #[arg(long, default_value_t = 4.0)]
    period: f32,

    /// Drop this many frames every 3 seconds
    #[arg(long, default_value_t = 5)]
    dropout: u64,
}

const MAX_FPS: u64 = 1000;

/// Clamp the frame rate and derive the tick period (never zero)
fn frame_period(fps: u64) -> (u64, Duration) {
    let fps = fps.clamp(1, MAX_FPS);
    (fps, Duration::from_millis(1000 / fps))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let (fps, period) = frame_period(args.fps);

    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_detection = session.declare_publisher(TOPIC_DETECTION).await?;
    let pub_heartbeat = session.declare_publisher(TOPIC_HEARTBEAT).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;

    let mode = ModeCommand {
        mode: ControlMode::Tracking,
    };
    pub_mode.put(serde_json::to_string(&mode)?).await?;
    info!("Publishing synthetic detections at {} fps", fps);

    let mut tick = interval(period);
    let dropout_every = fps * 3;
    let mut frame: u64 = 0;

    loop {
        tick.tick().await;
        frame += 1;

        let t = frame as f32 / fps as f32;
        let detection = if frame % dropout_every < args.dropout {
            Detection::miss()
        } else {
            Detection {
                found: true,
                offset_x: Some((t * std::f32::consts::TAU / args.period).sin() * 0.8),
                confidence: 0.9,
            }
        };
        pub_detection.put(serde_json::to_string(&detection)?).await?;

        if frame % (fps / 5).max(1) == 0 {
            pub_heartbeat.put(serde_json::to_string(&Heartbeat { seq: frame })?).await?;
        }
    }
}
