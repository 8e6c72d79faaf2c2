// Keyboard teleop: W/S forward, A/D turn, R/F speed, T toggle tracking, Q quit
// Also publishes the heartbeat; quitting or crashing stops the robot.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use diffbot_runtime::config::{TOPIC_CMD_AXES, TOPIC_CMD_MODE, TOPIC_HEARTBEAT};
use diffbot_runtime::messages::{AxisCommand, ControlMode, Heartbeat, ModeCommand};

const SPEEDS: [f32; 3] = [0.3, 0.6, 1.0]; // axis magnitude
const INPUT_TIMEOUT_MS: u64 = 100; // Reset axes after this much time with no input
const HEARTBEAT_EVERY: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_axes = session.declare_publisher(TOPIC_CMD_AXES).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;
    let pub_heartbeat = session.declare_publisher(TOPIC_HEARTBEAT).await?;

    info!("Controls: W/S=forward, A/D=turn, R/F=speed, T=toggle tracking, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_axes, &pub_mode, &pub_heartbeat).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_axes: &zenoh::pubsub::Publisher<'_>,
    pub_mode: &zenoh::pubsub::Publisher<'_>,
    pub_heartbeat: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut mode = ControlMode::Manual;

    // Persistent axis state
    let mut axes = AxisCommand { x: 0.0, y: 0.0 };
    let mut last_movement_input = Instant::now();
    let mut last_heartbeat: Option<Instant> = None;
    let mut seq: u64 = 0;

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        axes.y = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        axes.y = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        axes.x = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        axes.x = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('t') if pressed => {
                        mode = match mode {
                            ControlMode::Manual => ControlMode::Tracking,
                            ControlMode::Tracking => ControlMode::Manual,
                        };
                        info!("Mode: {:?}", mode);
                        pub_mode.put(serde_json::to_string(&ModeCommand { mode })?).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset axes if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            axes = AxisCommand { x: 0.0, y: 0.0 };
        }

        if last_heartbeat.is_none_or(|t| t.elapsed() >= HEARTBEAT_EVERY) {
            seq += 1;
            pub_heartbeat.put(serde_json::to_string(&Heartbeat { seq })?).await?;
            last_heartbeat = Some(Instant::now());
        }

        // Always publish at ~50Hz
        pub_axes.put(serde_json::to_string(&axes)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
