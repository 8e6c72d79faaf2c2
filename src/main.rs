use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diffbot_runtime::config::DriveParams;
use diffbot_runtime::messages::ControlMode;
use diffbot_runtime::runtime::{self, RunOptions};

#[derive(Parser)]
#[command(about = "Differential drive control runtime")]
struct Args {
    /// JSON drive parameters (defaults used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller that owns the motors at startup
    #[arg(short, long, value_enum, default_value_t = ControlMode::Manual)]
    mode: ControlMode,

    /// Log motor commands instead of publishing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let params = match args.config {
        Some(path) => match DriveParams::load(&path) {
            Ok(params) => {
                info!("Loaded drive params from {}", path.display());
                params
            }
            Err(e) => {
                eprintln!("Config error ({}): {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => DriveParams::default(),
    };

    let opts = RunOptions {
        params,
        mode: args.mode,
        dry_run: args.dry_run,
    };

    if let Err(e) = runtime::run(opts).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
