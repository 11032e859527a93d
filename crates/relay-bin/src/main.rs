//! Telemetry relay - forwards peripheral events to the collector, queueing them while offline.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_config_and_utils::{init_logging, Config, Paths};

/// Telemetry relay command-line interface.
#[derive(Parser)]
#[command(name = "telemetry-relay")]
#[command(about = "Offline-tolerant relay for peripheral telemetry events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, queue data and logs. Defaults to ~/.telemetry-relay
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay base64 notifications read from stdin, one per line
    Run,
    /// Show the persisted pending queue
    Status,
    /// Run one drain pass now and report the result
    Flush,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, Some(paths.log_file()));

    let result = match cli.command {
        Some(Commands::Run) | None => app::run_relay(config, paths).await,
        Some(Commands::Status) => app::print_status(&config, &paths),
        Some(Commands::Flush) => app::flush_once(config, paths).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // A blocked stdin read would otherwise hold the runtime open after Ctrl-C.
    std::process::exit(0);
}
