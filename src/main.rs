//! Bedrock World Restore Tool
//!
//! Restores a world from a backup archive, optionally snapshotting the
//! current world first and relaunching the server afterwards.

// world-restore/src/main.rs
mod backup;
mod config;
mod errors;
mod restore;
mod utils;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use config::{ConfigSource, PLUGIN_NAME};
use restore::{RestoreContext, RestoreRequest};
use utils::logging::{init_subscriber, success};
use utils::process::WaitPolicy;
use utils::{platform, workspace};

const INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "world-restore", version, about = "Restore a Bedrock server world from a backup archive")]
struct Cli {
    /// Backup archive to restore (.7z, .zip, .tar.gz ...)
    backup_file: PathBuf,

    /// Bedrock server root directory
    server_dir: PathBuf,

    /// World directory name under `<SERVER_DIR>/worlds`
    world_name: String,

    /// Configuration file to use instead of the plugin's EasyBackuper.json
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds between process table samples while waiting for the server
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    poll_interval: u64,

    /// Give up waiting for the server after this many seconds
    #[arg(long, value_name = "SECS")]
    wait_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    ExitCode::from(run_app(cli).await)
}

async fn run_app(cli: Cli) -> u8 {
    let loaded = config::load(&cli.server_dir, cli.config.as_deref());
    let mut config = loaded.config;
    config.debug |= cli.debug;

    // Must outlive every log call below.
    let session = init_subscriber(&cli.server_dir, config.debug);
    match (&session.file, &session.file_error) {
        (Some(file), _) => debug!("Log file: {}", file.display()),
        (None, Some(e)) => warn!("File logging disabled: {}", e),
        (None, None) => {}
    }

    info!("{}", "=".repeat(60));
    info!(
        "{} world restore v{} ({}/{})",
        PLUGIN_NAME,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    info!("{}", "=".repeat(60));
    match &loaded.source {
        ConfigSource::File(path) => info!("Loaded configuration: {}", path.display()),
        ConfigSource::Defaults { reason } => warn!("Using default configuration: {}", reason),
    }
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    info!("Backup file: {}", cli.backup_file.display());
    info!("Server directory: {}", cli.server_dir.display());
    info!("World name: {}", cli.world_name);
    debug!(?config, "Effective configuration");

    let wait = WaitPolicy {
        poll_interval: Duration::from_secs(cli.poll_interval.max(1)),
        deadline: cli.wait_timeout.map(Duration::from_secs),
    };
    let request = RestoreRequest::new(&cli.backup_file, &cli.server_dir, &cli.world_name);
    let ctx = RestoreContext::new(request, config, platform::current(), wait);
    info!("Archive backend: {}", ctx.backend.name());

    let server_dir = ctx.request.server_dir.clone();
    let pipeline = tokio::task::spawn_blocking(move || restore::run_restore_flow(&ctx));

    tokio::select! {
        joined = pipeline => match joined {
            Ok(Ok(outcome)) => {
                debug!(?outcome, "Restore outcome");
                success!("World restore finished");
                0
            }
            Ok(Err(e)) => {
                error!("Restore failed: {}", e);
                e.exit_code()
            }
            Err(e) => {
                error!("Restore task aborted: {}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cleaning up temporary directories");
            workspace::discard_all(&server_dir);
            drop(session);
            // The blocking pipeline cannot be cancelled; leave without
            // waiting for it.
            std::process::exit(i32::from(INTERRUPTED));
        }
    }
}
