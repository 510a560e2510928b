// world-restore/src/restore/restart.rs
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{RestartConfig, resolve_path};
use crate::utils::logging::success;
use crate::utils::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Disabled,
    Launched(PathBuf),
    ScriptMissing(PathBuf),
    LaunchFailed(String),
}

/// Relaunches the server after the configured delay when restarting is
/// enabled. The start script is fired and forgotten; launch problems are
/// logged and reported, never raised.
pub fn maybe_restart(
    config: &RestartConfig,
    server_dir: &Path,
    platform: &dyn Platform,
) -> RestartOutcome {
    if !config.enabled {
        info!("Configured not to restart the server automatically");
        return RestartOutcome::Disabled;
    }

    info!(
        "Waiting {} second(s) before starting the server...",
        config.wait_seconds
    );
    thread::sleep(Duration::from_secs(config.wait_seconds));

    let server_dir = std::path::absolute(server_dir).unwrap_or_else(|_| server_dir.to_path_buf());
    let script = resolve_path(&server_dir, &config.start_script_path);
    info!("Start script: {}", script.display());

    if !script.is_file() {
        error!("Start script does not exist: {}", script.display());
        return RestartOutcome::ScriptMissing(script);
    }

    info!("Starting server on {}...", platform.name());
    match platform.launch_detached(&script, &server_dir) {
        Ok(()) => {
            success!("Server start command has been executed");
            RestartOutcome::Launched(script)
        }
        Err(e) => {
            error!("Failed to start server: {}", e);
            RestartOutcome::LaunchFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::platform::fake::FakePlatform;
    use crate::utils::tree::test_support::write_file;

    fn enabled(script: &str) -> RestartConfig {
        RestartConfig {
            enabled: true,
            wait_seconds: 0,
            start_script_path: PathBuf::from(script),
        }
    }

    #[test]
    fn test_disabled_does_nothing() {
        let platform = FakePlatform::default();
        let config = RestartConfig {
            enabled: false,
            ..enabled("./start.sh")
        };
        let outcome = maybe_restart(&config, Path::new("/srv"), &platform);
        assert_eq!(outcome, RestartOutcome::Disabled);
        assert!(platform.launches().is_empty());
    }

    #[test]
    fn test_relative_script_resolves_against_server_dir() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        write_file(server.path(), "start.sh", "./bedrock_server");
        let platform = FakePlatform::default();

        let outcome = maybe_restart(&enabled("./start.sh"), server.path(), &platform);
        let expected = server.path().join("start.sh");
        assert_eq!(outcome, RestartOutcome::Launched(expected.clone()));
        assert_eq!(platform.launches(), vec![(expected, server.path().to_path_buf())]);
        Ok(())
    }

    #[test]
    fn test_missing_script_is_not_launched() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let platform = FakePlatform::default();
        let outcome = maybe_restart(&enabled("start.sh"), server.path(), &platform);
        assert!(matches!(outcome, RestartOutcome::ScriptMissing(_)));
        assert!(platform.launches().is_empty());
        Ok(())
    }

    #[test]
    fn test_launch_failure_is_reported() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        write_file(server.path(), "start.sh", "exit 0");
        let platform = FakePlatform {
            fail_launch: true,
            ..Default::default()
        };
        let outcome = maybe_restart(&enabled("start.sh"), server.path(), &platform);
        assert!(matches!(outcome, RestartOutcome::LaunchFailed(_)));
        Ok(())
    }
}
