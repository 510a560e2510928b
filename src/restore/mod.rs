mod logic;
pub(crate) mod restart;
pub(crate) mod swap;

pub use logic::RestoreOutcome;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backup::archive::ArchiveBackend;
use crate::config::Config;
use crate::errors::Result;
use crate::utils::platform::Platform;
use crate::utils::process::WaitPolicy;

/// What to restore and where. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub backup_file: PathBuf,
    pub server_dir: PathBuf,
    pub world_name: String,
}

impl RestoreRequest {
    /// A relative archive path is taken from the current directory when it
    /// exists there, otherwise from the server directory.
    pub fn new(backup_file: &Path, server_dir: &Path, world_name: &str) -> Self {
        let backup_file = if backup_file.is_relative() && !backup_file.exists() {
            server_dir.join(backup_file)
        } else {
            backup_file.to_path_buf()
        };
        RestoreRequest {
            backup_file,
            server_dir: server_dir.to_path_buf(),
            world_name: world_name.to_string(),
        }
    }

    pub fn worlds_dir(&self) -> PathBuf {
        self.server_dir.join("worlds")
    }

    pub fn world_dir(&self) -> PathBuf {
        self.worlds_dir().join(&self.world_name)
    }
}

/// Everything a restore run needs, built once and handed to each phase.
pub struct RestoreContext {
    pub request: RestoreRequest,
    pub config: Config,
    pub backend: ArchiveBackend,
    pub platform: Arc<dyn Platform>,
    pub wait: WaitPolicy,
}

impl RestoreContext {
    pub fn new(
        request: RestoreRequest,
        config: Config,
        platform: Arc<dyn Platform>,
        wait: WaitPolicy,
    ) -> Self {
        let backend = ArchiveBackend::from_config(&config, &request.server_dir);
        RestoreContext {
            request,
            config,
            backend,
            platform,
            wait,
        }
    }
}

/// Public entry point for the restore process.
pub fn run_restore_flow(ctx: &RestoreContext) -> Result<RestoreOutcome> {
    logic::perform_restore_orchestration(ctx)
}
