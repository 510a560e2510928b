// world-restore/src/utils/workspace.rs
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{IoContext, Result};
use crate::utils::tree::remove_tree;

pub const RESTORE_WORKSPACE: &str = "temp_restore";
pub const PRE_BACKUP_WORKSPACE: &str = "temp_old_world_backup";

/// A scratch directory owned by the current run. Any leftover from an
/// earlier run is wiped on creation and the directory is removed again
/// when the guard is dropped, whichever way the phase ends.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn create(server_dir: &Path, name: &str) -> Result<Self> {
        let path = server_dir.join(name);
        if fs::symlink_metadata(&path).is_ok() {
            warn!("Removing stale workspace: {}", path.display());
            remove_tree(&path)?;
        }
        fs::create_dir_all(&path).with_path("create workspace", &path)?;
        info!("Created temporary directory: {}", path.display());
        Ok(Workspace { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match remove_tree(&self.path) {
            Ok(()) => info!("Removed temporary directory: {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove temporary directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Removes every workspace a run may have created. Used when the run is
/// interrupted and the guards never get to drop.
pub fn discard_all(server_dir: &Path) {
    for name in [RESTORE_WORKSPACE, PRE_BACKUP_WORKSPACE] {
        let path = server_dir.join(name);
        if let Err(e) = remove_tree(&path) {
            warn!("Failed to remove temporary directory {}: {}", path.display(), e);
        }
    }
}
