// world-restore/src/backup/logic.rs
use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::resolve_path;
use crate::errors::{IoContext, Result};
use crate::restore::RestoreContext;
use crate::utils::logging::success;
use crate::utils::replicate::copy_tree;
use crate::utils::workspace::{PRE_BACKUP_WORKSPACE, Workspace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreBackupOutcome {
    Disabled,
    NoActiveWorld,
    Saved(PathBuf),
    Failed(String),
}

/// `before_restore_<YYYYMMDD_HHMMSS>.<extension>`
pub fn backup_file_name(now: DateTime<Local>, extension: &str) -> String {
    format!("before_restore_{}.{}", now.format("%Y%m%d_%H%M%S"), extension)
}

pub(super) fn perform_pre_restore_backup(ctx: &RestoreContext) -> PreBackupOutcome {
    if !ctx.config.backup_old_world_before_restore {
        info!("Configured not to back up the current world");
        return PreBackupOutcome::Disabled;
    }

    info!("Configured to back up the current world before restoring");
    match snapshot_current_world(ctx) {
        Ok(Some(archive)) => {
            success!("Pre-restore backup completed");
            PreBackupOutcome::Saved(archive)
        }
        Ok(None) => PreBackupOutcome::NoActiveWorld,
        Err(e) => {
            error!("Pre-restore backup failed: {}", e);
            PreBackupOutcome::Failed(e.to_string())
        }
    }
}

/// Copies the active world into a scratch workspace and compresses it into
/// the backup folder. The workspace is removed whether or not compression
/// succeeds.
fn snapshot_current_world(ctx: &RestoreContext) -> Result<Option<PathBuf>> {
    let request = &ctx.request;
    let world_dir = request.world_dir();
    if !world_dir.is_dir() {
        warn!(
            "No active world at {}, nothing to back up",
            world_dir.display()
        );
        return Ok(None);
    }

    let backup_dir = resolve_path(&request.server_dir, &ctx.config.backup_folder);
    fs::create_dir_all(&backup_dir).with_path("create backup directory", &backup_dir)?;

    let workspace = Workspace::create(&request.server_dir, PRE_BACKUP_WORKSPACE)?;
    let staged_world = workspace.path().join(&request.world_name);

    info!("Backing up current world: {}", world_dir.display());
    let report = copy_tree(&world_dir, &staged_world, ctx.config.max_workers)?;
    if !report.is_complete() {
        warn!(
            "{} file(s) could not be copied into the pre-restore backup",
            report.failed.len()
        );
    }

    let archive = backup_dir.join(backup_file_name(Local::now(), ctx.backend.extension()));
    ctx.backend.compress(&staged_world, &archive)?;
    success!("Backup file saved: {}", archive.display());
    Ok(Some(archive))
}
