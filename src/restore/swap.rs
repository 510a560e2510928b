// world-restore/src/restore/swap.rs
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{RestoreError, Result};
use crate::utils::logging::success;
use crate::utils::replicate::{CopyReport, copy_tree};
use crate::utils::tree::remove_tree;

/// Marker file every Bedrock world carries at its top level.
const WORLD_MARKER: &str = "level.dat";

/// Finds the world inside an extraction staging area. Archives made by the
/// plugin hold `<world>/...`; full server snapshots hold
/// `worlds/<world>/...`; bare archives hold the world's files directly,
/// which is only accepted when `level.dat` sits at the staging root.
pub fn locate_staged_world(staging: &Path, world_name: &str) -> Result<PathBuf> {
    let candidates = [
        staging.join("worlds").join(world_name),
        staging.join(world_name),
    ];
    if let Some(found) = candidates.into_iter().find(|p| p.is_dir()) {
        return Ok(found);
    }

    if staging.join(WORLD_MARKER).is_file() {
        return Ok(staging.to_path_buf());
    }
    Err(RestoreError::WorldNotStaged {
        world: world_name.to_string(),
        staging: staging.to_path_buf(),
    })
}

/// Replaces the active world with the extracted one: the old tree is
/// deleted bottom-up (read-only files included), then the extracted tree is
/// copied into its place.
///
/// The two passes are not atomic. If the process dies between them the
/// server is left without an active world.
pub fn replace(
    active_world_dir: &Path,
    extracted_world_dir: &Path,
    workers: usize,
) -> Result<CopyReport> {
    if fs::symlink_metadata(active_world_dir).is_ok() {
        warn!(
            "Old world directory exists: {}",
            active_world_dir.display()
        );
        info!("Deleting old world directory...");
        remove_tree(active_world_dir)?;
        success!("Old world directory deleted");
    }

    info!(
        "Copying {} ==> {} using {} worker(s)",
        extracted_world_dir.display(),
        active_world_dir.display(),
        workers
    );
    let report = copy_tree(extracted_world_dir, active_world_dir, workers)?;
    success!(
        "File copy completed: {} file(s), {} director(y/ies)",
        report.copied,
        report.directories
    );
    Ok(report)
}
