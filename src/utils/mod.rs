pub mod logging;
pub mod platform;
pub mod process;
pub mod replicate;
pub mod tree;
pub mod workspace;

use std::path::{Path, PathBuf};
use which::which;

/// Resolves a configured executable. Bare names are looked up in PATH;
/// anything with a directory component is taken relative to `base_dir`.
pub fn resolve_executable(base_dir: &Path, configured: &Path) -> PathBuf {
    let is_bare_name = configured.components().count() == 1 && !configured.is_absolute();
    if is_bare_name {
        if let Ok(found) = which(configured) {
            return found;
        }
    }
    crate::config::resolve_path(base_dir, configured)
}

/// Finds the system `tar` in PATH, if there is one.
pub fn find_tar_executable() -> Option<PathBuf> {
    which("tar").ok()
}
