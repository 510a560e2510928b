use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("{backend} executable not found: {}", path.display())]
    BackendUnavailable { backend: &'static str, path: PathBuf },

    #[error("Failed to start {backend}: {source}")]
    ArchiveSpawn {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} {operation} failed ({status}): {output}")]
    ArchiveOperationFailed {
        backend: &'static str,
        operation: &'static str,
        status: String,
        output: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{process} still running after waiting {}s", waited.as_secs())]
    ServerStillRunning { process: String, waited: Duration },

    #[error("Archive did not contain world '{world}' (nothing usable in {})", staging.display())]
    WorldNotStaged { world: String, staging: PathBuf },
}

impl RestoreError {
    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;

/// Attaches a path-bearing description to `std::io` failures.
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn with_path(self, action: &str, path: &Path) -> Result<T>
    where
        Self: Sized,
    {
        self.io_context(|| format!("Failed to {} {}", action, path.display()))
    }
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| RestoreError::Io {
            context: f(),
            source,
        })
    }
}
