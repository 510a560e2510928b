// world-restore/src/utils/replicate.rs
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::errors::{IoContext, Result};
use crate::utils::tree::clear_readonly;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Everything one walk of the source tree discovered.
#[derive(Debug, Default)]
pub struct CopyPlan {
    pub directories: Vec<PathBuf>,
    pub tasks: Vec<CopyTask>,
}

#[derive(Debug, Default)]
pub struct CopyReport {
    pub directories: usize,
    pub copied: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl CopyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Walks `source` once, mapping every directory and regular file onto
/// `destination`. Directories are listed in discovery order, parents first.
pub fn plan_copy(source: &Path, destination: &Path) -> Result<CopyPlan> {
    let mut plan = CopyPlan::default();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::other(e.to_string()))
            .with_path("map", entry.path())?;
        let target = destination.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            plan.directories.push(target);
        } else if file_type.is_file() {
            plan.tasks.push(CopyTask {
                source: entry.path().to_path_buf(),
                destination: target,
            });
        } else {
            debug!("Skipping non-regular file: {}", entry.path().display());
        }
    }
    Ok(plan)
}

/// Splits `tasks` into at most `workers` contiguous batches of
/// `ceil(len / workers)` tasks; the last batch may be shorter.
pub fn partition(tasks: &[CopyTask], workers: usize) -> Vec<&[CopyTask]> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let workers = workers.max(1);
    let batch_size = tasks.len().div_ceil(workers);
    tasks.chunks(batch_size).collect()
}

/// Copies one file, carrying over its timestamps and permission bits.
pub fn copy_file(task: &CopyTask) -> io::Result<u64> {
    let metadata = fs::metadata(&task.source)?;
    if fs::symlink_metadata(&task.destination).is_ok() {
        clear_readonly(&task.destination)?;
    }

    let mut src = File::open(&task.source)?;
    let mut dst = File::create(&task.destination)?;
    let bytes = io::copy(&mut src, &mut dst)?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    dst.set_times(times)?;
    drop(dst);

    // Permissions last: a read-only source would block the writes above.
    fs::set_permissions(&task.destination, metadata.permissions())?;
    Ok(bytes)
}

fn copy_batch(batch: &[CopyTask]) -> (usize, Vec<(PathBuf, String)>) {
    let mut copied = 0;
    let mut failed = Vec::new();
    for task in batch {
        match copy_file(task) {
            Ok(_) => {
                copied += 1;
                debug!(
                    "Copied file: {} --> {}",
                    task.source.display(),
                    task.destination.display()
                );
            }
            Err(e) => {
                error!(
                    "Failed to copy file: {} --> {}: {}",
                    task.source.display(),
                    task.destination.display(),
                    e
                );
                failed.push((task.source.clone(), e.to_string()));
            }
        }
    }
    (copied, failed)
}

/// Recursively copies `source` into `destination` using up to `workers`
/// threads.
///
/// All destination directories are created before any file is copied. The
/// file list is cut into batches which a fixed pool of scoped threads pulls
/// from a shared cursor; the call returns once every worker has joined.
/// A file that fails to copy is logged and recorded in the report without
/// stopping the rest of the copy.
pub fn copy_tree(source: &Path, destination: &Path, workers: usize) -> Result<CopyReport> {
    let plan = plan_copy(source, destination)?;

    for dir in &plan.directories {
        fs::create_dir_all(dir).with_path("create directory", dir)?;
        debug!("Created directory: {}", dir.display());
    }
    // An empty source still yields the destination root.
    if plan.directories.is_empty() {
        fs::create_dir_all(destination).with_path("create directory", destination)?;
    }

    let mut report = CopyReport {
        directories: plan.directories.len(),
        ..Default::default()
    };

    let batches = partition(&plan.tasks, workers);
    if batches.is_empty() {
        return Ok(report);
    }

    let pool_size = workers.max(1).min(batches.len());
    let cursor = AtomicUsize::new(0);
    let results: Vec<(usize, Vec<(PathBuf, String)>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..pool_size)
            .map(|_| {
                scope.spawn(|| {
                    let mut copied = 0;
                    let mut failed = Vec::new();
                    loop {
                        let next = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(batch) = batches.get(next) else {
                            break;
                        };
                        let (n, mut errs) = copy_batch(batch);
                        copied += n;
                        failed.append(&mut errs);
                    }
                    (copied, failed)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    (0, vec![(source.to_path_buf(), "copy worker panicked".to_string())])
                })
            })
            .collect()
    });

    for (copied, mut failed) in results {
        report.copied += copied;
        report.failed.append(&mut failed);
    }
    Ok(report)
}
