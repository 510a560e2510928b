// world-restore/src/backup/archive.rs
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tar::{Archive, Builder};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{IoContext, RestoreError, Result};
use crate::utils::logging::success;
use crate::utils::{find_tar_executable, resolve_executable};

const SEVEN_ZIP: &str = "7z";
const TAR: &str = "tar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Extract,
    Compress,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Extract => "extraction",
            Direction::Compress => "compression",
        }
    }
}

/// One archive operation, independent of the tool that will carry it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    pub direction: Direction,
    pub archive_path: PathBuf,
    pub directory_path: PathBuf,
}

impl ArchiveJob {
    pub fn extract(archive_path: &Path, destination_dir: &Path) -> Self {
        ArchiveJob {
            direction: Direction::Extract,
            archive_path: archive_path.to_path_buf(),
            directory_path: destination_dir.to_path_buf(),
        }
    }

    pub fn compress(source_dir: &Path, archive_path: &Path) -> Self {
        ArchiveJob {
            direction: Direction::Compress,
            archive_path: archive_path.to_path_buf(),
            directory_path: source_dir.to_path_buf(),
        }
    }
}

/// The archive tool used for every extract and compress of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveBackend {
    /// External 7-Zip compatible executable.
    SevenZip { executable: PathBuf },
    /// Gzip-compressed tar. Uses the system `tar` when one is on PATH and
    /// the built-in reader/writer otherwise.
    Tar { program: Option<PathBuf> },
}

impl ArchiveBackend {
    pub fn from_config(config: &Config, server_dir: &Path) -> Self {
        if config.use_7z {
            ArchiveBackend::SevenZip {
                executable: resolve_executable(server_dir, &config.exe_7z_path),
            }
        } else {
            ArchiveBackend::Tar {
                program: find_tar_executable(),
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArchiveBackend::SevenZip { .. } => SEVEN_ZIP,
            ArchiveBackend::Tar { .. } => TAR,
        }
    }

    /// File extension for archives this backend writes.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveBackend::SevenZip { .. } => "7z",
            ArchiveBackend::Tar { .. } => "tar.gz",
        }
    }

    pub fn extract(&self, archive_path: &Path, destination_dir: &Path) -> Result<()> {
        self.run(&ArchiveJob::extract(archive_path, destination_dir))
    }

    pub fn compress(&self, source_dir: &Path, archive_path: &Path) -> Result<()> {
        self.run(&ArchiveJob::compress(source_dir, archive_path))
    }

    pub fn run(&self, job: &ArchiveJob) -> Result<()> {
        info!(
            "{} with {}: {} <-> {}",
            capitalize(job.direction.as_str()),
            self.name(),
            job.archive_path.display(),
            job.directory_path.display()
        );
        prepare(job)?;

        match self {
            ArchiveBackend::SevenZip { executable } => {
                if !executable.is_file() {
                    return Err(RestoreError::BackendUnavailable {
                        backend: SEVEN_ZIP,
                        path: executable.clone(),
                    });
                }
                let mut cmd = Command::new(executable);
                match job.direction {
                    Direction::Extract => {
                        let mut out = std::ffi::OsString::from("-o");
                        out.push(&job.directory_path);
                        cmd.arg("x").arg(&job.archive_path).arg(out).arg("-y");
                    }
                    Direction::Compress => {
                        cmd.arg("a")
                            .arg(&job.archive_path)
                            .arg(&job.directory_path)
                            .arg("-y");
                    }
                }
                run_tool(cmd, SEVEN_ZIP, job.direction)?;
            }
            ArchiveBackend::Tar {
                program: Some(program),
            } => {
                let mut cmd = Command::new(program);
                match job.direction {
                    Direction::Extract => {
                        cmd.arg("-xzf")
                            .arg(&job.archive_path)
                            .arg("-C")
                            .arg(&job.directory_path);
                    }
                    Direction::Compress => {
                        let (parent, name) = split_dir(&job.directory_path)?;
                        cmd.arg("-czf")
                            .arg(&job.archive_path)
                            .arg("-C")
                            .arg(parent)
                            .arg(name);
                    }
                }
                run_tool(cmd, TAR, job.direction)?;
            }
            ArchiveBackend::Tar { program: None } => {
                let outcome = match job.direction {
                    Direction::Extract => {
                        extract_tar_gz_archive(&job.archive_path, &job.directory_path)
                    }
                    Direction::Compress => {
                        create_tar_gz_archive(&job.directory_path, &job.archive_path)
                    }
                };
                outcome.map_err(|e| RestoreError::ArchiveOperationFailed {
                    backend: TAR,
                    operation: job.direction.as_str(),
                    status: "built-in".to_string(),
                    output: e.to_string(),
                })?;
            }
        }

        success!("{} {} completed", self.name(), job.direction.as_str());
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Creates the directory an operation writes into.
fn prepare(job: &ArchiveJob) -> Result<()> {
    match job.direction {
        Direction::Extract => {
            fs::create_dir_all(&job.directory_path)
                .with_path("create extraction directory", &job.directory_path)?;
        }
        Direction::Compress => {
            if let Some(parent) = job.archive_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .with_path("create parent directory for archive", parent)?;
                }
            }
        }
    }
    Ok(())
}

fn split_dir(dir: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let name = dir.file_name().ok_or_else(|| RestoreError::Io {
        context: format!("Cannot archive {}", dir.display()),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no final component"),
    })?;
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((parent, name))
}

/// Runs an archive tool to completion. Non-zero exit is an error carrying
/// the tool's diagnostics; on success its stdout is logged line by line.
fn run_tool(mut cmd: Command, backend: &'static str, direction: Direction) -> Result<()> {
    debug!("Executing command: {:?}", cmd);
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| RestoreError::ArchiveSpawn { backend, source })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostics = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        return Err(RestoreError::ArchiveOperationFailed {
            backend,
            operation: direction.as_str(),
            status: output.status.to_string(),
            output: diagnostics.to_string(),
        });
    }

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        info!("{}", line);
    }
    Ok(())
}

/// Creates a gzipped tar of `source_dir`. Entries are stored under the
/// directory's own name, the same layout `tar -C <parent> <name>` gives.
pub fn create_tar_gz_archive(source_dir: &Path, archive_dest_path: &Path) -> io::Result<()> {
    if !source_dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "Source for archival is not a directory: {}",
                source_dir.display()
            ),
        ));
    }
    let name = source_dir.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "source directory has no name")
    })?;

    let archive_file = File::create(archive_dest_path)?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = Builder::new(enc);
    tar_builder.follow_symlinks(false);
    tar_builder.append_dir_all(name, source_dir)?;

    let encoder = tar_builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Extracts a gzipped tar into `extract_to_dir`.
pub fn extract_tar_gz_archive(archive_path: &Path, extract_to_dir: &Path) -> io::Result<()> {
    if !archive_path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "Archive for extraction is not a file: {}",
                archive_path.display()
            ),
        ));
    }

    let archive_file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(archive_file));
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.unpack(extract_to_dir)
}
