// world-restore/src/utils/process.rs
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::{RestoreError, Result};
use crate::utils::logging::success;
use crate::utils::platform::Platform;

/// How long and how often to sample the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub deadline: Option<Duration>,
}

pub struct ProcessMonitor<'a> {
    platform: &'a dyn Platform,
    process_name: &'a str,
}

impl<'a> ProcessMonitor<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        ProcessMonitor {
            platform,
            process_name: platform.server_process_name(),
        }
    }

    /// Samples the process table once. A listing that cannot be read is
    /// reported as "not running".
    pub fn is_server_running(&self) -> bool {
        match self.platform.list_processes() {
            Ok(listing) => listing_contains(&listing, self.process_name),
            Err(e) => {
                error!(
                    "Failed to query process list on {} ({}), assuming {} is not running",
                    self.platform.name(),
                    e,
                    self.process_name
                );
                false
            }
        }
    }

    /// Blocks until the server process is absent from the process table.
    /// Without a deadline this waits indefinitely.
    pub fn wait_until_stopped(&self, policy: WaitPolicy) -> Result<()> {
        if !self.is_server_running() {
            info!(
                "No {} process detected, continuing with restore",
                self.process_name
            );
            return Ok(());
        }

        warn!(
            "Detected running {} process, waiting for the server to shut down",
            self.process_name
        );
        let started = Instant::now();
        loop {
            if let Some(deadline) = policy.deadline {
                if started.elapsed() >= deadline {
                    return Err(RestoreError::ServerStillRunning {
                        process: self.process_name.to_string(),
                        waited: started.elapsed(),
                    });
                }
            }
            thread::sleep(policy.poll_interval);
            if !self.is_server_running() {
                break;
            }
            debug!(
                "{} still running after {}s",
                self.process_name,
                started.elapsed().as_secs()
            );
        }

        success!("Server has shut down");
        Ok(())
    }
}

/// True when any listing line names `process_name` as its image.
pub fn listing_contains(listing: &str, process_name: &str) -> bool {
    listing.lines().any(|line| {
        line.split_whitespace()
            .next()
            .and_then(|image| Path::new(image).file_name())
            .is_some_and(|image| {
                image
                    .to_string_lossy()
                    .eq_ignore_ascii_case(process_name)
            })
    })
}
