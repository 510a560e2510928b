//! Host platform differences: how the server process is named, how the
//! process table is read and how a start script is launched detached.
//!
//! Everything platform-specific goes through [`Platform`]; callers receive
//! one implementation from [`current`] and never branch on the OS themselves.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

pub trait Platform: Send + Sync {
    /// Platform family name ("windows", "unix")
    fn name(&self) -> &'static str;

    /// Executable name of the game server process
    fn server_process_name(&self) -> &'static str;

    /// Raw process listing, one process per line with the image name as the
    /// first token.
    fn list_processes(&self) -> io::Result<String>;

    /// Starts `script` with `cwd` as working directory without waiting for it.
    fn launch_detached(&self, script: &Path, cwd: &Path) -> io::Result<()>;
}

pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn server_process_name(&self) -> &'static str {
        "bedrock_server.exe"
    }

    fn list_processes(&self) -> io::Result<String> {
        capture_listing(Command::new("tasklist").args(["/FO", "TABLE", "/NH"]))
    }

    fn launch_detached(&self, script: &Path, cwd: &Path) -> io::Result<()> {
        let mut cmd = Command::new("cmd");
        cmd.args(start_args(script))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let child = cmd.spawn()?;
        drop(child);
        Ok(())
    }
}

/// Arguments for `cmd` that open `script` in its own console window. The
/// empty first argument to `start` is the window title; without it a quoted
/// script path would be taken as the title and nothing would run.
fn start_args(script: &Path) -> Vec<OsString> {
    vec![
        OsString::from("/C"),
        OsString::from("start"),
        OsString::from(""),
        OsString::from("/I"),
        script.as_os_str().to_os_string(),
    ]
}

pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn server_process_name(&self) -> &'static str {
        "bedrock_server"
    }

    fn list_processes(&self) -> io::Result<String> {
        capture_listing(Command::new("ps").args(["-A", "-o", "comm="]))
    }

    fn launch_detached(&self, script: &Path, cwd: &Path) -> io::Result<()> {
        let mut cmd = Command::new("bash");
        cmd.arg(script)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0); // survive the restore tool exiting
        }

        let child = cmd.spawn()?;
        drop(child); // Drop handle to detach
        Ok(())
    }
}

fn capture_listing(cmd: &mut Command) -> io::Result<String> {
    let output = cmd.stdin(Stdio::null()).stderr(Stdio::null()).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "process listing exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Platform implementation for the host operating system.
pub fn current() -> Arc<dyn Platform> {
    if cfg!(windows) {
        Arc::new(WindowsPlatform)
    } else {
        Arc::new(UnixPlatform)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_gets_empty_title_before_script() {
        let script = Path::new(r"C:\Bedrock Server\start.bat");
        let args = start_args(script);
        assert_eq!(
            args,
            vec![
                OsString::from("/C"),
                OsString::from("start"),
                OsString::new(),
                OsString::from("/I"),
                OsString::from(r"C:\Bedrock Server\start.bat"),
            ]
        );
    }
}
