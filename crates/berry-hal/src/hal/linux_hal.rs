//! Linux HAL implementation using real system calls.

use super::{CommandSpec, MountOps, ProcessOps, SystemOps};
use crate::{HalError, HalResult};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

const DROP_CACHES: &str = "/proc/sys/vm/drop_caches";

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone)]
pub struct LinuxHal {
    drop_caches_path: PathBuf,
}

impl Default for LinuxHal {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHal {
    pub fn new() -> Self {
        Self {
            drop_caches_path: PathBuf::from(DROP_CACHES),
        }
    }

    /// Use a different page-cache control file (tests only write to a temp file).
    pub fn with_drop_caches_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.drop_caches_path = path.into();
        self
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::DeviceBusy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        other => HalError::Nix(other),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl ProcessOps for LinuxHal {
    fn run(&self, spec: &CommandSpec) -> HalResult<Output> {
        log::info!("exec: {}", spec);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        let mut child = cmd.spawn().map_err(|e| map_command_err(&spec.program, e))?;

        // Drain pipes concurrently so a chatty child never blocks on a full pipe.
        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let mut write_result = Ok(());
        if let (Some(input), Some(mut stdin)) = (spec.stdin.as_ref(), child.stdin.take()) {
            write_result = stdin.write_all(input);
            // stdin is dropped here, closing the write channel.
        }

        let status = child.wait()?;
        match write_result {
            // A child that exits before reading its input reports through its status.
            Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => return Err(err.into()),
            _ => {}
        }
        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        if !stdout.is_empty() {
            log::debug!("{} stdout: {}", spec.program, String::from_utf8_lossy(&stdout).trim());
        }
        if !stderr.is_empty() {
            log::debug!("{} stderr: {}", spec.program, String::from_utf8_lossy(&stderr).trim());
        }
        log::info!("{} exited with {:?}", spec.program, status.code());

        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }
}

impl SystemOps for LinuxHal {
    fn sync(&self) -> HalResult<()> {
        nix::unistd::sync();
        Ok(())
    }

    fn drop_caches(&self) -> HalResult<()> {
        fs::write(&self.drop_caches_path, b"3\n")?;
        Ok(())
    }
}

impl MountOps for LinuxHal {
    fn mount_device(&self, device: &Path, target: &Path, fstype: Option<&str>) -> HalResult<()> {
        log::info!(
            "mount {} -> {} (type: {:?})",
            device.display(),
            target.display(),
            fstype
        );
        let flags = nix::mount::MsFlags::empty();
        nix::mount::mount(Some(device), target, fstype, flags, None::<&str>).map_err(map_nix_err)
    }

    fn unmount(&self, target: &Path) -> HalResult<()> {
        log::info!("umount {}", target.display());
        match nix::mount::umount2(target, nix::mount::MntFlags::empty()) {
            Ok(()) => Ok(()),
            // EINVAL: target is not a mount point.
            Err(nix::errno::Errno::EINVAL) => Ok(()),
            Err(err) => Err(map_nix_err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_feeds_stdin_and_captures_stdout() {
        let hal = LinuxHal::new();
        let spec = CommandSpec::new("cat").stdin("2048,102400,0E\n");
        let output = hal.run(&spec).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"2048,102400,0E\n");
    }

    #[test]
    fn run_status_reports_exit_code() {
        let hal = LinuxHal::new();
        let err = hal.run_status(&CommandSpec::new("false")).unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { .. }));
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn missing_program_is_command_not_found() {
        let hal = LinuxHal::new();
        let err = hal
            .run(&CommandSpec::new("berry-hal-no-such-tool"))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(ref p) if p == "berry-hal-no-such-tool"));
    }

    #[test]
    fn drop_caches_writes_three() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop_caches");
        let hal = LinuxHal::new().with_drop_caches_path(&path);
        hal.drop_caches().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "3\n");
    }
}
