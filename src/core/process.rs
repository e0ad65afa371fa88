//! PTY-backed child process wrapper.
//!
//! This module provides a safe wrapper around a Unix pseudo-terminal pair
//! for spawning and managing the editor process: the child runs with
//! stdin/stdout/stderr bound to the pty slave, while this side owns two
//! endpoints on the pty master (a non-blocking reader and an independent
//! duplicated writer).

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long `terminate`/`kill` waits for the exit status before giving
/// the caller back control to escalate.
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Interval between reap attempts inside the grace window.
const REAP_INTERVAL: Duration = Duration::from_millis(10);

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("executable {name:?} not found on PATH: {source}")]
    ExecutableNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to allocate pty: {0}")]
    Openpty(#[source] Errno),

    #[error("failed to duplicate pty endpoint: {0}")]
    Endpoint(#[source] io::Error),

    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to set non-blocking mode: {0}")]
    NonBlocking(#[source] Errno),

    #[error("failed to poll pty: {0}")]
    Poll(#[source] Errno),

    #[error("failed to read from pty: {0}")]
    Read(#[source] Errno),

    #[error("failed to write to pty: {0}")]
    Write(#[source] Errno),

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to resize pty: {0}")]
    Resize(#[source] Errno),

    #[error("pty endpoints are closed")]
    Closed,
}

/// A background editor process attached to a pseudo-terminal.
///
/// The read and write endpoints refer to the same pty master, so one
/// actor can type keystrokes and read the combined stdout+stderr stream
/// the child produces.
#[derive(Debug)]
pub struct Process {
    executable: PathBuf,
    args: Vec<String>,
    child: Child,
    reader: Option<OwnedFd>,
    writer: Option<OwnedFd>,
    exit_status: Option<ExitStatus>,
}

impl Process {
    /// Resolve `executable` on `PATH`, allocate a pty sized to
    /// (`rows`, `cols`) and spawn the child on its slave end.
    ///
    /// When `env` is given the child environment is replaced wholesale;
    /// otherwise it inherits from this process.
    pub fn spawn<I, K, V>(
        executable: &str,
        args: &[String],
        env: Option<I>,
        rows: u16,
        cols: u16,
    ) -> Result<Self, ProcessError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<std::ffi::OsStr>,
        V: AsRef<std::ffi::OsStr>,
    {
        let resolved = which::which(executable).map_err(|source| {
            ProcessError::ExecutableNotFound {
                name: executable.to_string(),
                source,
            }
        })?;

        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let pty = openpty(Some(&winsize), None).map_err(ProcessError::Openpty)?;

        let slave_stdin = pty.slave.try_clone().map_err(ProcessError::Endpoint)?;
        let slave_stdout = pty.slave.try_clone().map_err(ProcessError::Endpoint)?;

        let mut command = Command::new(&resolved);
        command
            .args(args)
            .stdin(Stdio::from(slave_stdin))
            .stdout(Stdio::from(slave_stdout))
            .stderr(Stdio::from(pty.slave));
        if let Some(env) = env {
            command.env_clear();
            command.envs(env);
        }

        // The child must run in its own session with the slave as its
        // controlling terminal, otherwise the editor refuses the tty.
        // pre_exec runs after stdio is wired up, so fd 0 is the slave.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(io::Error::last_os_error());
                }
                // Best effort; some systems grant the controlling tty
                // implicitly on first open after setsid.
                libc::ioctl(0, libc::TIOCSCTTY as libc::c_ulong, 0);
                Ok(())
            });
        }

        let child = command.spawn().map_err(ProcessError::Spawn)?;
        info!(pid = child.id(), executable = %resolved.display(), "spawned editor process");

        set_nonblocking(pty.master.as_fd())?;
        let writer = unistd::dup(pty.master.as_fd())
            .map_err(|e| ProcessError::Endpoint(io::Error::from_raw_os_error(e as i32)))?;

        Ok(Self {
            executable: resolved,
            args: args.to_vec(),
            child,
            reader: Some(pty.master),
            writer: Some(writer),
            exit_status: None,
        })
    }

    /// Absolute path of the resolved executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Launch arguments of the process.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Block up to `timeout` waiting for the read endpoint to become
    /// readable; does not consume any data.
    pub fn check_readable(&self, timeout: Duration) -> Result<bool, ProcessError> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(false);
        };
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let timeout = PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX);
        loop {
            let mut fds = [PollFd::new(reader.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(0) => return Ok(false),
                Ok(_) => {
                    return Ok(fds[0]
                        .revents()
                        .map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
                        .unwrap_or(false))
                }
                // Interrupted polls restart with the full timeout.
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(ProcessError::Poll(e)),
            }
        }
    }

    /// Read everything currently buffered on the pty master without
    /// blocking. Returns an empty vector when the editor is idle.
    pub fn read_available(&mut self) -> Result<Vec<u8>, ProcessError> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match unistd::read(reader.as_fd(), &mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(Errno::EAGAIN) => break,
                Err(Errno::EINTR) => continue,
                // EIO means the slave side is gone; treat as EOF.
                Err(Errno::EIO) => break,
                Err(e) => return Err(ProcessError::Read(e)),
            }
        }
        Ok(out)
    }

    /// Write `bytes` to the pty master in full. Pty fds are unbuffered,
    /// so a completed write is already delivered to the line discipline.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ProcessError> {
        let Some(writer) = self.writer.as_ref() else {
            return Err(ProcessError::Closed);
        };
        let mut written = 0;
        while written < bytes.len() {
            match unistd::write(writer.as_fd(), &bytes[written..]) {
                Ok(n) => written += n,
                // The writer shares O_NONBLOCK with the master; block on
                // the fd instead of spinning while the buffer is full.
                Err(Errno::EAGAIN) => wait_writable(writer.as_fd())?,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(ProcessError::Write(e)),
            }
        }
        Ok(())
    }

    /// Apply a new window size to the pty so the child observes the
    /// changed geometry.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ProcessError> {
        let Some(reader) = self.reader.as_ref() else {
            return Err(ProcessError::Closed);
        };
        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: TIOCSWINSZ with a valid winsize pointer on an open fd.
        let ret = unsafe {
            libc::ioctl(
                reader.as_raw_fd(),
                libc::TIOCSWINSZ as libc::c_ulong,
                &winsize as *const Winsize,
            )
        };
        if ret < 0 {
            return Err(ProcessError::Resize(Errno::last()));
        }
        debug!(rows, cols, "resized pty");
        Ok(())
    }

    /// Close both endpoints and terminate the child gracefully, waiting
    /// a bounded grace period for the exit status. If the child ignores
    /// the signal, returns with it still alive; the caller escalates to
    /// [`Process::kill`].
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        self.shutdown(Signal::SIGTERM)
    }

    /// Close both endpoints and kill the child forcefully.
    pub fn kill(&mut self) -> Result<(), ProcessError> {
        self.shutdown(Signal::SIGKILL)
    }

    fn shutdown(&mut self, sig: Signal) -> Result<(), ProcessError> {
        // Closing the master first signals EOF/HUP to the child.
        self.reader.take();
        self.writer.take();

        if self.exit_status.is_some() {
            return Ok(());
        }

        let pid = Pid::from_raw(self.child.id() as i32);
        match signal::kill(pid, sig) {
            Ok(()) => debug!(%pid, ?sig, "signaled editor process"),
            // Already gone; fall through to reap.
            Err(Errno::ESRCH) => {}
            Err(source) => {
                return Err(ProcessError::Signal {
                    pid: pid.as_raw(),
                    source,
                })
            }
        }

        let deadline = Instant::now() + REAP_GRACE;
        loop {
            match self.child.try_wait().map_err(ProcessError::Wait)? {
                Some(status) => {
                    info!(%pid, %status, "editor process exited");
                    self.exit_status = Some(status);
                    return Ok(());
                }
                None => {
                    if Instant::now() >= deadline {
                        warn!(%pid, ?sig, "editor process ignored signal within grace period");
                        return Ok(());
                    }
                    std::thread::sleep(REAP_INTERVAL);
                }
            }
        }
    }

    /// Best-effort liveness check; never fails. Observes and caches the
    /// exit status without blocking.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            // Wait errors (e.g. already reaped elsewhere) count as dead.
            Err(_) => false,
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.terminate();
            if self.is_alive() {
                let _ = self.kill();
            }
        }
    }
}

fn wait_writable(fd: BorrowedFd<'_>) -> Result<(), ProcessError> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLOUT)];
    match poll(&mut fds, PollTimeout::MAX) {
        Ok(_) => Ok(()),
        Err(Errno::EINTR) => Ok(()),
        Err(e) => Err(ProcessError::Poll(e)),
    }
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<(), ProcessError> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(ProcessError::NonBlocking)?;
    let new_flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(new_flags)).map_err(ProcessError::NonBlocking)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_cat() -> Process {
        Process::spawn::<Vec<(String, String)>, _, _>("cat", &[], None, 24, 80)
            .expect("failed to spawn cat")
    }

    #[test]
    fn test_spawn_resolves_absolute_path() {
        let process = spawn_cat();
        assert!(process.executable().is_absolute());
        assert!(process.executable().ends_with("cat"));
    }

    #[test]
    fn test_spawn_unknown_executable() {
        let err = Process::spawn::<Vec<(String, String)>, _, _>(
            "definitely-not-an-editor-3141",
            &[],
            None,
            24,
            80,
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::ExecutableNotFound { .. }));
    }

    #[test]
    fn test_write_then_readable() {
        let mut process = spawn_cat();
        process.write(b"hello\n").unwrap();
        assert!(process
            .check_readable(Duration::from_secs(2))
            .expect("poll failed"));
        let bytes = process.read_available().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // The pty line discipline echoes input, and cat writes it back.
        assert!(text.contains("hello"), "unexpected pty output: {text:?}");
        process.kill().unwrap();
    }

    #[test]
    fn test_check_readable_accepts_long_timeout() {
        let mut process = spawn_cat();
        process.write(b"ping\n").unwrap();
        // Data is already pending, so even a timeout far beyond the
        // u16 millisecond range must return promptly and report it.
        assert!(process.check_readable(Duration::from_secs(120)).unwrap());
        process.kill().unwrap();
    }

    #[test]
    fn test_bulk_write_completes() {
        let mut process = spawn_cat();
        let mut chunk = vec![b'a'; 1023];
        chunk.push(b'\n');
        let mut drained = 0usize;
        for _ in 0..64 {
            process.write(&chunk).unwrap();
            drained += process.read_available().unwrap().len();
        }
        while process.check_readable(Duration::from_millis(200)).unwrap() {
            let bytes = process.read_available().unwrap();
            if bytes.is_empty() {
                break;
            }
            drained += bytes.len();
        }
        // At minimum cat's own copy of every line must have come back.
        assert!(drained >= 64 * 1024, "only {drained} bytes came back");
        process.kill().unwrap();
    }

    #[test]
    fn test_check_readable_times_out_when_idle() {
        let mut process = spawn_cat();
        // Drain the initial echo state, then expect silence.
        let _ = process.read_available();
        assert!(!process.check_readable(Duration::from_millis(50)).unwrap());
        process.kill().unwrap();
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let mut process = spawn_cat();
        assert!(process.is_alive());
        process.terminate().unwrap();
        process.terminate().unwrap();
        assert!(!process.is_alive());
    }

    #[test]
    fn test_kill_after_terminate() {
        let mut process = spawn_cat();
        process.terminate().unwrap();
        if process.is_alive() {
            process.kill().unwrap();
        }
        assert!(!process.is_alive());
    }

    #[test]
    fn test_exited_child_observed_dead() {
        let mut process = Process::spawn::<Vec<(String, String)>, _, _>(
            "sh",
            &["-c".to_string(), "exit 0".to_string()],
            None,
            24,
            80,
        )
        .unwrap();
        // Give the shell a moment to exit on its own.
        for _ in 0..100 {
            if !process.is_alive() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!process.is_alive());
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut process = spawn_cat();
        process.kill().unwrap();
        assert!(matches!(
            process.write(b"x"),
            Err(ProcessError::Closed)
        ));
    }
}
