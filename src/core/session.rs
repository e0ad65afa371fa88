//! Editor session: composes the pty process and the emulated screen.
//!
//! A session owns one [`Process`], one [`Screen`] and one capture file.
//! It drives the cooperative wait/flush loop, mode transitions, and the
//! redirect-based command/output-capture protocol. There is exactly one
//! logical actor per session: writes and drains happen in sequence, which
//! gives callers a synchronous request/response view over the character
//! stream.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::arguments::{self, ArgSpec, ArgumentsError};
use crate::config::{ScreenSize, SessionConfig};
use crate::core::process::{Process, ProcessError};
use crate::core::screen::Screen;

/// Launch arguments used when none are configured: no viminfo, no
/// swapfile, no vimrc, nocompatible.
pub const DEFAULT_ARGS: &str = "-N -i NONE -n -u NONE";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Arguments(#[from] ArgumentsError),

    #[error("capture file error: {0}")]
    Capture(#[source] std::io::Error),

    #[error("capture file is closed")]
    CaptureClosed,

    #[error("mode {0:?} is not supported")]
    UnsupportedMode(String),
}

/// Editor modes reachable through [`Session::set_mode`].
///
/// The remote editor's mode is never tracked locally; transitions are
/// write-only and always pass through normal mode first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
    Command,
    Visual,
    VisualBlock,
}

impl Mode {
    /// Keystroke entering this mode from normal mode, if any.
    fn entry_key(self) -> Option<char> {
        match self {
            Mode::Normal => None,
            Mode::Insert => Some('i'),
            Mode::Command => Some(':'),
            Mode::Visual => Some('v'),
            Mode::VisualBlock => Some('V'),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Insert => "insert",
            Mode::Command => "command",
            Mode::Visual => "visual",
            Mode::VisualBlock => "visual-block",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Mode::Normal),
            "insert" => Ok(Mode::Insert),
            "command" => Ok(Mode::Command),
            "visual" => Ok(Mode::Visual),
            "visual-block" => Ok(Mode::VisualBlock),
            other => Err(SessionError::UnsupportedMode(other.to_string())),
        }
    }
}

/// A headless editor attached to a pty and mirrored into a screen
/// emulator.
pub struct Session {
    process: Process,
    screen: Screen,
    capture: Option<NamedTempFile>,
    encoding: String,
    timeout: Duration,
}

impl Session {
    /// Spawn the editor and drain its startup banner into the screen.
    pub fn open(config: &SessionConfig) -> Result<Self, SessionError> {
        let parser = arguments::Parser::new(ArgSpec::from(DEFAULT_ARGS));
        let args = parser.parse(config.args.as_ref())?;
        let ScreenSize { rows, cols } = config.size;
        let process = Process::spawn(&config.executable, &args, config.env.as_ref(), rows, cols)?;
        let screen = Screen::new(rows, cols);
        let capture = NamedTempFile::new().map_err(SessionError::Capture)?;

        let mut session = Self {
            process,
            screen,
            capture: Some(capture),
            encoding: config.encoding.clone(),
            timeout: config.timeout(),
        };
        session.wait(None)?;
        info!(executable = %session.process.executable().display(), "session opened");
        Ok(session)
    }

    /// Send a raw key sequence and wait until the editor goes idle.
    ///
    /// Editor-style key notation (like `<Esc>`) is not recognized; use
    /// escaped characters (like `"\x1b"`) instead.
    pub fn send_keys(&mut self, keys: &str) -> Result<(), SessionError> {
        self.send_keys_nowait(keys)?;
        self.wait(None)
    }

    /// Send a raw key sequence without waiting for a response.
    pub fn send_keys_nowait(&mut self, keys: &str) -> Result<(), SessionError> {
        self.process.write(keys.as_bytes())?;
        Ok(())
    }

    /// Drain editor output into the screen until a readability poll of
    /// `timeout` (the session timeout when `None`) comes back idle.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<(), SessionError> {
        let timeout = timeout.unwrap_or(self.timeout);
        while self.process.check_readable(timeout)? {
            let bytes = self.process.read_available()?;
            if bytes.is_empty() {
                break;
            }
            debug!(len = bytes.len(), "drained editor output");
            self.screen.feed(&bytes);
        }
        Ok(())
    }

    /// Switch the editor to `mode`: two escapes force normal mode, then
    /// the mode's entry key is sent.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SessionError> {
        let mut keys = String::from("\x1b\x1b");
        if let Some(entry) = mode.entry_key() {
            keys.push(entry);
        }
        self.send_keys(&keys)
    }

    /// Execute an ex command and capture its textual output.
    ///
    /// Output is redirected into the session's capture file, which is
    /// truncated per capture; the contents are returned with leading and
    /// trailing newlines stripped. Commands that do not need output
    /// should use [`Session::command_quiet`] instead. Do not redirect
    /// output yourself here; redirection is already in effect.
    pub fn command(&mut self, command: &str) -> Result<String, SessionError> {
        debug!(command, "running captured command");
        let redirect = match self.capture.as_ref() {
            Some(capture) => format!("redir! > {}", capture.path().display()),
            None => return Err(SessionError::CaptureClosed),
        };
        self.command_quiet(&redirect)?;
        self.run_command(command)?;
        self.command_quiet("redir END")?;

        let Some(capture) = self.capture.as_mut() else {
            return Err(SessionError::CaptureClosed);
        };
        let file = capture.as_file_mut();
        file.seek(SeekFrom::Start(0)).map_err(SessionError::Capture)?;
        let mut output = String::new();
        file.read_to_string(&mut output).map_err(SessionError::Capture)?;
        Ok(output.trim_matches('\n').to_string())
    }

    /// Execute an ex command without capturing its output. The redirect
    /// control commands themselves must go through here, never through
    /// [`Session::command`], to avoid nesting redirections.
    pub fn command_quiet(&mut self, command: &str) -> Result<(), SessionError> {
        self.run_command(command)
    }

    fn run_command(&mut self, command: &str) -> Result<(), SessionError> {
        self.set_mode(Mode::Command)?;
        self.send_keys(&format!("{command}\n"))
    }

    /// Evaluate `expr` through `:echo`. The expression is passed to the
    /// editor verbatim; quote string literals yourself.
    pub fn echo(&mut self, expr: &str) -> Result<String, SessionError> {
        self.command(&format!("echo {expr}"))
    }

    /// Terminate the editor, escalating to a forceful kill if it is
    /// still alive afterwards. Releases the capture file; safe to call
    /// repeatedly.
    pub fn close(&mut self) -> Result<(), SessionError> {
        // Dropping the temp file unlinks it.
        self.capture.take();
        self.process.terminate()?;
        if self.process.is_alive() {
            self.process.kill()?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn capture_path(&self) -> Option<std::path::PathBuf> {
        self.capture.as_ref().map(|capture| capture.path().to_path_buf())
    }

    /// Best-effort liveness of the editor process.
    pub fn is_alive(&mut self) -> bool {
        self.process.is_alive()
    }

    /// The rendered screen as one newline-joined string.
    pub fn display(&self) -> String {
        self.display_lines().join("\n")
    }

    /// The rendered screen, one fixed-width string per row.
    pub fn display_lines(&self) -> Vec<String> {
        self.screen.display_lines()
    }

    /// Absolute path of the resolved editor executable.
    pub fn executable(&self) -> &Path {
        self.process.executable()
    }

    /// Launch arguments of the editor process.
    pub fn args(&self) -> &[String] {
        self.process.args()
    }

    /// Configured text encoding label of the output stream.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Idle timeout of the wait/poll loop.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Screen geometry as (rows, cols).
    pub fn screen_size(&self) -> (u16, u16) {
        self.screen.size()
    }

    /// Resize the emulated screen and the pty. No-op when the size is
    /// unchanged.
    pub fn set_screen_size(&mut self, rows: u16, cols: u16) -> Result<(), SessionError> {
        if self.screen_size() == (rows, cols) {
            return Ok(());
        }
        self.screen.resize(rows, cols);
        self.process.resize(rows, cols)?;
        Ok(())
    }
}
