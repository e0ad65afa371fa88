//! vimpilot: drive a headless Vim through a pseudo-terminal.
//!
//! This crate spawns an interactive editor as a subprocess inside a pty
//! and exposes it as a scriptable automation handle: send key sequences,
//! read back the rendered screen, and execute ex commands while capturing
//! their textual output. Intended for automated testing and scripting of
//! editor behavior; no client/server protocol, no remote plugin host.
//!
//! - **core::process**: pty + child lifecycle, non-blocking I/O, polling
//! - **core::screen**: vt100-backed screen grid adapter
//! - **core::session**: wait/flush loop, modes, output-capture protocol
//! - **runtimepath**: live view over the `runtimepath` setting
//!
//! # Architecture
//!
//! ```text
//! Vim (handle)
//! └── Session
//!     ├── Process (pty master <-> editor child)
//!     ├── Screen  (vt100 grid)
//!     └── capture file (:redir target)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vimpilot::SessionConfig;
//!
//! fn main() -> vimpilot::Result<()> {
//!     let mut vim = vimpilot::open(SessionConfig::default())?;
//!     vim.send_keys("ispam\x1b")?;
//!     assert!(vim.display_lines()[0].starts_with("spam"));
//!     let greeting = vim.command("echo \"ham\"")?;
//!     assert_eq!(greeting, "ham");
//!     vim.close()?;
//!     Ok(())
//! }
//! ```

pub mod arguments;
pub mod config;
pub mod core;
pub mod error;
pub mod runtimepath;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

pub use crate::arguments::ArgSpec;
pub use crate::config::{ScreenSize, SessionConfig};
pub use crate::core::session::{Mode, Session, DEFAULT_ARGS};
pub use crate::error::{Error, Result};
pub use crate::runtimepath::RuntimePath;

/// Open a new editor session.
pub fn open(config: SessionConfig) -> Result<Vim> {
    Vim::open(config)
}

/// A headless editor handle.
///
/// Wraps one [`Session`] behind shared ownership so the lazily created
/// [`RuntimePath`] view can hold a weak back-reference. Sessions are
/// single-caller by design; the handle is neither `Send` nor `Sync`.
/// Dropping the handle closes the editor.
pub struct Vim {
    inner: Rc<RefCell<Session>>,
    runtimepath: Option<RuntimePath>,
}

impl Vim {
    /// Spawn the editor described by `config` and wait for its startup
    /// banner to settle on the screen.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let session = Session::open(&config)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(session)),
            runtimepath: None,
        })
    }

    /// Send a raw key sequence and wait until the editor goes idle.
    pub fn send_keys(&mut self, keys: &str) -> Result<()> {
        self.inner.borrow_mut().send_keys(keys)?;
        Ok(())
    }

    /// Send a raw key sequence without waiting for a response.
    pub fn send_keys_nowait(&mut self, keys: &str) -> Result<()> {
        self.inner.borrow_mut().send_keys_nowait(keys)?;
        Ok(())
    }

    /// Drain pending editor output into the screen; `None` uses the
    /// session timeout.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.borrow_mut().wait(timeout)?;
        Ok(())
    }

    /// Switch the editor to `mode`.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.inner.borrow_mut().set_mode(mode)?;
        Ok(())
    }

    /// Execute an ex command and return its captured output.
    pub fn command(&mut self, command: &str) -> Result<String> {
        Ok(self.inner.borrow_mut().command(command)?)
    }

    /// Execute an ex command without capturing output.
    pub fn command_quiet(&mut self, command: &str) -> Result<()> {
        self.inner.borrow_mut().command_quiet(command)?;
        Ok(())
    }

    /// Evaluate `expr` through `:echo`; quote string literals yourself.
    pub fn echo(&mut self, expr: &str) -> Result<String> {
        Ok(self.inner.borrow_mut().echo(expr)?)
    }

    /// The live view over the editor's `runtimepath` setting. The first
    /// call reads the current remote value; later calls reuse the view.
    pub fn runtimepath(&mut self) -> Result<&mut RuntimePath> {
        let view = match self.runtimepath.take() {
            Some(view) => view,
            None => RuntimePath::open(Rc::downgrade(&self.inner))?,
        };
        Ok(self.runtimepath.insert(view))
    }

    /// Install an editor plugin: append `dir` to the runtime path and,
    /// when given, source `entry_script` relative to it.
    pub fn install_plugin(&mut self, dir: impl AsRef<Path>, entry_script: Option<&str>) -> Result<()> {
        let dir = dir.as_ref().to_string_lossy().into_owned();
        self.runtimepath()?.push(dir)?;
        if let Some(script) = entry_script {
            self.inner.borrow_mut().command_quiet(&format!("runtime! {script}"))?;
        }
        Ok(())
    }

    /// Disconnect and close the editor. Safe to call repeatedly; also
    /// invoked on drop.
    pub fn close(&mut self) -> Result<()> {
        self.inner.borrow_mut().close()?;
        Ok(())
    }

    /// Best-effort liveness of the editor process.
    pub fn is_alive(&self) -> bool {
        self.inner.borrow_mut().is_alive()
    }

    /// The rendered screen as one newline-joined string.
    pub fn display(&self) -> String {
        self.inner.borrow().display()
    }

    /// The rendered screen, one fixed-width string per row.
    pub fn display_lines(&self) -> Vec<String> {
        self.inner.borrow().display_lines()
    }

    /// Absolute path of the resolved editor executable.
    pub fn executable(&self) -> PathBuf {
        self.inner.borrow().executable().to_path_buf()
    }

    /// Launch arguments of the editor process.
    pub fn args(&self) -> Vec<String> {
        self.inner.borrow().args().to_vec()
    }

    /// Configured text encoding label.
    pub fn encoding(&self) -> String {
        self.inner.borrow().encoding().to_string()
    }

    /// Idle timeout of the wait/poll loop.
    pub fn timeout(&self) -> Duration {
        self.inner.borrow().timeout()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.inner.borrow_mut().set_timeout(timeout);
    }

    /// Screen geometry as (rows, cols).
    pub fn screen_size(&self) -> (u16, u16) {
        self.inner.borrow().screen_size()
    }

    /// Resize the emulated screen and the pty.
    pub fn set_screen_size(&mut self, rows: u16, cols: u16) -> Result<()> {
        self.inner.borrow_mut().set_screen_size(rows, cols)?;
        Ok(())
    }
}

impl Drop for Vim {
    fn drop(&mut self) {
        if let Ok(mut session) = self.inner.try_borrow_mut() {
            let _ = session.close();
        }
    }
}
