//! Core process/terminal bridge components.
//!
//! This module contains the low-level bridge logic:
//!
//! - **process**: Unix pty wrapper for spawning and talking to the editor
//! - **screen**: adapter over the vt100 screen emulator
//! - **session**: high-level session combining process + screen
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Process (pty master I/O with the editor process)
//! ├── Screen  (vt100 grid mirroring the editor's rendering)
//! └── capture file (redirect target for command output)
//! ```

pub mod process;
pub mod screen;
pub mod session;
