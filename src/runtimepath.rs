//! Live view over the editor's `runtimepath` setting.
//!
//! The setting is a comma-joined list (`runtimepath=v1,v2,...`). This
//! module mirrors it as an ordered sequence: reads are served from a
//! local cache, every mutation is written through to the editor with a
//! single uncaptured `set` command. The view holds only a weak handle to
//! the owning session; once the session is gone, mutations still update
//! the cache but the remote push is silently skipped.

use std::cell::RefCell;
use std::rc::Weak;

use thiserror::Error;
use tracing::debug;

use crate::core::session::{Session, SessionError};

/// Name of the mirrored editor setting.
const SETTING: &str = "runtimepath";

#[derive(Error, Debug)]
pub enum RuntimePathError {
    #[error("malformed {SETTING} setting: {0:?}")]
    MalformedSetting(String),

    #[error("session is no longer available")]
    SessionGone,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Ordered, mutable view over the remote `runtimepath` list.
pub struct RuntimePath {
    session: Weak<RefCell<Session>>,
    entries: Vec<String>,
}

impl RuntimePath {
    /// Read the current remote value and build the local cache. Costs
    /// one captured command; every later mutation costs exactly one
    /// uncaptured command.
    pub(crate) fn open(session: Weak<RefCell<Session>>) -> Result<Self, RuntimePathError> {
        let raw = match session.upgrade() {
            Some(strong) => strong.borrow_mut().command(&format!("set {SETTING}"))?,
            None => return Err(RuntimePathError::SessionGone),
        };
        let entries = Self::parse(&raw)?;
        Ok(Self { session, entries })
    }

    #[cfg(test)]
    fn detached(entries: Vec<String>) -> Self {
        Self {
            session: Weak::new(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Whether `path` is one of the entries.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    /// Replace the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, path: impl Into<String>) -> Result<(), RuntimePathError> {
        self.entries[index] = path.into();
        self.sync()
    }

    /// Remove and return the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Result<String, RuntimePathError> {
        let removed = self.entries.remove(index);
        self.sync()?;
        Ok(removed)
    }

    /// Insert an entry before `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, path: impl Into<String>) -> Result<(), RuntimePathError> {
        self.entries.insert(index, path.into());
        self.sync()
    }

    /// Append an entry at the end.
    pub fn push(&mut self, path: impl Into<String>) -> Result<(), RuntimePathError> {
        self.entries.push(path.into());
        self.sync()
    }

    /// Render entries into the editor's setting form.
    pub fn format(entries: &[String]) -> String {
        format!("{SETTING}={}", entries.join(","))
    }

    /// Parse the editor's setting form into entries. The left-hand name
    /// must be `runtimepath` and the `=` separator must be present.
    pub fn parse(raw: &str) -> Result<Vec<String>, RuntimePathError> {
        let trimmed = raw.trim();
        let (name, values) = trimmed
            .split_once('=')
            .ok_or_else(|| RuntimePathError::MalformedSetting(raw.to_string()))?;
        if name != SETTING {
            return Err(RuntimePathError::MalformedSetting(raw.to_string()));
        }
        Ok(values.split(',').map(str::to_string).collect())
    }

    /// Push the local cache back to the editor. Skipped silently when
    /// the owning session has been torn down.
    fn sync(&mut self) -> Result<(), RuntimePathError> {
        let Some(session) = self.session.upgrade() else {
            debug!("session gone, skipping {SETTING} sync");
            return Ok(());
        };
        let joined = Self::format(&self.entries);
        session.borrow_mut().command_quiet(&format!("set {joined}"))?;
        Ok(())
    }
}

impl std::fmt::Display for RuntimePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Self::format(&self.entries))
    }
}
