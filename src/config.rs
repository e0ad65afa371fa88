//! Session configuration.
//!
//! This module provides:
//! - `SessionConfig`: options consumed by [`crate::open`]
//! - TOML file loading for project-local defaults
//!
//! # Configuration File
//!
//! ```toml
//! executable = "vim"
//! args = "-N -i NONE -n -u NONE"   # or an explicit list
//! encoding = "utf-8"
//! timeout_ms = 250
//!
//! [size]
//! rows = 24
//! cols = 80
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arguments::ArgSpec;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Screen geometry, public order (rows, cols).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Options for opening an editor session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Editor command name; resolved on the host `PATH` at open time.
    pub executable: String,
    /// Launch arguments; `None` uses the no-config/no-plugins defaults.
    pub args: Option<ArgSpec>,
    /// Environment for the child; `None` inherits the parent environment.
    pub env: Option<HashMap<String, String>>,
    /// Text encoding label of the editor's output stream.
    pub encoding: String,
    /// Emulated screen geometry.
    pub size: ScreenSize,
    /// Idle timeout of the wait/poll loop, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            executable: "vim".to_string(),
            args: None,
            env: None,
            encoding: "utf-8".to_string(),
            size: ScreenSize::default(),
            timeout_ms: 250,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_args(mut self, args: impl Into<ArgSpec>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.size = ScreenSize { rows, cols };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Idle timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.executable, "vim");
        assert!(config.args.is_none());
        assert!(config.env.is_none());
        assert_eq!(config.encoding, "utf-8");
        assert_eq!(config.size, ScreenSize { rows: 24, cols: 80 });
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_toml_args_line() {
        let config: SessionConfig = toml::from_str(
            r#"
            executable = "nvim"
            args = "-u NONE --clean"
            timeout_ms = 500

            [size]
            rows = 32
            cols = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.executable, "nvim");
        assert_eq!(config.args, Some(ArgSpec::from("-u NONE --clean")));
        assert_eq!(config.size, ScreenSize { rows: 32, cols: 120 });
        assert_eq!(config.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_toml_args_list() {
        let config: SessionConfig = toml::from_str(r#"args = ["-u", "NONE"]"#).unwrap();
        assert_eq!(
            config.args,
            Some(ArgSpec::from(vec!["-u".to_string(), "NONE".to_string()]))
        );
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .with_executable("nvim")
            .with_size(40, 132)
            .with_timeout(Duration::from_millis(100));
        assert_eq!(config.executable, "nvim");
        assert_eq!(config.size, ScreenSize { rows: 40, cols: 132 });
        assert_eq!(config.timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(SessionConfig::load("/nonexistent/vimpilot.toml").is_err());
    }
}
