//! Crate-level error type aggregating the per-module errors.

use thiserror::Error;

use crate::arguments::ArgumentsError;
use crate::config::ConfigError;
use crate::core::process::ProcessError;
use crate::core::session::SessionError;
use crate::runtimepath::RuntimePathError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    RuntimePath(#[from] RuntimePathError),

    #[error(transparent)]
    Arguments(#[from] ArgumentsError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
