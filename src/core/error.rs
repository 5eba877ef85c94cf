// Copyright @yucwang 2026

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VklError {
    /// Missing or invalid commit parameter. The volume stays uncommitted.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, VklError>;

pub(crate) fn config_error<T>(msg: impl Into<String>) -> Result<T> {
    let msg = msg.into();
    log::warn!("rejecting commit: {}", msg);
    Err(VklError::Configuration(msg))
}
