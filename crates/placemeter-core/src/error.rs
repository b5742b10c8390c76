//! Error types for placemeter-core
//!
//! Budget denial is not an error: the guard returns a `Decision` with the
//! snapshot attached. Errors cover invalid configuration (fatal at startup),
//! malformed amounts supplied by callers at runtime, and storage failures
//! (the operation is treated as not applied).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quota operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },
}

impl CoreError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn storage_msg(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CoreError>;
