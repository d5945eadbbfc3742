//! Error types for binary provisioning
//!
//! Every failure a session can report maps onto one variant here. Errors are
//! `Clone` because a failed download entry is both published on the progress
//! bus and returned to the caller.

use thiserror::Error;

/// Errors that can occur while selecting, fetching or verifying a binary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinWrapError {
    #[error("No binary found matching your system ({os}/{arch}). It's probably not supported.")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Filesystem error at {path}: {message}")]
    FilesystemError { path: String, message: String },

    #[error("Network error while fetching {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("The \"{path}\" binary doesn't seem to work correctly")]
    BinaryNotFunctional { path: String },

    #[error("Version mismatch: required {required}, found {actual}")]
    VersionMismatch { required: String, actual: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl BinWrapError {
    /// Build a filesystem error for the given path
    pub fn filesystem(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        BinWrapError::FilesystemError {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Build a network error for the given resource
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        BinWrapError::NetworkError {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        BinWrapError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BinWrapError {
    fn from(err: std::io::Error) -> Self {
        BinWrapError::FilesystemError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BinWrapError {
    fn from(err: reqwest::Error) -> Self {
        BinWrapError::NetworkError {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

/// Result type for provisioning operations
pub type BinWrapResult<T> = Result<T, BinWrapError>;
