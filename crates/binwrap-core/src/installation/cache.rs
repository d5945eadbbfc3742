//! Existence check for the installed binary

use crate::errors::{BinWrapError, BinWrapResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Outcome of probing the canonical path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Something already exists at the canonical path
    Present,
    /// Nothing at the canonical path, a download is needed
    Missing,
}

/// Checks whether the binary is already installed at its canonical path
#[derive(Debug, Clone)]
pub struct BinaryCache {
    binary_path: PathBuf,
}

impl BinaryCache {
    /// Create a cache check for the given canonical path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Get the path this cache checks
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Probe the canonical path.
    ///
    /// Only "not found" counts as a miss; any other failure (permissions,
    /// a broken parent component) is reported as a filesystem error.
    pub async fn status(&self) -> BinWrapResult<CacheStatus> {
        match fs::metadata(&self.binary_path).await {
            Ok(_) => {
                log::debug!("Found installed binary: {}", self.binary_path.display());
                Ok(CacheStatus::Present)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No binary at {}", self.binary_path.display());
                Ok(CacheStatus::Missing)
            }
            Err(e) => Err(BinWrapError::filesystem(&self.binary_path, e)),
        }
    }
}
