//! Core traits and abstractions for the installation system

use crate::errors::BinWrapResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Receives transfer notifications for a single download
pub trait TransferObserver: Send {
    /// Called once when response headers arrive
    fn on_response(&mut self, total_bytes: Option<u64>);

    /// Called for every chunk of body received
    fn on_chunk(&mut self, len: usize);
}

/// Where and how a retrieved archive should be materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub destination: PathBuf,
    pub strip_components: usize,
}

/// Retrieves a resource and extracts it into a destination directory
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url`, reporting progress to `observer`, and extract it
    /// according to `request`
    async fn fetch(
        &self,
        url: &str,
        request: &ExtractRequest,
        observer: &mut dyn TransferObserver,
    ) -> BinWrapResult<()>;
}

/// Result of invoking a binary with a probe command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    /// Whether the process spawned and exited successfully
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    /// A probe that never got to run
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: reason.into(),
        }
    }
}

/// Executes a binary to check that it works
#[async_trait]
pub trait BinaryProbe: Send + Sync {
    async fn probe(&self, binary: &Path, args: &[String]) -> BinWrapResult<ProbeOutput>;
}

/// Host platform identifiers, normalized to the names release assets use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Get the current platform
    pub fn current() -> Self {
        Self::from_rust_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Normalize Rust target identifiers (`macos`, `x86_64`, ...) to asset
    /// identifiers (`darwin`, `x64`, ...)
    pub fn from_rust_target(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            "windows" => "win32",
            other => other,
        };

        let arch = match arch {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "ia32",
            "powerpc64" => "ppc64",
            "powerpc" => "ppc",
            "loongarch64" => "loong64",
            other => other,
        };

        Self::new(os, arch)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Default probe command: ask the binary for its version
pub fn default_probe_command() -> Vec<String> {
    vec!["--version".to_string()]
}
