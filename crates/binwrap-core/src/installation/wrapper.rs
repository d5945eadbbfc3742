//! Binary provisioning session
//!
//! A `BinWrapper` owns an immutable [`Configuration`], the [`Catalog`] of
//! download sources and one [`ProgressBus`] for its whole lifetime. It
//! exposes two entry points:
//!
//! - [`BinWrapper::download`] fetches every source matching the host.
//! - [`BinWrapper::run`] downloads only when the binary is missing, then
//!   verifies it.
//!
//! Overlapping calls on the same session write to the same destination
//! without coordination; callers that need that must serialize them.

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::binary::{HttpArchiveFetcher, ProcessProbe};
use crate::installation::cache::{BinaryCache, CacheStatus};
use crate::installation::catalog::{Catalog, SourceEntry};
use crate::installation::fetcher::Fetcher;
use crate::installation::platform;
use crate::installation::progress::ProgressBus;
use crate::installation::traits::{
    default_probe_command, ArchiveFetcher, BinaryProbe, ExtractRequest, Platform,
};
use crate::installation::verifier::Verifier;
use crate::installation::version::VersionRange;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Leading path components dropped from archive members by default
pub const DEFAULT_STRIP_COMPONENTS: usize = 1;

/// Validated session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub destination_dir: PathBuf,
    /// Location of the binary inside `destination_dir`
    pub binary_relative_path: PathBuf,
    pub version_range: Option<VersionRange>,
    pub skip_verification: bool,
    pub strip_components: usize,
}

impl Configuration {
    /// Canonical path of the installed binary
    pub fn binary_path(&self) -> PathBuf {
        self.destination_dir.join(&self.binary_relative_path)
    }
}

/// Incremental assembly of a [`BinWrapper`]
pub struct BinWrapperBuilder {
    catalog: Catalog,
    destination_dir: Option<PathBuf>,
    binary_relative_path: Option<PathBuf>,
    version_range: Option<String>,
    skip_verification: bool,
    strip_components: usize,
    platform: Option<Platform>,
    fetcher: Option<Arc<dyn ArchiveFetcher>>,
    probe: Option<Arc<dyn BinaryProbe>>,
}

impl Default for BinWrapperBuilder {
    fn default() -> Self {
        Self {
            catalog: Catalog::new(),
            destination_dir: None,
            binary_relative_path: None,
            version_range: None,
            skip_verification: false,
            strip_components: DEFAULT_STRIP_COMPONENTS,
            platform: None,
            fetcher: None,
            probe: None,
        }
    }
}

impl BinWrapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a download source, optionally restricted to an OS and architecture
    pub fn src(mut self, url: impl Into<String>, os: Option<&str>, arch: Option<&str>) -> Self {
        self.catalog.push(SourceEntry {
            url: url.into(),
            os: os.map(str::to_string),
            arch: arch.map(str::to_string),
        });
        self
    }

    /// Append a prepared source entry
    pub fn source(mut self, entry: SourceEntry) -> Self {
        self.catalog.push(entry);
        self
    }

    /// Directory the archives are extracted into
    pub fn dest(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination_dir = Some(path.into());
        self
    }

    /// Path of the binary relative to the destination directory
    pub fn use_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_relative_path = Some(path.into());
        self
    }

    /// Semantic-version range the binary must satisfy
    pub fn version(mut self, range: impl Into<String>) -> Self {
        self.version_range = Some(range.into());
        self
    }

    pub fn skip_verification(mut self, skip: bool) -> Self {
        self.skip_verification = skip;
        self
    }

    pub fn strip_components(mut self, strip: usize) -> Self {
        self.strip_components = strip;
        self
    }

    /// Override host detection
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn BinaryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Validate the settings and create the session
    pub fn build(self) -> BinWrapResult<BinWrapper> {
        let destination_dir = self
            .destination_dir
            .ok_or_else(|| BinWrapError::invalid_configuration("destination directory is not set"))?;
        let binary_relative_path = self
            .binary_relative_path
            .ok_or_else(|| BinWrapError::invalid_configuration("binary path is not set"))?;

        if binary_relative_path.as_os_str().is_empty() {
            return Err(BinWrapError::invalid_configuration("binary path is empty"));
        }
        if binary_relative_path.is_absolute() {
            return Err(BinWrapError::invalid_configuration(format!(
                "binary path must be relative to the destination: {}",
                binary_relative_path.display()
            )));
        }

        let version_range = self
            .version_range
            .as_deref()
            .map(VersionRange::parse)
            .transpose()?;

        let config = Configuration {
            destination_dir,
            binary_relative_path,
            version_range,
            skip_verification: self.skip_verification,
            strip_components: self.strip_components,
        };

        let bus = ProgressBus::new();
        let fetcher: Arc<dyn ArchiveFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpArchiveFetcher::new()),
        };
        let probe: Arc<dyn BinaryProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(ProcessProbe::new()),
        };

        Ok(BinWrapper {
            cache: BinaryCache::new(config.binary_path()),
            config,
            catalog: self.catalog,
            platform: self.platform.unwrap_or_else(Platform::current),
            fetcher: Fetcher::new(fetcher, bus.clone()),
            verifier: Verifier::new(probe),
            bus,
        })
    }
}

/// A binary provisioning session
pub struct BinWrapper {
    config: Configuration,
    catalog: Catalog,
    platform: Platform,
    bus: ProgressBus,
    cache: BinaryCache,
    fetcher: Fetcher,
    verifier: Verifier,
}

impl std::fmt::Debug for BinWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinWrapper")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl BinWrapper {
    pub fn builder() -> BinWrapperBuilder {
        BinWrapperBuilder::new()
    }

    /// Declared download sources
    pub fn src(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dest(&self) -> &Path {
        &self.config.destination_dir
    }

    /// Binary path relative to the destination directory
    pub fn binary(&self) -> &Path {
        &self.config.binary_relative_path
    }

    pub fn version(&self) -> Option<&VersionRange> {
        self.config.version_range.as_ref()
    }

    /// Canonical path of the installed binary
    pub fn path(&self) -> PathBuf {
        self.config.binary_path()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Progress channel shared by every call on this session
    pub fn progress(&self) -> &ProgressBus {
        &self.bus
    }

    /// Download and extract every source matching the host platform
    pub async fn download(&self) -> BinWrapResult<()> {
        let entries = platform::select(&self.catalog, &self.platform)?;
        let request = ExtractRequest {
            destination: self.config.destination_dir.clone(),
            strip_components: self.config.strip_components,
        };
        self.fetcher
            .fetch_all(&entries, &request, &self.path())
            .await
    }

    /// Ensure the binary is installed and working, probing it with `--version`
    pub async fn run(&self) -> BinWrapResult<()> {
        self.run_with_probe(&default_probe_command()).await
    }

    /// Ensure the binary is installed and working, probing it with `probe_args`
    pub async fn run_with_probe(&self, probe_args: &[String]) -> BinWrapResult<()> {
        match self.cache.status().await? {
            CacheStatus::Present => {
                log::info!("Using existing binary at {}", self.path().display());
            }
            CacheStatus::Missing => {
                log::info!("Binary missing at {}, downloading", self.path().display());
                self.download().await?;
            }
        }

        if self.config.skip_verification {
            log::debug!("Skipping verification of {}", self.path().display());
            return Ok(());
        }

        self.verifier
            .verify(&self.path(), probe_args, self.version())
            .await
    }
}
