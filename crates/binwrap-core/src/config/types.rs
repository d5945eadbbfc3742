//! Manifest data structures

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::catalog::SourceEntry;
use crate::installation::traits::default_probe_command;
use crate::installation::version::VersionRange;
use crate::installation::wrapper::{BinWrapperBuilder, DEFAULT_STRIP_COMPONENTS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Description of one provisioned binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Directory archives are extracted into
    pub destination: PathBuf,
    /// Binary location relative to `destination`
    pub binary: PathBuf,
    /// Required semantic-version range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub skip_verification: bool,
    #[serde(default = "default_strip_components")]
    pub strip_components: usize,
    /// Arguments used to probe the installed binary
    #[serde(default = "default_probe_command")]
    pub probe: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

fn default_strip_components() -> usize {
    DEFAULT_STRIP_COMPONENTS
}

impl Manifest {
    /// Check the manifest for mistakes that would only surface at install time
    pub fn validate(&self) -> BinWrapResult<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(BinWrapError::invalid_configuration("destination must not be empty"));
        }
        if self.binary.as_os_str().is_empty() {
            return Err(BinWrapError::invalid_configuration("binary must not be empty"));
        }
        if self.binary.is_absolute() {
            return Err(BinWrapError::invalid_configuration(format!(
                "binary must be relative to the destination: {}",
                self.binary.display()
            )));
        }
        if self.sources.is_empty() {
            return Err(BinWrapError::invalid_configuration("at least one source is required"));
        }
        if let Some(index) = self.sources.iter().position(|s| s.url.trim().is_empty()) {
            return Err(BinWrapError::invalid_configuration(format!(
                "source #{} has an empty url",
                index + 1
            )));
        }
        if let Some(range) = &self.version {
            VersionRange::parse(range)?;
        }
        Ok(())
    }

    /// Start a session builder from this manifest
    pub fn to_builder(&self) -> BinWrapperBuilder {
        let mut builder = BinWrapperBuilder::new()
            .dest(self.destination.clone())
            .use_binary(self.binary.clone())
            .skip_verification(self.skip_verification)
            .strip_components(self.strip_components);

        if let Some(range) = &self.version {
            builder = builder.version(range.clone());
        }
        for source in &self.sources {
            builder = builder.source(source.clone());
        }
        builder
    }
}
