//! Manifest loader for YAML files and environment resolution

use crate::config::types::Manifest;
use crate::errors::{BinWrapError, BinWrapResult};
use regex::{Captures, Regex};
use std::env;
use std::path::Path;
use std::sync::OnceLock;
use tokio::fs;

/// Manifest loader with environment resolution
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load a manifest from a YAML file.
    ///
    /// A relative `destination` is resolved against the manifest's directory.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> BinWrapResult<Manifest> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            BinWrapError::invalid_configuration(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content, path.parent())
    }

    /// Load a manifest from a YAML string
    pub fn from_str(content: &str, base_dir: Option<&Path>) -> BinWrapResult<Manifest> {
        let mut manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            BinWrapError::invalid_configuration(format!("Failed to parse YAML manifest: {}", e))
        })?;

        Self::resolve_environment(&mut manifest)?;

        if let Some(base_dir) = base_dir {
            if manifest.destination.is_relative() {
                manifest.destination = base_dir.join(&manifest.destination);
            }
        }

        manifest.validate()?;
        log::debug!(
            "Loaded manifest for {} with {} source(s)",
            manifest.binary.display(),
            manifest.sources.len()
        );
        Ok(manifest)
    }

    /// Expand `${VAR}` references in the destination and source URLs
    fn resolve_environment(manifest: &mut Manifest) -> BinWrapResult<()> {
        let destination = manifest.destination.to_string_lossy().into_owned();
        manifest.destination = expand_env(&destination)?.into();

        for source in &mut manifest.sources {
            source.url = expand_env(&source.url)?;
        }
        Ok(())
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env pattern is valid")
    })
}

/// Replace every `${VAR}` in `value`; unset variables are an error
pub(crate) fn expand_env(value: &str) -> BinWrapResult<String> {
    let mut missing = None;
    let expanded = env_pattern().replace_all(value, |caps: &Captures| {
        env::var(&caps[1]).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(BinWrapError::invalid_configuration(format!(
            "Environment variable '{}' is not set",
            name
        ))),
        None => Ok(expanded.into_owned()),
    }
}
