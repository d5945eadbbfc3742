//! Post-install verification of the binary

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::traits::BinaryProbe;
use crate::installation::version::{find_version, VersionRange};
use std::path::Path;
use std::sync::Arc;

/// Runs the installed binary and checks the version it reports
#[derive(Clone)]
pub struct Verifier {
    probe: Arc<dyn BinaryProbe>,
}

impl Verifier {
    pub fn new(probe: Arc<dyn BinaryProbe>) -> Self {
        Self { probe }
    }

    /// Verify the binary at `binary_path`.
    ///
    /// The binary must run successfully with `probe_args`. When `range` is
    /// set, the first version found in its output (stdout, then stderr) must
    /// satisfy it.
    pub async fn verify(
        &self,
        binary_path: &Path,
        probe_args: &[String],
        range: Option<&VersionRange>,
    ) -> BinWrapResult<()> {
        let output = self.probe.probe(binary_path, probe_args).await?;
        if !output.success {
            log::warn!(
                "{} failed its probe: {}",
                binary_path.display(),
                output.stderr.trim()
            );
            return Err(BinWrapError::BinaryNotFunctional {
                path: binary_path.display().to_string(),
            });
        }

        let Some(range) = range else {
            log::info!("Verified {}", binary_path.display());
            return Ok(());
        };

        let version = find_version(&output.stdout).or_else(|| find_version(&output.stderr));
        match version {
            Some(version) if range.matches(&version) => {
                log::info!(
                    "Verified {} at version {} ({})",
                    binary_path.display(),
                    version,
                    range
                );
                Ok(())
            }
            Some(version) => Err(BinWrapError::VersionMismatch {
                required: range.to_string(),
                actual: version.to_string(),
            }),
            None => Err(BinWrapError::VersionMismatch {
                required: range.to_string(),
                actual: "unknown".to_string(),
            }),
        }
    }
}
