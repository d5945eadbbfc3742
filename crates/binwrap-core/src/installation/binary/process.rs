//! Probing an installed binary by running it

use crate::errors::BinWrapResult;
use crate::installation::traits::{BinaryProbe, ProbeOutput};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the binary as a child process and reports how it exited
#[derive(Debug, Clone, Default)]
pub struct ProcessProbe;

impl ProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BinaryProbe for ProcessProbe {
    async fn probe(&self, binary: &Path, args: &[String]) -> BinWrapResult<ProbeOutput> {
        log::debug!("Probing {} {}", binary.display(), args.join(" "));

        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => Ok(ProbeOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Err(e) => {
                log::debug!("Failed to spawn {}: {}", binary.display(), e);
                Ok(ProbeOutput::failed(e.to_string()))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_probe_captures_output() {
        let temp_dir = tempdir().unwrap();
        let tool = script(temp_dir.path(), "tool", r#"echo "tool $1 1.3.0""#);

        let output = ProcessProbe::new()
            .probe(&tool, &["--version".to_string()])
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "tool --version 1.3.0");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_unsuccessful() {
        let temp_dir = tempdir().unwrap();
        let tool = script(temp_dir.path(), "tool", "exit 3");

        let output = ProcessProbe::new().probe(&tool, &[]).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unsuccessful() {
        let temp_dir = tempdir().unwrap();
        let output = ProcessProbe::new()
            .probe(&temp_dir.path().join("absent"), &[])
            .await
            .unwrap();
        assert!(!output.success);
    }
}
