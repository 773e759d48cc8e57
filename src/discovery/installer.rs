//! Best-effort plugin installation
//!
//! Shells out to an external package manager for each missing package with
//! a bounded timeout. Results are partitioned into installed/failed/skipped;
//! partial success is never rolled back, and failures are reported rather
//! than fatal. A capability that stays unresolved only surfaces as a
//! configuration error if a request actually needs it at dispatch time.

use std::path::Path;
use std::time::Duration;

use crate::common::config::InstallConfig;

/// Partitioned result of an install pass
#[derive(Debug, Default)]
pub struct InstallOutcome {
    pub installed: Vec<String>,
    /// Package name and failure reason
    pub failed: Vec<(String, String)>,
    /// Already present, not reinstalled
    pub skipped: Vec<String>,
}

impl InstallOutcome {
    pub fn all_installed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Attempt to install every package in `packages` into `plugin_dir`
pub async fn install_missing(
    packages: &[String],
    config: &InstallConfig,
    plugin_dir: &Path,
) -> InstallOutcome {
    let mut outcome = InstallOutcome::default();

    let command = match which::which(&config.command) {
        Ok(path) => path,
        Err(_) => {
            for package in packages {
                outcome.failed.push((
                    package.clone(),
                    format!("package manager '{}' not found in PATH", config.command),
                ));
            }
            return outcome;
        }
    };

    for package in packages {
        if plugin_dir.join(package).exists() {
            tracing::debug!(target: "quiver::discovery", package = %package, "already installed, skipping");
            outcome.skipped.push(package.clone());
            continue;
        }

        let run = tokio::process::Command::new(&command)
            .arg("install")
            .arg("--prefix")
            .arg(plugin_dir)
            .arg(package)
            .output();

        match tokio::time::timeout(Duration::from_secs(config.timeout_secs), run).await {
            Ok(Ok(output)) if output.status.success() => {
                tracing::info!(target: "quiver::discovery", package = %package, "installed");
                outcome.installed.push(package.clone());
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                outcome.failed.push((
                    package.clone(),
                    format!(
                        "exit code {:?}: {}",
                        output.status.code(),
                        stderr.trim()
                    ),
                ));
            }
            Ok(Err(e)) => {
                outcome
                    .failed
                    .push((package.clone(), format!("failed to spawn: {e}")));
            }
            Err(_) => {
                outcome.failed.push((
                    package.clone(),
                    format!("timed out after {} seconds", config.timeout_secs),
                ));
            }
        }
    }

    outcome
}
