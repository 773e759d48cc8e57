//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Plugin installation settings
    #[serde(default)]
    pub install: InstallConfig,

    /// Extra plugin directories searched after the standard ones
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Plugin installation settings
#[derive(Debug, Deserialize, Clone)]
pub struct InstallConfig {
    /// Package manager command used for best-effort installs
    #[serde(default = "default_install_command")]
    pub command: String,

    /// Per-package install timeout in seconds
    #[serde(default = "default_install_timeout")]
    pub timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: default_install_command(),
            timeout_secs: default_install_timeout(),
        }
    }
}

fn default_install_command() -> String {
    "npm".to_string()
}

fn default_install_timeout() -> u64 {
    120
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Per-request execution timeout passed through to protocol plugins
    #[serde(default = "default_request_timeout")]
    pub request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                return toml::from_str(&content)
                    .map_err(|e| super::Error::ConfigParse(e.to_string()));
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.install.command, "npm");
        assert_eq!(config.install.timeout_secs, 120);
        assert!(config.plugin_dirs.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [install]
            command = "pnpm"
            "#,
        )
        .unwrap();
        assert_eq!(config.install.command, "pnpm");
        assert_eq!(config.install.timeout_secs, 120);
    }
}
