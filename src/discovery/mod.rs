//! Plugin discovery
//!
//! Enumerates candidate plugin source directories in fixed priority order:
//! a development workspace (highest), the per-user data directory shared
//! with the desktop companion app, then the global system directory. Each
//! plugin ships a `plugin.toml` manifest declaring its identity and
//! capability keys.

pub mod installer;
pub mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::paths;
use crate::common::Config;

/// Where a plugin source directory came from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    /// Development workspace; always wins resolution
    Development,
    /// Per-user data directory (shared between CLI and desktop app)
    UserData,
    /// System-wide package directory
    Global,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Development => "development",
            SourceKind::UserData => "user",
            SourceKind::Global => "global",
        };
        f.write_str(s)
    }
}

/// A directory that may contain plugin packages
#[derive(Debug, Clone)]
pub struct PluginSource {
    pub kind: SourceKind,
    pub dir: PathBuf,
}

/// Parsed `plugin.toml` manifest
#[derive(Debug, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: ManifestCapabilities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestCapabilities {
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub auth_types: Vec<String>,
    #[serde(default)]
    pub providers: Vec<String>,
}

/// A plugin package found under some source directory
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub version: semver::Version,
    pub source: SourceKind,
    pub path: PathBuf,
    pub capabilities: ManifestCapabilities,
}

impl DiscoveredPlugin {
    /// Namespaced capability keys this plugin satisfies
    pub fn capability_keys(&self) -> Vec<String> {
        self.capabilities
            .protocols
            .iter()
            .map(|p| format!("protocol:{p}"))
            .chain(
                self.capabilities
                    .auth_types
                    .iter()
                    .map(|a| format!("auth:{a}")),
            )
            .chain(
                self.capabilities
                    .providers
                    .iter()
                    .map(|p| format!("provider:{p}")),
            )
            .collect()
    }
}

/// Enumerate candidate plugin sources in priority order
pub fn enumerate_sources(config: &Config, workspace_root: &Path) -> Vec<PluginSource> {
    let mut sources = Vec::new();

    if let Some(dir) = paths::detect_dev_workspace(workspace_root) {
        sources.push(PluginSource {
            kind: SourceKind::Development,
            dir,
        });
    }

    sources.push(PluginSource {
        kind: SourceKind::UserData,
        dir: paths::user_plugin_dir(),
    });

    for dir in &config.plugin_dirs {
        sources.push(PluginSource {
            kind: SourceKind::UserData,
            dir: dir.clone(),
        });
    }

    sources.push(PluginSource {
        kind: SourceKind::Global,
        dir: paths::global_plugin_dir(),
    });

    sources
}

/// Scan every source directory for plugin packages
///
/// Order is deterministic: sources in priority order, packages within a
/// source sorted by directory name. A malformed manifest is logged and
/// skipped, never fatal.
pub fn discover(sources: &[PluginSource]) -> Vec<DiscoveredPlugin> {
    let mut found = Vec::new();

    for source in sources {
        let entries = match std::fs::read_dir(&source.dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let manifest_path = dir.join("plugin.toml");
            if !manifest_path.exists() {
                continue;
            }
            match load_manifest(&manifest_path) {
                Ok((manifest, version)) => {
                    tracing::debug!(
                        target: "quiver::discovery",
                        name = %manifest.name,
                        version = %version,
                        source = %source.kind,
                        "discovered plugin"
                    );
                    found.push(DiscoveredPlugin {
                        name: manifest.name,
                        version,
                        source: source.kind,
                        path: dir,
                        capabilities: manifest.capabilities,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        target: "quiver::discovery",
                        path = %manifest_path.display(),
                        error = %e,
                        "skipping invalid plugin manifest"
                    );
                }
            }
        }
    }

    found
}

fn load_manifest(path: &Path) -> crate::common::Result<(PluginManifest, semver::Version)> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::common::Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let manifest: PluginManifest =
        toml::from_str(&content).map_err(|e| crate::common::Error::ManifestParse {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
    let version = semver::Version::parse(&manifest.version).map_err(|e| {
        crate::common::Error::ManifestParse {
            path: path.display().to_string(),
            error: format!("invalid version '{}': {}", manifest.version, e),
        }
    })?;
    Ok((manifest, version))
}
