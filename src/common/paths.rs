//! Platform paths for configuration and plugin directories
//!
//! The per-user plugin directory is shared between the CLI and the desktop
//! companion application, so both see the same installed plugins.

use std::path::{Path, PathBuf};

/// Application name used for platform directories
const APP_NAME: &str = "quiver";

/// Sibling package directories that mark a plugin development workspace
pub const DEV_WORKSPACE_MARKERS: &[&str] = &[
    "plugin-http",
    "plugin-graphql",
    "plugin-grpc",
    "plugin-auth",
];

/// Get the configuration directory path
///
/// - Linux: `~/.config/quiver/`
/// - macOS: `~/Library/Application Support/quiver/`
/// - Windows: `%APPDATA%\quiver\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("quiver.toml"))
}

/// Per-user plugin directory, shared with the desktop companion app
pub fn user_plugin_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".local/share")
                .join(APP_NAME)
        })
        .join("plugins")
}

/// System-wide plugin directory
pub fn global_plugin_dir() -> PathBuf {
    #[cfg(unix)]
    return PathBuf::from("/usr/lib").join(APP_NAME).join("plugins");

    #[cfg(windows)]
    return std::env::var("PROGRAMDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("C:\\ProgramData"))
        .join(APP_NAME)
        .join("plugins");
}

/// Detect a plugin development workspace rooted at `dir`
///
/// A directory qualifies when it contains at least one of the known sibling
/// plugin package directories. Development plugins take priority over any
/// installed version during resolution.
pub fn detect_dev_workspace(dir: &Path) -> Option<PathBuf> {
    let found = DEV_WORKSPACE_MARKERS
        .iter()
        .any(|marker| dir.join(marker).is_dir());
    found.then(|| dir.to_path_buf())
}
