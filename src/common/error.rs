//! Error types for the quiver runner
//!
//! Configuration errors name the offending capability key so a missing
//! plugin can be identified (and installed) without reading a stack trace.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the quiver runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors (fatal, never retried) ===
    #[error("No protocol plugin registered for '{0}'")]
    ProtocolNotFound(String),

    #[error("Auth type '{auth_type}' is not supported by protocol '{protocol}'. Supported: {supported}")]
    AuthNotSupported {
        auth_type: String,
        protocol: String,
        supported: String,
    },

    #[error("No auth plugin registered for auth type '{0}'")]
    AuthPluginNotFound(String),

    #[error("Auth '{auth_type}' failed to apply: {message}")]
    AuthApplyFailed { auth_type: String, message: String },

    #[error("No value provider registered for '{0}'")]
    ProviderNotFound(String),

    #[error("Value provider '{provider}' failed: {message}")]
    ProviderFailed { provider: String, message: String },

    // === Validation Errors ===
    #[error("Request validation failed: {0}")]
    Validation(String),

    // === Script Errors ===
    #[error("Script error in {kind} script: {message}")]
    Script { kind: String, message: String },

    // === Configuration File Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Discovery/Install Errors ===
    #[error("Invalid plugin manifest '{path}': {error}")]
    ManifestParse { path: String, error: String },

    #[error("Install of '{package}' timed out after {secs} seconds")]
    InstallTimeout { package: String, secs: u64 },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Nonzero-exit signal for the CLI when a run completes with failures
    #[error("{0} test(s) failed")]
    TestsFailed(usize),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unsupported-auth error listing the protocol's supported set
    pub fn auth_not_supported<S: AsRef<str>>(
        auth_type: &str,
        protocol: &str,
        supported: &[S],
    ) -> Self {
        Self::AuthNotSupported {
            auth_type: auth_type.to_string(),
            protocol: protocol.to_string(),
            supported: supported
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create an auth apply failure wrapping the auth type for diagnostics
    pub fn auth_apply_failed(auth_type: &str, message: &str) -> Self {
        Self::AuthApplyFailed {
            auth_type: auth_type.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a provider failure wrapping the provider key for diagnostics
    pub fn provider_failed(provider: &str, message: &str) -> Self {
        Self::ProviderFailed {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a script error tagged with the script kind
    pub fn script(kind: &str, message: &str) -> Self {
        Self::Script {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a fatal configuration error (missing plugin,
    /// unsupported pairing) as opposed to a validation or script failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ProtocolNotFound(_)
                | Error::AuthNotSupported { .. }
                | Error::AuthPluginNotFound(_)
                | Error::AuthApplyFailed { .. }
                | Error::ProviderNotFound(_)
                | Error::ProviderFailed { .. }
        )
    }
}
