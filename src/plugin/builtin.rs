//! Built-in plugins
//!
//! Only the `env` value provider ships with the runner itself; protocol and
//! auth plugins are external packages resolved through discovery.

use crate::common::Result;

use super::ValueProviderPlugin;

/// Resolves variables from the process environment, provider key
/// `"env:var"` (placeholder form `{{env:var:NAME}}`)
pub struct EnvValueProvider;

impl ValueProviderPlugin for EnvValueProvider {
    fn name(&self) -> &str {
        "builtin-env"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn provider(&self) -> String {
        "env:var".to_string()
    }

    fn get_value(&self, key: &str, _config: Option<&serde_json::Value>) -> Result<Option<String>> {
        Ok(std::env::var(key).ok())
    }
}
