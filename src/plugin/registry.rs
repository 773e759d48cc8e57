//! Typed plugin registry
//!
//! Maps capability strings to plugins. Registration is an idempotent upsert:
//! a later registration for the same key replaces the earlier one, which
//! lets dev-mode plugins override installed ones when discovery re-registers.
//!
//! The registry is an explicit value passed to the Runner and Predictor at
//! construction; registration is confined to the initialization phase and
//! the registry is read-only during dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::{AuthPlugin, ProtocolEvent, ProtocolPlugin, ValueProviderPlugin};

/// Registry of protocol, auth, and value-provider plugins
#[derive(Default)]
pub struct PluginRegistry {
    protocols: HashMap<String, Arc<dyn ProtocolPlugin>>,
    auths: HashMap<String, Arc<dyn AuthPlugin>>,
    providers: HashMap<String, Arc<dyn ValueProviderPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol plugin under every protocol identifier it declares
    pub fn register_protocol(&mut self, plugin: Arc<dyn ProtocolPlugin>) {
        for key in plugin.protocols() {
            tracing::debug!(target: "quiver::plugin", protocol = %key, name = %plugin.name(), "registering protocol plugin");
            self.protocols.insert(key, Arc::clone(&plugin));
        }
    }

    /// Register an auth plugin under every auth type key it declares
    pub fn register_auth(&mut self, plugin: Arc<dyn AuthPlugin>) {
        for key in plugin.auth_types() {
            tracing::debug!(target: "quiver::plugin", auth_type = %key, name = %plugin.name(), "registering auth plugin");
            self.auths.insert(key, Arc::clone(&plugin));
        }
    }

    /// Register a value provider under its provider key
    pub fn register_value_provider(&mut self, plugin: Arc<dyn ValueProviderPlugin>) {
        let key = plugin.provider();
        tracing::debug!(target: "quiver::plugin", provider = %key, name = %plugin.name(), "registering value provider");
        self.providers.insert(key, plugin);
    }

    pub fn protocol(&self, key: &str) -> Option<Arc<dyn ProtocolPlugin>> {
        self.protocols.get(key).cloned()
    }

    pub fn auth(&self, auth_type: &str) -> Option<Arc<dyn AuthPlugin>> {
        self.auths.get(auth_type).cloned()
    }

    pub fn value_provider(&self, provider: &str) -> Option<Arc<dyn ValueProviderPlugin>> {
        self.providers.get(provider).cloned()
    }

    /// Event metadata for a protocol, used by the test-count predictor
    pub fn protocol_events(&self, protocol: &str) -> Option<Vec<ProtocolEvent>> {
        self.protocol(protocol).map(|p| p.events())
    }

    /// Capability keys currently satisfied, namespaced as
    /// `protocol:`, `auth:`, `provider:`
    pub fn satisfied_capabilities(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .protocols
            .keys()
            .map(|k| format!("protocol:{k}"))
            .chain(self.auths.keys().map(|k| format!("auth:{k}")))
            .chain(self.providers.keys().map(|k| format!("provider:{k}")))
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Result;
    use crate::model::Auth;
    use crate::plugin::{DispatchOptions, ValidationResult};

    struct NamedProvider {
        name: &'static str,
        key: &'static str,
    }

    impl ValueProviderPlugin for NamedProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn provider(&self) -> String {
            self.key.to_string()
        }
        fn get_value(&self, _key: &str, _config: Option<&serde_json::Value>) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct NoopAuth;

    impl AuthPlugin for NoopAuth {
        fn name(&self) -> &str {
            "noop-auth"
        }
        fn auth_types(&self) -> Vec<String> {
            vec!["bearer".into(), "basic".into()]
        }
        fn protocols(&self) -> Vec<String> {
            vec!["http".into()]
        }
        fn validate(&self, _auth: &Auth, _options: &DispatchOptions) -> ValidationResult {
            ValidationResult::ok()
        }
        fn apply(
            &self,
            request: &crate::model::Request,
            _auth: &Auth,
            _options: &DispatchOptions,
        ) -> Result<crate::model::Request> {
            Ok(request.clone())
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut registry = PluginRegistry::new();
        registry.register_value_provider(Arc::new(NamedProvider {
            name: "installed",
            key: "vault:file",
        }));
        registry.register_value_provider(Arc::new(NamedProvider {
            name: "dev",
            key: "vault:file",
        }));
        assert_eq!(registry.value_provider("vault:file").unwrap().name(), "dev");
    }

    #[test]
    fn test_auth_registered_per_declared_key() {
        let mut registry = PluginRegistry::new();
        registry.register_auth(Arc::new(NoopAuth));
        assert!(registry.auth("bearer").is_some());
        assert!(registry.auth("basic").is_some());
        assert!(registry.auth("oauth2").is_none());
    }

    #[test]
    fn test_satisfied_capabilities_namespaced() {
        let mut registry = PluginRegistry::new();
        registry.register_auth(Arc::new(NoopAuth));
        registry.register_value_provider(Arc::new(NamedProvider {
            name: "p",
            key: "env",
        }));
        let keys = registry.satisfied_capabilities();
        assert!(keys.contains(&"auth:bearer".to_string()));
        assert!(keys.contains(&"provider:env".to_string()));
    }
}
