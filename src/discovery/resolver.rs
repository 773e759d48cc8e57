//! Capability resolution
//!
//! Picks one plugin per capability key when multiple sources provide it,
//! computes the capabilities a collection needs, and maps missing
//! capabilities to canonical package names for installation.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::Collection;
use crate::runner::walk;

use super::DiscoveredPlugin;

/// A capability a collection requires from the plugin ecosystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Protocol(String),
    AuthType(String),
    Provider(String),
}

impl Capability {
    /// Namespaced registry key
    pub fn key(&self) -> String {
        match self {
            Capability::Protocol(p) => format!("protocol:{p}"),
            Capability::AuthType(a) => format!("auth:{a}"),
            Capability::Provider(p) => format!("provider:{p}"),
        }
    }

    /// Canonical package identifier for installation
    ///
    /// All auth types collapse to one shared auth package; provider keys
    /// hyphenate their segments.
    pub fn package_name(&self) -> String {
        match self {
            Capability::Protocol(p) => format!("plugin-{p}"),
            Capability::AuthType(_) => "plugin-auth".to_string(),
            Capability::Provider(p) => format!("plugin-{}", p.replace(':', "-")),
        }
    }
}

/// Pick the winning plugin per capability key
///
/// Development-directory plugins always win; otherwise the highest semantic
/// version wins; ties keep the earlier-discovered plugin (discovery order
/// is the priority order of the sources).
pub fn resolve(discovered: &[DiscoveredPlugin]) -> HashMap<String, usize> {
    let mut winners: HashMap<String, usize> = HashMap::new();

    for (index, plugin) in discovered.iter().enumerate() {
        for key in plugin.capability_keys() {
            match winners.get(&key) {
                None => {
                    winners.insert(key, index);
                }
                Some(&current) => {
                    if beats(plugin, &discovered[current]) {
                        winners.insert(key, index);
                    }
                }
            }
        }
    }

    winners
}

fn beats(challenger: &DiscoveredPlugin, incumbent: &DiscoveredPlugin) -> bool {
    use super::SourceKind::Development;

    let challenger_dev = challenger.source == Development;
    let incumbent_dev = incumbent.source == Development;
    if challenger_dev != incumbent_dev {
        return challenger_dev;
    }
    // Strictly greater only: equal versions keep the earlier registration
    challenger.version > incumbent.version
}

/// Capabilities a collection requires: its protocol, every non-bypass auth
/// type in the tree, and every value-provider referenced in payloads
pub fn collection_capabilities(collection: &Collection) -> Vec<Capability> {
    let mut capabilities = vec![Capability::Protocol(collection.protocol.clone())];

    walk::walk(collection, &mut |plan| {
        if let Some(auth) = &plan.request.auth {
            if !auth.bypasses_dispatch() {
                let capability = Capability::AuthType(auth.auth_type.clone());
                if !capabilities.contains(&capability) {
                    capabilities.push(capability);
                }
            }
        }
        collect_providers(&plan.request.data, &mut capabilities);
    });

    capabilities
}

/// Find `{{source:type:key}}` provider references in payload strings
fn collect_providers(value: &Value, capabilities: &mut Vec<Capability>) {
    match value {
        Value::String(s) => {
            let mut rest = s.as_str();
            while let Some(start) = rest.find("{{") {
                let after = &rest[start + 2..];
                let Some(end) = after.find("}}") else { break };
                let name = after[..end].trim();
                let segments: Vec<&str> = name.split(':').collect();
                if segments.len() >= 3 {
                    let capability =
                        Capability::Provider(format!("{}:{}", segments[0], segments[1]));
                    if !capabilities.contains(&capability) {
                        capabilities.push(capability);
                    }
                }
                rest = &after[end + 2..];
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_providers(item, capabilities);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_providers(item, capabilities);
            }
        }
        _ => {}
    }
}

/// Capabilities not satisfied by any currently-registered plugin
pub fn missing_capabilities(
    required: &[Capability],
    satisfied_keys: &[String],
) -> Vec<Capability> {
    required
        .iter()
        .filter(|c| !satisfied_keys.contains(&c.key()))
        .cloned()
        .collect()
}

/// Canonical package names for missing capabilities, deduplicated in order
pub fn missing_packages(missing: &[Capability]) -> Vec<String> {
    let mut packages = Vec::new();
    for capability in missing {
        let package = capability.package_name();
        if !packages.contains(&package) {
            packages.push(package);
        }
    }
    packages
}
