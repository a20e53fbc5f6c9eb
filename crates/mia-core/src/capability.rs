//! Capabilities advertised by a provider process
//!
//! A [`CapabilityRegistry`] is the read-only snapshot a session takes of a
//! provider's tools when it connects. It is never refreshed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A named, schema-described operation exposed by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON-Schema-like object: `properties` → `{type, enum?}`, plus `required`
    #[serde(default = "empty_object_schema")]
    pub parameter_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameter_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
        }
    }

    /// Names listed under `required` in the parameter schema
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameter_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Read-only snapshot of a provider's capabilities
///
/// Names are unique: when a provider advertises the same name twice the
/// first advertisement wins.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    /// Build a snapshot, dropping duplicate names
    pub fn new(advertised: Vec<Capability>) -> Self {
        let mut capabilities = Vec::with_capacity(advertised.len());
        let mut index = HashMap::with_capacity(advertised.len());

        for capability in advertised {
            if index.contains_key(&capability.name) {
                warn!(
                    "Dropping duplicate capability '{}' (first advertisement wins)",
                    capability.name
                );
                continue;
            }
            debug!("Registering capability: {}", capability.name);
            index.insert(capability.name.clone(), capabilities.len());
            capabilities.push(capability);
        }

        Self { capabilities, index }
    }

    /// All capabilities, in advertised order
    pub fn list(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.index.get(name).map(|&i| &self.capabilities[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability names, in advertised order
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name.as_str()).collect()
    }
}
