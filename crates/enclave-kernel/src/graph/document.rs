//! Document handed to the provisioning engine

use super::resource::{Output, ResourceKind};
use enclave_core::RemovalPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current document format
pub const FORMAT_VERSION: u32 = 1;

/// One resource in creation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    /// Kind
    pub kind: ResourceKind,
    /// Removal policy
    pub removal_policy: RemovalPolicy,
    /// Direct parents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Engine-facing properties
    pub properties: serde_json::Value,
}

/// The full graph as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    /// Format version
    pub format_version: u32,
    /// Graph digest
    pub digest: String,
    /// Resources keyed by logical id, in creation order
    pub resources: IndexMap<String, ResourceEntry>,
    /// Exported values
    #[serde(default)]
    pub outputs: IndexMap<String, Output>,
}

impl GraphDocument {
    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Number of resources of `kind`
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind == kind).count()
    }
}
