//! Resource graph
//!
//! Resources are declared through [`GraphBuilder`] in dependency order and
//! sealed into a [`ResourceGraph`] by [`GraphBuilder::validate`]. The sealed
//! graph knows its creation order, its teardown order (the exact reverse) and
//! a content digest, and renders itself as a [`GraphDocument`].

pub mod builder;
pub mod document;
pub mod resource;
mod validator;

pub use builder::GraphBuilder;
pub use document::{GraphDocument, ResourceEntry, FORMAT_VERSION};
pub use resource::{Output, ResourceKind, ResourceNode};

use indexmap::IndexMap;

/// A validated, immutable resource graph
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: IndexMap<String, ResourceNode>,
    order: Vec<String>,
    outputs: IndexMap<String, Output>,
    digest: String,
}

impl ResourceGraph {
    /// Logical ids, parents first
    #[must_use]
    pub fn creation_order(&self) -> &[String] {
        &self.order
    }

    /// Logical ids, children first
    #[must_use]
    pub fn teardown_order(&self) -> Vec<String> {
        self.order.iter().rev().cloned().collect()
    }

    /// Hex SHA-256 over sorted nodes and edges
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Resource by logical id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Resources in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.nodes.values()
    }

    /// Resources of one kind, in declaration order
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    /// Number of resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Exported values
    #[must_use]
    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    /// Render for the provisioning engine
    #[must_use]
    pub fn to_document(&self) -> GraphDocument {
        let resources = self
            .order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| {
                (
                    node.id.clone(),
                    ResourceEntry {
                        kind: node.kind,
                        removal_policy: node.removal_policy,
                        depends_on: node.depends_on.clone(),
                        properties: node.properties.clone(),
                    },
                )
            })
            .collect();
        GraphDocument {
            format_version: FORMAT_VERSION,
            digest: self.digest.clone(),
            resources,
            outputs: self.outputs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::RemovalPolicy;
    use serde_json::json;

    #[test]
    fn document_lists_resources_in_creation_order() {
        let mut builder = GraphBuilder::new();
        builder
            .add_resource("Role", ResourceKind::Role, RemovalPolicy::Destroy, &json!({"name": "r"}), &[])
            .unwrap();
        builder
            .add_resource("Policy", ResourceKind::ManagedPolicy, RemovalPolicy::Retain, &json!({}), &["Role"])
            .unwrap();
        builder.add_output("RoleName", "r", "role").unwrap();
        let graph = builder.validate().unwrap();

        let doc = graph.to_document();
        assert_eq!(doc.format_version, FORMAT_VERSION);
        assert_eq!(doc.digest, graph.digest());
        assert_eq!(doc.resources.keys().collect::<Vec<_>>(), ["Role", "Policy"]);
        assert_eq!(doc.count(ResourceKind::Role), 1);

        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["resources"]["Policy"]["removalPolicy"], "RETAIN");
        assert_eq!(json["resources"]["Policy"]["dependsOn"][0], "Role");
        assert!(json["resources"]["Role"].get("dependsOn").is_none());
        assert_eq!(json["outputs"]["RoleName"]["value"], "r");

        let yaml: GraphDocument = serde_yaml::from_str(&doc.to_yaml().unwrap()).unwrap();
        assert_eq!(yaml, doc);
    }
}
