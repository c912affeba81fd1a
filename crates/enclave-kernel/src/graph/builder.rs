//! Graph Builder
//!
//! The only way to declare resources. Every reference is an explicit edge to a
//! resource that already exists, so the builder is append-only and acyclic.

use super::resource::{Output, ResourceKind, ResourceNode};
use super::validator;
use super::ResourceGraph;
use enclave_core::{
    ConfigurationError, ConstructionError, DependencyOrderError, RemovalPolicy, Result,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Builder for validated resource graphs
///
/// ```rust,ignore
/// let mut builder = GraphBuilder::new();
/// builder.add_resource("DomainKey", ResourceKind::EncryptionKey, RemovalPolicy::Destroy, &key, &[])?;
/// builder.add_resource("DomainKeyGrant", ResourceKind::KeyGrant, RemovalPolicy::Destroy, &grant, &["DomainKey"])?;
/// let graph = builder.validate()?;
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: IndexMap<String, ResourceNode>,
    // parent -> children
    adjacency: HashMap<String, Vec<String>>,
    outputs: IndexMap<String, Output>,
}

impl GraphBuilder {
    /// Empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Whether `id` has been declared
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Declared resource
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Declare a resource after all of its parents
    pub fn add_resource<P: Serialize + ?Sized>(
        &mut self,
        id: &str,
        kind: ResourceKind,
        removal: RemovalPolicy,
        properties: &P,
        depends_on: &[&str],
    ) -> Result<()> {
        let id_ok = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !id_ok {
            return Err(ConstructionError::invalid(
                "logical_id",
                format!("'{id}' must be non-empty and alphanumeric"),
            ));
        }
        if self.nodes.contains_key(id) {
            return Err(ConfigurationError::Duplicate {
                what: "resource",
                id: id.to_string(),
            }
            .into());
        }

        let mut parents: Vec<String> = Vec::with_capacity(depends_on.len());
        for parent in depends_on {
            if *parent == id {
                return Err(DependencyOrderError::SelfDependency(id.to_string()).into());
            }
            if !self.nodes.contains_key(*parent) {
                return Err(DependencyOrderError::MissingParent {
                    child: id.to_string(),
                    parent: (*parent).to_string(),
                }
                .into());
            }
            if !parents.iter().any(|p| p == parent) {
                parents.push((*parent).to_string());
            }
        }

        let properties = serde_json::to_value(properties)
            .map_err(|e| ConstructionError::invalid(format!("{id}.properties"), e.to_string()))?;

        for parent in &parents {
            self.adjacency
                .entry(parent.clone())
                .or_default()
                .push(id.to_string());
        }
        self.adjacency.entry(id.to_string()).or_default();
        trace!(resource = id, %kind, parents = parents.len(), "resource declared");
        self.nodes.insert(
            id.to_string(),
            ResourceNode {
                id: id.to_string(),
                kind,
                removal_policy: removal,
                properties,
                depends_on: parents,
            },
        );
        Ok(())
    }

    /// Add an edge between two declared resources
    ///
    /// Returns false when the edge already exists.
    pub fn add_dependency(&mut self, child: &str, parent: &str) -> Result<bool> {
        for id in [child, parent] {
            if !self.nodes.contains_key(id) {
                return Err(DependencyOrderError::MissingParent {
                    child: child.to_string(),
                    parent: id.to_string(),
                }
                .into());
            }
        }
        if child == parent {
            return Err(DependencyOrderError::SelfDependency(child.to_string()).into());
        }
        if self.nodes[child].depends_on.iter().any(|p| p == parent) {
            return Ok(false);
        }
        if self.would_create_cycle(child, parent) {
            return Err(DependencyOrderError::Cycle(child.to_string()).into());
        }

        self.adjacency
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        if let Some(node) = self.nodes.get_mut(child) {
            node.depends_on.push(parent.to_string());
        }
        Ok(true)
    }

    /// Export a value
    pub fn add_output(&mut self, name: &str, value: impl Into<String>, description: &str) -> Result<()> {
        if self.outputs.contains_key(name) {
            return Err(ConfigurationError::Duplicate {
                what: "output",
                id: name.to_string(),
            }
            .into());
        }
        self.outputs.insert(
            name.to_string(),
            Output {
                value: value.into(),
                description: description.to_string(),
            },
        );
        Ok(())
    }

    /// Check if making `child` depend on `parent` would create a cycle
    ///
    /// This is a preview method that doesn't modify the builder.
    pub fn would_create_cycle(&self, child: &str, parent: &str) -> bool {
        child == parent || self.can_reach(child, parent)
    }

    /// Check if target is reachable from source along parent → child edges
    fn can_reach(&self, source: &str, target: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![source];

        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if visited.insert(node) {
                if let Some(children) = self.adjacency.get(node) {
                    stack.extend(children.iter().map(String::as_str));
                }
            }
        }
        false
    }

    /// Validate the graph and seal it
    ///
    /// Once validated, the graph cannot be modified.
    pub fn validate(self) -> Result<ResourceGraph> {
        validator::validate(self.nodes, self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::ErrorKind;
    use serde_json::json;

    fn add(builder: &mut GraphBuilder, id: &str, kind: ResourceKind, parents: &[&str]) -> Result<()> {
        builder.add_resource(id, kind, RemovalPolicy::Destroy, &json!({ "name": id }), parents)
    }

    #[test]
    fn test_builder_creates_nodes() {
        let mut builder = GraphBuilder::new();
        add(&mut builder, "Key", ResourceKind::EncryptionKey, &[]).unwrap();
        add(&mut builder, "Grant", ResourceKind::KeyGrant, &["Key"]).unwrap();
        assert_eq!(builder.node_count(), 2);
        assert_eq!(builder.edge_count(), 1);
        assert_eq!(builder.get("Grant").unwrap().depends_on, ["Key"]);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut builder = GraphBuilder::new();
        let err = add(&mut builder, "Profile", ResourceKind::UserProfile, &["Domain"]).unwrap_err();
        assert_eq!(
            err,
            DependencyOrderError::MissingParent {
                child: "Profile".into(),
                parent: "Domain".into()
            }
            .into()
        );
        assert_eq!(builder.node_count(), 0);
    }

    #[test]
    fn test_duplicate_and_self_dependency() {
        let mut builder = GraphBuilder::new();
        add(&mut builder, "Key", ResourceKind::EncryptionKey, &[]).unwrap();
        let err = add(&mut builder, "Key", ResourceKind::EncryptionKey, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = add(&mut builder, "Role", ResourceKind::Role, &["Role"]).unwrap_err();
        assert_eq!(err, DependencyOrderError::SelfDependency("Role".into()).into());
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let mut builder = GraphBuilder::new();
        add(&mut builder, "A", ResourceKind::Role, &[]).unwrap();
        add(&mut builder, "B", ResourceKind::ManagedPolicy, &["A"]).unwrap();
        add(&mut builder, "C", ResourceKind::Repository, &["B"]).unwrap();

        assert!(builder.would_create_cycle("A", "C"));
        assert!(!builder.would_create_cycle("C", "A"));
        let err = builder.add_dependency("A", "C").unwrap_err();
        assert_eq!(err, DependencyOrderError::Cycle("A".into()).into());

        assert!(builder.add_dependency("C", "A").unwrap());
        assert!(!builder.add_dependency("C", "A").unwrap());
        assert_eq!(builder.edge_count(), 3);
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut builder = GraphBuilder::new();
        builder.add_output("DomainId", "d-1", "domain").unwrap();
        assert!(builder.add_output("DomainId", "d-2", "domain").is_err());
    }
}
