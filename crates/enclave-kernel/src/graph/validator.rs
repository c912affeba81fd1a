//! Construction-time validation of a declared graph

use super::resource::{Output, ResourceKind, ResourceNode};
use super::ResourceGraph;
use enclave_core::{DependencyOrderError, Result};
use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use sha2::{Digest, Sha256};
use tracing::debug;

pub(super) fn validate(
    nodes: IndexMap<String, ResourceNode>,
    outputs: IndexMap<String, Output>,
) -> Result<ResourceGraph> {
    check_required_parents(&nodes)?;
    let order = creation_order(&nodes)?;
    let digest = compute_digest(&nodes);
    debug!(
        resources = nodes.len(),
        outputs = outputs.len(),
        digest = %digest,
        "graph validated"
    );
    Ok(ResourceGraph {
        nodes,
        order,
        outputs,
        digest,
    })
}

fn check_required_parents(nodes: &IndexMap<String, ResourceNode>) -> Result<()> {
    for node in nodes.values() {
        for required in node.kind.required_parents() {
            let declared = node
                .depends_on
                .iter()
                .filter_map(|p| nodes.get(p))
                .any(|p| p.kind == *required);
            if !declared {
                return Err(DependencyOrderError::MissingRequiredEdge {
                    child: node.id.clone(),
                    kind: required.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Parents before children
fn creation_order(nodes: &IndexMap<String, ResourceNode>) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(nodes.len(), nodes.len());
    for index in 0..nodes.len() {
        graph.add_node(index);
    }
    for (child, node) in nodes.values().enumerate() {
        for parent in &node.depends_on {
            if let Some(parent) = nodes.get_index_of(parent) {
                graph.add_edge(parent, child, ());
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        let id = nodes
            .get_index(cycle.node_id())
            .map_or_else(String::new, |(id, _)| id.clone());
        DependencyOrderError::Cycle(id)
    })?;
    Ok(sorted
        .into_iter()
        .filter_map(|index| nodes.get_index(index).map(|(id, _)| id.clone()))
        .collect())
}

/// SHA-256 over nodes and edges, sorted for determinism
pub(super) fn compute_digest(nodes: &IndexMap<String, ResourceNode>) -> String {
    let mut hasher = Sha256::new();

    let mut ids: Vec<&String> = nodes.keys().collect();
    ids.sort();
    for id in &ids {
        let node = &nodes[id.as_str()];
        hasher.update(id.as_bytes());
        hasher.update([0]);
        hasher.update(format!("{:?}/{:?}", node.kind, node.removal_policy).as_bytes());
        hasher.update([0]);
        hasher.update(node.properties.to_string().as_bytes());
        hasher.update([0]);
    }

    let mut edges: Vec<(&str, &str)> = nodes
        .values()
        .flat_map(|n| n.depends_on.iter().map(|p| (p.as_str(), n.id.as_str())))
        .collect();
    edges.sort_unstable();
    for (parent, child) in edges {
        hasher.update(parent.as_bytes());
        hasher.update(b"->");
        hasher.update(child.as_bytes());
        hasher.update([0]);
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use enclave_core::{ConstructionError, RemovalPolicy};
    use serde_json::json;

    fn domain_chain(builder: &mut GraphBuilder) {
        let d = RemovalPolicy::Destroy;
        let p = json!({});
        builder.add_resource("Key", ResourceKind::EncryptionKey, d, &p, &[]).unwrap();
        builder.add_resource("Grant", ResourceKind::KeyGrant, d, &p, &["Key"]).unwrap();
        builder.add_resource("Logs", ResourceKind::LogGroup, d, &p, &["Key"]).unwrap();
        builder.add_resource("Vpc", ResourceKind::Network, d, &p, &["Logs"]).unwrap();
        builder.add_resource("Sg", ResourceKind::SecurityGroup, d, &p, &["Vpc"]).unwrap();
        builder.add_resource("Kms", ResourceKind::Endpoint, d, &p, &["Vpc", "Sg"]).unwrap();
        builder.add_resource("Role", ResourceKind::Role, d, &p, &[]).unwrap();
        builder.add_resource("Policy", ResourceKind::ManagedPolicy, d, &p, &["Role"]).unwrap();
        builder
            .add_resource("Domain", ResourceKind::WorkspaceDomain, d, &p, &["Role", "Policy", "Sg", "Vpc", "Kms", "Grant"])
            .unwrap();
    }

    #[test]
    fn missing_required_edge_rejected() {
        let mut builder = GraphBuilder::new();
        domain_chain(&mut builder);
        builder
            .add_resource("Profile", ResourceKind::UserProfile, RemovalPolicy::Destroy, &json!({}), &["Role"])
            .unwrap();
        let err = builder.validate().unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::DependencyOrder(DependencyOrderError::MissingRequiredEdge { .. })
        ));
    }

    #[test]
    fn order_puts_parents_first() {
        let mut builder = GraphBuilder::new();
        domain_chain(&mut builder);
        builder
            .add_resource("Profile", ResourceKind::UserProfile, RemovalPolicy::Destroy, &json!({}), &["Domain"])
            .unwrap();
        let graph = builder.validate().unwrap();
        let order = graph.creation_order();
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("Key") < pos("Grant"));
        assert!(pos("Grant") < pos("Domain"));
        assert!(pos("Kms") < pos("Domain"));
        assert!(pos("Domain") < pos("Profile"));

        let teardown = graph.teardown_order();
        assert_eq!(teardown.first().map(String::as_str), Some("Profile"));
        assert_eq!(teardown.len(), order.len());
    }

    #[test]
    fn digest_tracks_content() {
        let build = |name: &str| {
            let mut builder = GraphBuilder::new();
            domain_chain(&mut builder);
            builder
                .add_resource("Repo", ResourceKind::Repository, RemovalPolicy::Destroy, &json!({ "name": name }), &[])
                .unwrap();
            builder.validate().unwrap()
        };
        assert_eq!(build("a").digest(), build("a").digest());
        assert_ne!(build("a").digest(), build("b").digest());
        assert_eq!(build("a").digest().len(), 64);
    }
}
