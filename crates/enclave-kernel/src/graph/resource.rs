//! Graph node kinds and the parents each kind must declare

use enclave_core::RemovalPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Customer-managed key
    EncryptionKey,
    /// One statement on a key's resource policy
    KeyGrant,
    /// Encrypted log group
    LogGroup,
    /// VPC with subnets, NAT gateways and flow log
    Network,
    /// Workload security group
    SecurityGroup,
    /// Interface or gateway endpoint
    Endpoint,
    /// Storage bucket
    Bucket,
    /// Grant on a bucket's resource policy
    BucketPolicy,
    /// Source repository
    Repository,
    /// IAM role
    Role,
    /// Managed policy attached to a role
    ManagedPolicy,
    /// Notebook domain
    WorkspaceDomain,
    /// User profile in a domain
    UserProfile,
    /// Application in a user profile
    Application,
    /// Query workgroup
    Workgroup,
}

impl ResourceKind {
    /// Kinds this kind must depend on directly
    #[must_use]
    pub fn required_parents(self) -> &'static [ResourceKind] {
        use ResourceKind::*;
        match self {
            KeyGrant | LogGroup => &[EncryptionKey],
            Network => &[LogGroup],
            SecurityGroup => &[Network],
            Endpoint => &[Network, SecurityGroup],
            ManagedPolicy => &[Role],
            BucketPolicy => &[Bucket, Role],
            WorkspaceDomain => &[Role, ManagedPolicy, SecurityGroup, Network, Endpoint, KeyGrant],
            UserProfile => &[WorkspaceDomain],
            Application => &[UserProfile],
            Workgroup => &[Bucket, EncryptionKey],
            EncryptionKey | Bucket | Repository | Role => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    /// Logical id
    pub id: String,
    /// Kind
    pub kind: ResourceKind,
    /// What happens on stack deletion
    pub removal_policy: RemovalPolicy,
    /// Engine-facing properties
    pub properties: serde_json::Value,
    /// Direct parents, in declaration order
    pub depends_on: Vec<String>,
}

/// A value exported from the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Exported value
    pub value: String,
    /// Human description
    pub description: String,
}
