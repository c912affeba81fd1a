//! Interface endpoints
//!
//! Every managed service the workspace talks to is reached through an
//! interface endpoint in the first workload subnet, fronted by a trusted
//! workload security group.

use crate::perimeter::NetworkPerimeter;
use crate::security_group::WorkloadSecurityGroup;
use enclave_core::{ConfigurationError, ConstructionError, IdentifierKind, IdentifierSource, Result};
use serde::Serialize;
use tracing::debug;

/// Services reachable from inside the perimeter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointService {
    /// Key management
    Kms,
    /// Notebook service control plane
    SageMakerApi,
    /// Model runtime
    SageMakerRuntime,
    /// Studio web application
    SageMakerStudio,
    /// Query engine
    Athena,
    /// Object storage (interface endpoint, private DNS off)
    S3,
    /// Repository API
    CodeCommit,
    /// Repository git transport
    CodeCommitGit,
}

impl EndpointService {
    /// The fixed set every workspace gets, in creation order
    #[must_use]
    pub const fn workspace_set() -> [Self; 8] {
        [
            Self::Kms,
            Self::SageMakerApi,
            Self::SageMakerRuntime,
            Self::SageMakerStudio,
            Self::Athena,
            Self::S3,
            Self::CodeCommit,
            Self::CodeCommitGit,
        ]
    }

    /// Regional service name
    #[must_use]
    pub fn service_name(self, region: &str) -> String {
        match self {
            Self::Kms => format!("com.amazonaws.{region}.kms"),
            Self::SageMakerApi => format!("com.amazonaws.{region}.sagemaker.api"),
            Self::SageMakerRuntime => format!("com.amazonaws.{region}.sagemaker.runtime"),
            Self::SageMakerStudio => format!("aws.sagemaker.{region}.studio"),
            Self::Athena => format!("com.amazonaws.{region}.athena"),
            Self::S3 => format!("com.amazonaws.{region}.s3"),
            Self::CodeCommit => format!("com.amazonaws.{region}.codecommit"),
            Self::CodeCommitGit => format!("com.amazonaws.{region}.git-codecommit"),
        }
    }

    /// Logical id of the endpoint resource
    #[must_use]
    pub fn logical_id(self) -> &'static str {
        match self {
            Self::Kms => "kms_endpoint",
            Self::SageMakerApi => "sagemaker_api_endpoint",
            Self::SageMakerRuntime => "sagemaker_runtime_endpoint",
            Self::SageMakerStudio => "sagemaker_studio_endpoint",
            Self::Athena => "athena_endpoint",
            Self::S3 => "s3_endpoint",
            Self::CodeCommit => "codecommit_endpoint",
            Self::CodeCommitGit => "codecommit_git_endpoint",
        }
    }

    /// Private DNS resolution
    #[must_use]
    pub fn private_dns(self) -> bool {
        !matches!(self, Self::S3)
    }
}

/// A created interface endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Allocated id
    pub id: String,
    /// Service
    pub service: EndpointService,
    /// Regional service name
    pub service_name: String,
    /// Hosting subnet
    pub subnet_id: String,
    /// Fronting security group
    pub security_group_id: String,
    /// Private DNS
    pub private_dns: bool,
}

/// Add an endpoint for `service`
///
/// Adding a service twice returns the existing endpoint.
pub fn add_endpoint(
    perimeter: &mut NetworkPerimeter,
    ids: &dyn IdentifierSource,
    service: EndpointService,
    group: &WorkloadSecurityGroup,
) -> Result<Endpoint> {
    if !perimeter.trusts(group.id()) {
        return Err(ConfigurationError::UntrustedSecurityGroup {
            group: group.id().to_string(),
            perimeter: perimeter.vpc_id().to_string(),
        }
        .into());
    }
    if !group.accepts_https_from_self() {
        return Err(ConstructionError::invalid(
            "endpoint.security_group",
            format!("group {} does not accept HTTPS from itself", group.id()),
        ));
    }
    if let Some(existing) = perimeter.endpoint(service) {
        return Ok(existing.clone());
    }

    let subnet_id = perimeter
        .workload_subnets()
        .next()
        .map(|s| s.id.clone())
        .ok_or_else(|| ConstructionError::invalid("endpoint.subnet", "perimeter has no workload subnet"))?;

    let endpoint = Endpoint {
        id: ids.allocate(IdentifierKind::Endpoint, service.logical_id()),
        service,
        service_name: service.service_name(perimeter.region()),
        subnet_id,
        security_group_id: group.id().to_string(),
        private_dns: service.private_dns(),
    };
    debug!(
        endpoint = %endpoint.id,
        service = %endpoint.service_name,
        private_dns = endpoint.private_dns,
        "interface endpoint added"
    );
    Ok(perimeter.insert_endpoint(endpoint).clone())
}
