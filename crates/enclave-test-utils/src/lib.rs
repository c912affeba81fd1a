//! Testing utilities for the studio enclave workspace
//!
//! Shared fixtures: a fixed account context, deterministic identifiers and a
//! ready-made perimeter with the workspace security group.

#![allow(missing_docs)]

use enclave_core::{AccountId, Arn, ArnContext, DerivedIdentifiers};
use enclave_network::{
    apply_workspace_rules, create_network, create_security_group, FlowLogSink, NetworkConfig,
    NetworkPerimeter, WorkloadSecurityGroup, DEFAULT_FLOW_LOG_GROUP,
};

pub const ACCOUNT: &str = "111111111111";
pub const SHARED_ACCOUNT: &str = "222222222222";
pub const REGION: &str = "us-east-1";
pub const ADMIN_ROLE: &str = "arn:aws:iam::111111111111:role/Admin";
pub const RESTRICTED_CIDR: &str = "203.0.113.0/24";

/// Minimal operator configuration accepted by the kernel
pub const SAMPLE_CONFIG: &str = r#"
account = "111111111111"
region = "us-east-1"

[parameters]
console_cidr = "203.0.113.0/24"
console_assume_principal = "arn:aws:iam::111111111111:role/Admin"
shared_catalog_account = "222222222222"
"#;

pub fn fixed_context() -> ArnContext {
    ArnContext::new(AccountId::new(ACCOUNT).unwrap(), REGION).unwrap()
}

pub fn shared_account() -> AccountId {
    AccountId::new(SHARED_ACCOUNT).unwrap()
}

pub fn admin_role() -> Arn {
    Arn::parse(ADMIN_ROLE).unwrap()
}

pub fn ids() -> DerivedIdentifiers {
    DerivedIdentifiers::new()
}

pub fn key_arn(ctx: &ArnContext, key_id: &str) -> Arn {
    ctx.arn("kms", &format!("key/{key_id}"))
}

pub fn flow_sink(ctx: &ArnContext) -> FlowLogSink {
    FlowLogSink::new(DEFAULT_FLOW_LOG_GROUP, key_arn(ctx, "flow-log-key")).unwrap()
}

/// Default perimeter plus the workspace security group with its rules applied
pub fn workspace_perimeter(ctx: &ArnContext) -> (NetworkPerimeter, WorkloadSecurityGroup) {
    let ids = ids();
    let mut perimeter = create_network(&ids, ctx, &NetworkConfig::default(), flow_sink(ctx)).unwrap();
    let mut group =
        create_security_group(&mut perimeter, &ids, "sagemaker_workload_sg", "SageMaker Workload SG")
            .unwrap();
    apply_workspace_rules(&mut group).unwrap();
    (perimeter, group)
}
