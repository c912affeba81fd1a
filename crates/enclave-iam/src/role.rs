//! Roles and managed policies

use crate::document::{PolicyDocument, POLICY_VERSION};
use crate::principal::Principal;
use enclave_core::Arn;
use serde::Serialize;

/// An execution identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    name: String,
    arn: Arn,
    #[serde(rename = "assumeRolePolicyDocument", serialize_with = "serialize_trust")]
    trust: Vec<Principal>,
    managed_policies: Vec<String>,
}

impl Role {
    pub(crate) fn new(name: String, arn: Arn, trust: Vec<Principal>) -> Self {
        Self {
            name,
            arn,
            trust,
            managed_policies: Vec::new(),
        }
    }

    /// Role name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Principals allowed to assume the role
    #[inline]
    #[must_use]
    pub fn trust(&self) -> &[Principal] {
        &self.trust
    }

    /// Names of attached managed policies
    #[inline]
    #[must_use]
    pub fn managed_policies(&self) -> &[String] {
        &self.managed_policies
    }

    pub(crate) fn attach(&mut self, policy_name: &str) {
        if !self.managed_policies.iter().any(|p| p == policy_name) {
            self.managed_policies.push(policy_name.to_string());
        }
    }
}

fn serialize_trust<S: serde::Serializer>(
    trust: &[Principal],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serde_json::json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": Principal::block(trust),
            "Action": "sts:AssumeRole",
        }],
    })
    .serialize(serializer)
}

/// A named policy document attached to roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedPolicy {
    name: String,
    description: String,
    arn: Arn,
    document: PolicyDocument,
    roles: Vec<String>,
}

impl ManagedPolicy {
    pub(crate) fn new(
        name: String,
        description: String,
        arn: Arn,
        document: PolicyDocument,
        role: &str,
    ) -> Self {
        Self {
            name,
            description,
            arn,
            document,
            roles: vec![role.to_string()],
        }
    }

    /// Policy name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Policy ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Statements
    #[inline]
    #[must_use]
    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// Attached role names
    #[inline]
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}
