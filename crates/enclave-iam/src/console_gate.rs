//! Console access gate
//!
//! A role an operator assumes to mint presigned workspace URLs for one user
//! profile, from one network origin.

use crate::composer::PolicyComposer;
use crate::condition::{ConditionOperator, Conditions, SOURCE_IP};
use crate::principal::Principal;
use crate::role::{ManagedPolicy, Role};
use crate::statement::{PolicyStatement, StatementBuilder};
use enclave_core::{Arn, ArnContext, ConstructionError, Result};
use enclave_network::Ipv4Cidr;
use tracing::{info, warn};

/// Gate role name
pub const GATE_ROLE_NAME: &str = "sagemaker-console-presigned-url-role";
/// Gate managed policy name
pub const GATE_POLICY_NAME: &str = "sagemaker-studio-console-access-policy";
const GATE_POLICY_DESCRIPTION: &str =
    "Managed policy associated to the console role to access the workspace presigned URL.";

const SERVICE_CATALOG_JUSTIFICATION: &str =
    "Service catalog discovery actions are read-only and do not support resource-level scoping";

/// Build the gate statements
pub fn gate_statements(
    ctx: &ArnContext,
    target_profile: &Arn,
    domain_id: &str,
    allowed_cidr: Ipv4Cidr,
) -> Result<Vec<PolicyStatement>> {
    if domain_id.trim().is_empty() {
        return Err(ConstructionError::invalid("domain_id", "must not be empty"));
    }
    if target_profile.has_wildcard() || target_profile.service() != Some("sagemaker") {
        return Err(ConstructionError::invalid(
            "target_profile",
            format!("'{target_profile}' is not a concrete user profile"),
        ));
    }

    Ok(vec![
        StatementBuilder::allow("SMStudioCreatePresignedURLAllow")
            .action_names(&["sagemaker:CreatePresignedDomainUrl"])
            .resource(target_profile.clone())
            .conditions(Conditions::new().with(
                ConditionOperator::IpAddress,
                SOURCE_IP,
                [allowed_cidr.to_string()],
            ))
            .build()?,
        StatementBuilder::allow("SMStudioConsoleReadAllow")
            .action_names(&[
                "sagemaker:DescribeDomain",
                "sagemaker:DescribeUserProfile",
                "sagemaker:ListApps",
                "sagemaker:ListDomains",
                "sagemaker:ListUserProfiles",
            ])
            .resource(ctx.arn("sagemaker", "domain/*"))
            .resource(ctx.arn("sagemaker", &format!("user-profile/{domain_id}/*")))
            .resource(ctx.arn("sagemaker", &format!("app/{domain_id}/*")))
            .build()?,
        StatementBuilder::allow("SMStudioServiceCatalogReadAllow")
            .action_names(&[
                "license-manager:ListReceivedLicenses",
                "sagemaker:GetSagemakerServicecatalogPortfolioStatus",
                "servicecatalog:ListAcceptedPortfolioShares",
                "servicecatalog:ListPrincipalsForPortfolio",
            ])
            .resource(Arn::any())
            .justification(SERVICE_CATALOG_JUSTIFICATION)
            .build()?,
    ])
}

/// Compose the gate role and its policy
///
/// The role trusts only `assume_principal`.
pub fn compose_gate(
    ctx: &ArnContext,
    assume_principal: &Arn,
    target_profile: &Arn,
    domain_id: &str,
    allowed_cidr: Ipv4Cidr,
) -> Result<(Role, ManagedPolicy)> {
    if allowed_cidr.is_any() {
        warn!(
            cidr = %allowed_cidr,
            "presigned URL access is not restricted by source address"
        );
    }
    let composer = PolicyComposer::new(ctx);
    let mut role = composer.compose_role(GATE_ROLE_NAME, [Principal::arn(assume_principal.clone())])?;
    let statements = gate_statements(ctx, target_profile, domain_id, allowed_cidr)?;
    let policy = composer.attach_policy(&mut role, GATE_POLICY_NAME, GATE_POLICY_DESCRIPTION, statements)?;
    info!(
        role = role.name(),
        profile = %target_profile,
        cidr = %allowed_cidr,
        "console gate composed"
    );
    Ok((role, policy))
}
