//! Workspace execution identity
//!
//! The role the notebook applications run as, and the managed policy that
//! scopes it to the workspace's own logs, bucket, workgroup, catalog,
//! repository and keys.

use crate::composer::PolicyComposer;
use crate::condition::{ConditionOperator, Conditions, PASSED_TO_SERVICE};
use crate::principal::Principal;
use crate::role::{ManagedPolicy, Role};
use crate::statement::{PolicyStatement, StatementBuilder};
use enclave_core::{AccountId, Arn, ArnContext, Result};
use tracing::{debug, info};

/// Execution role name
pub const EXECUTION_ROLE_NAME: &str = "sagemaker-user-profile-for-security-lake";
/// Execution managed policy name
pub const EXECUTION_POLICY_NAME: &str = "sagemaker-studio-user-security-lake-policy";
const EXECUTION_POLICY_DESCRIPTION: &str =
    "Managed policy associated to the SageMaker Studios user profile.";

const NOTEBOOK_SERVICE: &str = "sagemaker.amazonaws.com";
const MODEL_SERVICE: &str = "bedrock.amazonaws.com";

/// Services the execution role may be handed to
const PASS_ROLE_SERVICES: &[&str] = &[
    "glue.amazonaws.com",
    "robomaker.amazonaws.com",
    "states.amazonaws.com",
    NOTEBOOK_SERVICE,
];

/// Resource families carved out of `sagemaker:*` and re-granted narrowly
const DOMAIN_FAMILY: &[&str] = &["domain/*", "user-profile/*", "app/*", "flow-definition/*"];

const S3_READ_JUSTIFICATION: &str =
    "S3Read actions are read-only and the shared data lake spans buckets in other accounts";
const LAKE_FORMATION_JUSTIFICATION: &str =
    "lakeformation:GetDataAccess does not support resource-level scoping and is read-only";
const BEDROCK_READ_JUSTIFICATION: &str =
    "Model discovery actions are read-only and do not support resource-level scoping";

const GLUE_READ_ACTIONS: &[&str] = &[
    "glue:GetDatabase",
    "glue:GetDatabases",
    "glue:GetTable",
    "glue:GetTables",
    "glue:GetPartition",
    "glue:GetPartitions",
    "glue:BatchGetPartition",
];

const CODECOMMIT_ACTIONS: &[&str] = &[
    "codecommit:BatchGet*",
    "codecommit:Describe*",
    "codecommit:Get*",
    "codecommit:List*",
    "codecommit:GitPull",
    "codecommit:GitPush",
    "codecommit:CreateBranch",
    "codecommit:DeleteBranch",
    "codecommit:MergeBranchesBy*",
    "codecommit:UpdateDefaultBranch",
    "codecommit:BatchDescribeMergeConflicts",
    "codecommit:CreateUnreferencedMergeCommit",
    "codecommit:CreateCommit",
    "codecommit:CreatePullRequest",
    "codecommit:CreatePullRequestApprovalRule",
    "codecommit:DeletePullRequestApprovalRule",
    "codecommit:EvaluatePullRequestApprovalRules",
    "codecommit:MergePullRequestBy*",
    "codecommit:PostCommentForPullRequest",
    "codecommit:UpdatePullRequest*",
    "codecommit:PutFile",
];

const BEDROCK_READ_ACTIONS: &[&str] = &[
    "bedrock:ListFoundationModels",
    "bedrock:GetFoundationModel",
    "bedrock:GetModelCustomizationJob",
    "bedrock:GetFoundationModelAvailability",
    "bedrock:ListModelCustomizationJobs",
    "bedrock:GetCustomModel",
    "bedrock:ListCustomModels",
    "bedrock:GetProvisionedModelThroughput",
    "bedrock:ListProvisionedModelThroughputs",
    "bedrock:ListTagsForResource",
    "bedrock:GetModelInvocationLoggingConfiguration",
    "bedrock:ListFoundationModelAgreementOffers",
    "bedrock:GetUseCaseForModelAccess",
];

const BEDROCK_WRITE_ACTIONS: &[&str] = &[
    "bedrock:InvokeModel",
    "bedrock:InvokeModelWithResponseStream",
    "bedrock:CreateModelCustomizationJob",
    "bedrock:StopModelCustomizationJob",
    "bedrock:DeleteCustomModel",
    "bedrock:CreateProvisionedModelThroughput",
    "bedrock:UpdateProvisionedModelThroughput",
    "bedrock:DeleteProvisionedModelThroughput",
    "bedrock:UntagResource",
    "bedrock:TagResource",
    "bedrock:PutFoundationModelEntitlement",
    "bedrock:PutModelInvocationLoggingConfiguration",
    "bedrock:CreateFoundationModelAgreement",
    "bedrock:DeleteFoundationModelAgreement",
    "bedrock:PutUseCaseForModelAccess",
];

const BEDROCK_OWNED_FAMILIES: &[&str] = &[
    "custom-model/*",
    "provisioned-model/*",
    "model-customization-job/*",
    "agent/*",
    "agent-alias/*",
    "knowledge-base/*",
];

/// Resources the execution policy is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicyInputs {
    /// The execution role itself
    pub execution_role: Arn,
    /// Bucket the workspace writes query results and artifacts to
    pub working_bucket: Arn,
    /// Analytics workgroup name
    pub workgroup: String,
    /// Source repository
    pub repository: Arn,
    /// Keys the role uses (domain key and query output key)
    pub keys: Vec<Arn>,
    /// Account owning the shared data catalog, if any
    pub shared_account: Option<AccountId>,
    /// Grant generative model access
    pub generative_ai: bool,
}

/// Create the execution role
///
/// Trusted by the notebook service, and by the model service when
/// generative access is enabled.
pub fn compose_execution_role(composer: &PolicyComposer<'_>, generative_ai: bool) -> Result<Role> {
    let mut trust = vec![Principal::service(NOTEBOOK_SERVICE)];
    if generative_ai {
        trust.push(Principal::service(MODEL_SERVICE));
    }
    composer.compose_role(EXECUTION_ROLE_NAME, trust)
}

/// Attach the execution policy to `role`
pub fn attach_execution_policy(
    composer: &PolicyComposer<'_>,
    role: &mut Role,
    inputs: &ExecutionPolicyInputs,
) -> Result<ManagedPolicy> {
    let statements = execution_policy(composer.context(), inputs)?;
    let policy = composer.attach_policy(
        role,
        EXECUTION_POLICY_NAME,
        EXECUTION_POLICY_DESCRIPTION,
        statements,
    )?;
    info!(
        role = role.name(),
        statements = policy.document().len(),
        shared_catalog = inputs.shared_account.is_some(),
        "execution policy composed"
    );
    Ok(policy)
}

/// Build the execution policy statements
pub fn execution_policy(
    ctx: &ArnContext,
    inputs: &ExecutionPolicyInputs,
) -> Result<Vec<PolicyStatement>> {
    let mut statements = vec![
        StatementBuilder::allow("CloudWatchLogGroupAllow")
            .action_names(&[
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ])
            .resource(ctx.log_group_arn("/aws/sagemaker/studio:*"))
            .build()?,
        StatementBuilder::allow("S3Read")
            .action_names(&[
                "s3:ListBucket",
                "s3:GetObject",
                "s3:GetBucketAcl",
                "s3:GetBucketLocation",
            ])
            .resource(Arn::any())
            .justification(S3_READ_JUSTIFICATION)
            .build()?,
        StatementBuilder::allow("S3WriteAllow")
            .action_names(&[
                "s3:AbortMultipartUpload",
                "s3:DeleteObject",
                "s3:PutObject",
                "s3:PutObjectAcl",
            ])
            .resource(inputs.working_bucket.clone())
            .resource(inputs.working_bucket.child("/*"))
            .build()?,
        StatementBuilder::allow("AthenaQueryAllow")
            .action_names(&[
                "athena:Get*",
                "athena:List*",
                "athena:StartQueryExecution",
                "athena:StartSession",
                "athena:StopQueryExecution",
            ])
            .resource(ctx.arn("athena", "datacatalog/*"))
            .resource(ctx.arn("athena", &format!("workgroup/{}", inputs.workgroup)))
            .build()?,
        glue_read("GlueCatalogReadLocal", ctx)?,
    ];

    if let Some(shared) = &inputs.shared_account {
        debug!(account = shared.as_str(), "granting shared catalog read");
        statements.push(glue_read("GlueCatalogReadShared", &ctx.for_account(shared))?);
    }

    statements.extend([
        StatementBuilder::allow("GlueDatabaseCreate")
            .action_names(&["glue:CreateDatabase"])
            .resource(ctx.arn("glue", "catalog"))
            .resource(ctx.arn("glue", "database/*"))
            .build()?,
        StatementBuilder::allow("LakeFormationAllow")
            .action_names(&["lakeformation:GetDataAccess"])
            .resource(Arn::any())
            .justification(LAKE_FORMATION_JUSTIFICATION)
            .build()?,
        StatementBuilder::allow("CodeCommitWriteAllow")
            .action_names(CODECOMMIT_ACTIONS)
            .resource(inputs.repository.clone())
            .build()?,
        StatementBuilder::allow("SageMakerNotResourceAllow")
            .action_names(&["sagemaker:*"])
            .not_resources(
                DOMAIN_FAMILY
                    .iter()
                    .map(|family| ctx.any_location_arn("sagemaker", family)),
            )
            .build()?,
        StatementBuilder::allow("SageMakerDomainAllow")
            .action_names(&[
                "sagemaker:CreatePresignedDomainUrl",
                "sagemaker:DescribeDomain",
                "sagemaker:ListDomains",
                "sagemaker:DescribeUserProfile",
                "sagemaker:ListUserProfiles",
                "sagemaker:*App",
                "sagemaker:ListApps",
            ])
            .resources(DOMAIN_FAMILY.iter().map(|family| ctx.arn("sagemaker", family)))
            .build()?,
        StatementBuilder::allow("SageMakerWorkteam")
            .action_names(&["iam:PassRole"])
            .resource(ctx.arn("sagemaker", "flow-definition/*"))
            .conditions(
                Conditions::new()
                    .with(
                        ConditionOperator::StringEqualsIfExists,
                        "sagemaker:WorkteamType",
                        ["private-crowd", "vendor-crowd"],
                    )
                    .with(ConditionOperator::StringEquals, PASSED_TO_SERVICE, [NOTEBOOK_SERVICE]),
            )
            .build()?,
        StatementBuilder::allow("IAMPassRoletoService")
            .action_names(&["iam:PassRole"])
            .resource(inputs.execution_role.clone())
            .conditions(Conditions::new().with(
                ConditionOperator::StringLike,
                PASSED_TO_SERVICE,
                PASS_ROLE_SERVICES.iter().copied(),
            ))
            .build()?,
        StatementBuilder::allow("KMSUsePermissions")
            .action_names(&[
                "kms:CreateGrant",
                "kms:DescribeKey",
                "kms:Decrypt",
                "kms:Encrypt",
                "kms:GenerateDataKey",
                "kms:ReEncrypt*",
            ])
            .resources(inputs.keys.iter().cloned())
            .build()?,
        StatementBuilder::allow("SageMakerWritePermissions")
            .action_names(&["sagemaker:CreateApp"])
            .resource(ctx.arn("sagemaker", "app/*"))
            .build()?,
    ]);

    if inputs.generative_ai {
        statements.push(
            StatementBuilder::allow("BedrockReadPermissions")
                .action_names(BEDROCK_READ_ACTIONS)
                .resource(Arn::any())
                .justification(BEDROCK_READ_JUSTIFICATION)
                .build()?,
        );
        statements.push(
            StatementBuilder::allow("BedrockWritePermissions")
                .action_names(BEDROCK_WRITE_ACTIONS)
                .resource(ctx.provider_arn("bedrock", "foundation-model/*"))
                .resources(
                    BEDROCK_OWNED_FAMILIES
                        .iter()
                        .map(|family| ctx.arn("bedrock", family)),
                )
                .build()?,
        );
    }

    Ok(statements)
}

fn glue_read(sid: &str, owner: &ArnContext) -> Result<PolicyStatement> {
    StatementBuilder::allow(sid)
        .action_names(GLUE_READ_ACTIONS)
        .resource(owner.arn("glue", "catalog"))
        .resource(owner.arn("glue", "database/*"))
        .resource(owner.arn("glue", "table/*"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::ResourceScope;

    fn ctx() -> ArnContext {
        ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
    }

    fn inputs(ctx: &ArnContext) -> ExecutionPolicyInputs {
        ExecutionPolicyInputs {
            execution_role: ctx.global_arn("iam", &format!("role/{EXECUTION_ROLE_NAME}")),
            working_bucket: ctx.s3_arn("athena-output-111111111111"),
            workgroup: "security_lake_gen_ai".to_string(),
            repository: ctx.arn("codecommit", "sagemaker_gen_ai_repo"),
            keys: vec![
                ctx.arn("kms", "key/aaaa"),
                ctx.arn("kms", "key/bbbb"),
            ],
            shared_account: None,
            generative_ai: true,
        }
    }

    #[test]
    fn builds_every_statement() {
        let ctx = ctx();
        let statements = execution_policy(&ctx, &inputs(&ctx)).unwrap();
        let sids: Vec<&str> = statements.iter().map(PolicyStatement::sid).collect();
        assert_eq!(
            sids,
            [
                "CloudWatchLogGroupAllow",
                "S3Read",
                "S3WriteAllow",
                "AthenaQueryAllow",
                "GlueCatalogReadLocal",
                "GlueDatabaseCreate",
                "LakeFormationAllow",
                "CodeCommitWriteAllow",
                "SageMakerNotResourceAllow",
                "SageMakerDomainAllow",
                "SageMakerWorkteam",
                "IAMPassRoletoService",
                "KMSUsePermissions",
                "SageMakerWritePermissions",
                "BedrockReadPermissions",
                "BedrockWritePermissions",
            ]
        );
    }

    #[test]
    fn generative_access_is_optional() {
        let ctx = ctx();
        let mut inputs = inputs(&ctx);
        inputs.generative_ai = false;
        let statements = execution_policy(&ctx, &inputs).unwrap();
        assert!(statements.iter().all(|s| !s.sid().starts_with("Bedrock")));

        let composer = PolicyComposer::new(&ctx);
        let role = compose_execution_role(&composer, false).unwrap();
        assert_eq!(role.trust(), [Principal::service(NOTEBOOK_SERVICE)]);
    }

    #[test]
    fn athena_is_scoped_to_workgroup() {
        let ctx = ctx();
        let statements = execution_policy(&ctx, &inputs(&ctx)).unwrap();
        let athena = statements
            .iter()
            .find(|s| s.sid() == "AthenaQueryAllow")
            .unwrap();
        assert!(athena
            .resources()
            .iter()
            .any(|r| r.as_str() == "arn:aws:athena:us-east-1:111111111111:workgroup/security_lake_gen_ai"));
        assert!(athena.resources().iter().all(|r| r.as_str() != "arn:aws:athena:us-east-1:111111111111:workgroup/*"));
    }

    #[test]
    fn carve_out_excludes_domain_family() {
        let ctx = ctx();
        let statements = execution_policy(&ctx, &inputs(&ctx)).unwrap();
        let broad = statements
            .iter()
            .find(|s| s.sid() == "SageMakerNotResourceAllow")
            .unwrap();
        let ResourceScope::NotResources(excluded) = broad.scope() else {
            panic!("expected a carve-out");
        };
        assert_eq!(excluded.len(), DOMAIN_FAMILY.len());
        assert!(excluded
            .iter()
            .any(|r| r.as_str() == "arn:aws:sagemaker:*:*:user-profile/*"));
    }

    #[test]
    fn attach_uses_fixed_names() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        let mut role = compose_execution_role(&composer, true).unwrap();
        let policy = attach_execution_policy(&composer, &mut role, &inputs(&ctx)).unwrap();
        assert_eq!(policy.name(), EXECUTION_POLICY_NAME);
        assert_eq!(role.managed_policies(), [EXECUTION_POLICY_NAME.to_string()]);
        assert_eq!(policy.document().justifications().len(), 3);
    }
}
