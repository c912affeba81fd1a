//! Workspace blueprint
//!
//! Builds every component in dependency order and declares each one in the
//! resource graph as soon as it exists. Keys and the perimeter come first,
//! then storage, the repository and identity, then the domain and its
//! children, and finally the console gate.

use crate::config::{ConfigError, EnclaveConfig};
use crate::domain::{Application, DomainPrerequisites, DomainSpec, UserProfile, WorkspaceDomain};
use crate::graph::{GraphBuilder, ResourceGraph, ResourceKind};
use crate::keys::{log_group_context, EncryptionKey, KeyPurpose, KeyRegistry};
use crate::repository::SourceRepository;
use crate::storage::{create_access_log_bucket, create_bucket, BucketEncryption, BucketSpec};
use crate::workgroup::create_workgroup;
use enclave_core::{IdentifierSource, RemovalPolicy, Result};
use enclave_iam::{
    attach_execution_policy, compose_execution_role, compose_gate, Conditions,
    ExecutionPolicyInputs, PolicyComposer, PolicyStatement, Principal,
};
use enclave_network::{
    add_endpoint, apply_workspace_rules, create_network, create_security_group, EndpointService,
    FlowLogSink,
};
use serde_json::json;
use tracing::info;

/// Output naming the repository clone URL
pub const REPOSITORY_URL_OUTPUT: &str = "CodeCommitRepoUrl";
/// Output naming the domain id
pub const DOMAIN_ID_OUTPUT: &str = "SageMakerDomainId";

const DOMAIN_KEY_ACTIONS: &[&str] = &[
    "kms:DescribeKey",
    "kms:Decrypt",
    "kms:GenerateDataKey",
    "kms:CreateGrant",
];
const QUERY_KEY_ACTIONS: &[&str] = &["kms:DescribeKey", "kms:Encrypt", "kms:GenerateDataKey*"];

/// Result of synthesis
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Validated graph
    pub graph: ResourceGraph,
    /// HTTP clone URL of the notebook repository
    pub repository_clone_url: String,
    /// Allocated domain id
    pub domain_id: String,
}

/// Build the workspace graph from `config`
pub fn synthesize(config: &EnclaveConfig, ids: &dyn IdentifierSource) -> Result<Synthesis, ConfigError> {
    let ctx = config.context()?;
    let params = config.parameters.resolve()?;
    info!(
        account = %ctx.account(),
        region = ctx.region(),
        generative_ai = config.generative_ai,
        shared_catalog = params.shared_catalog_account.is_some(),
        "synthesizing workspace"
    );

    let mut graph = GraphBuilder::new();
    let destroy = RemovalPolicy::Destroy;
    let data_removal = config.removal_policy;

    // Keys
    let registry = KeyRegistry::new(&ctx, ids).with_pending_window(config.key_pending_window_days)?;
    let mut flow_key = registry.create_key(
        "flow_log_kms_key",
        "vpc_flow_log_kms_key",
        KeyPurpose::LogSink,
        "Key for VPC flow log encryption",
    )?;
    let mut domain_key = registry.create_key(
        "sagemaker_kms_key",
        "sagemaker_domain_kms_key",
        KeyPurpose::WorkspaceData,
        "Key for SageMaker domain volumes and workspace data",
    )?;
    let mut query_key = registry.create_key(
        "athena_s3_output_kms_key",
        "athena_s3_output_kms_key",
        KeyPurpose::QueryOutput,
        "Key for Athena query results",
    )?;
    for key in [&flow_key, &domain_key, &query_key] {
        graph.add_resource(key.logical_id(), ResourceKind::EncryptionKey, key.removal_policy(), key, &[])?;
    }

    let logs = Principal::service(ctx.regional_service_principal("logs"));
    let (statement, _) = registry.grant(
        &mut flow_key,
        logs,
        KeyPurpose::LogSink.allow_list(),
        log_group_context(&ctx, &config.flow_log_group),
    )?;
    declare_grant(&mut graph, "flow_log_kms_key_logs_grant", &flow_key, &statement, &[])?;

    // Perimeter
    let sink = FlowLogSink::new(config.flow_log_group.as_str(), flow_key.arn().clone())?;
    graph.add_resource(
        "vpc_flow_log_group",
        ResourceKind::LogGroup,
        destroy,
        &sink,
        &[flow_key.logical_id(), "flow_log_kms_key_logs_grant"],
    )?;
    let mut perimeter = create_network(ids, &ctx, &config.network, sink)?;
    graph.add_resource("sagemaker_vpc", ResourceKind::Network, destroy, &perimeter, &["vpc_flow_log_group"])?;

    let mut group = create_security_group(
        &mut perimeter,
        ids,
        "sagemaker_workload_sg",
        "SageMaker Workload SG",
    )?;
    apply_workspace_rules(&mut group)?;
    graph.add_resource(
        "sagemaker_workload_sg",
        ResourceKind::SecurityGroup,
        destroy,
        &group,
        &["sagemaker_vpc"],
    )?;

    let mut endpoint_ids = Vec::new();
    for service in EndpointService::workspace_set() {
        let endpoint = add_endpoint(&mut perimeter, ids, service, &group)?;
        graph.add_resource(
            service.logical_id(),
            ResourceKind::Endpoint,
            destroy,
            &endpoint,
            &["sagemaker_vpc", "sagemaker_workload_sg"],
        )?;
        endpoint_ids.push(service.logical_id());
    }

    // Storage
    let account = ctx.account().as_str();
    let log_bucket = create_access_log_bucket(
        &ctx,
        format!("athena-gen-ai-s3-access-logs-{account}"),
        data_removal,
    )?;
    graph.add_resource("athena_s3_access_logs", ResourceKind::Bucket, data_removal, &log_bucket, &[])?;

    let mut results = create_bucket(
        &ctx,
        BucketSpec::new(
            format!("athena-gen-ai-bucket-results-{account}"),
            BucketEncryption::Kms(query_key.arn().clone()),
        )
        .with_access_log(log_bucket.name(), None)
        .with_removal(data_removal),
    )?;
    graph.add_resource(
        "athena_bucket_results",
        ResourceKind::Bucket,
        data_removal,
        &results,
        &[query_key.logical_id(), "athena_s3_access_logs"],
    )?;

    let workgroup = create_workgroup(&ctx, &config.workgroup, &results, query_key.arn())?;
    graph.add_resource(
        "athena_workgroup",
        ResourceKind::Workgroup,
        destroy,
        &workgroup,
        &["athena_bucket_results", query_key.logical_id()],
    )?;

    let repository = SourceRepository::notebooks(&ctx)?;
    graph.add_resource("sagemaker_gen_ai_repo", ResourceKind::Repository, data_removal, &repository, &[])?;

    // Identity
    let composer = PolicyComposer::new(&ctx);
    let mut role = compose_execution_role(&composer, config.generative_ai)?;
    graph.add_resource(
        "sagemaker_execution_role",
        ResourceKind::Role,
        destroy,
        &role,
        &["athena_bucket_results"],
    )?;
    let inputs = ExecutionPolicyInputs {
        execution_role: role.arn().clone(),
        working_bucket: results.arn().clone(),
        workgroup: workgroup.name().to_string(),
        repository: repository.arn().clone(),
        keys: vec![domain_key.arn().clone(), query_key.arn().clone()],
        shared_account: params.shared_catalog_account.clone(),
        generative_ai: config.generative_ai,
    };
    let policy = attach_execution_policy(&composer, &mut role, &inputs)?;
    graph.add_resource(
        "sagemaker_execution_policy",
        ResourceKind::ManagedPolicy,
        destroy,
        &policy,
        &[
            "sagemaker_execution_role",
            "athena_bucket_results",
            "athena_workgroup",
            "sagemaker_gen_ai_repo",
            domain_key.logical_id(),
            query_key.logical_id(),
        ],
    )?;

    results.grant_write(role.arn())?;
    graph.add_resource(
        "athena_bucket_results_policy",
        ResourceKind::BucketPolicy,
        data_removal,
        &json!({ "bucket": results.name(), "policyDocument": results.policy() }),
        &["athena_bucket_results", "sagemaker_execution_role"],
    )?;

    let role_principal = Principal::arn(role.arn().clone());
    let (statement, _) = registry.grant(
        &mut domain_key,
        role_principal.clone(),
        DOMAIN_KEY_ACTIONS,
        Conditions::new(),
    )?;
    declare_grant(
        &mut graph,
        "sagemaker_kms_key_execution_grant",
        &domain_key,
        &statement,
        &["sagemaker_execution_role"],
    )?;
    let (statement, _) = registry.grant(&mut query_key, role_principal, QUERY_KEY_ACTIONS, Conditions::new())?;
    declare_grant(
        &mut graph,
        "athena_s3_output_kms_key_execution_grant",
        &query_key,
        &statement,
        &["sagemaker_execution_role"],
    )?;

    // Domain
    let spec = DomainSpec::new(&ctx, &config.domain_prefix, &config.project_tag);
    let mut domain = WorkspaceDomain::provision(&ctx, ids, spec)?;
    domain.activate(&DomainPrerequisites {
        perimeter: Some(&perimeter),
        security_group: Some(&group),
        execution_role: Some(&role),
        execution_policy: Some(&policy),
        domain_key: Some(&domain_key),
    })?;
    let mut domain_parents = vec![
        "sagemaker_execution_role",
        "sagemaker_execution_policy",
        "sagemaker_workload_sg",
        "sagemaker_vpc",
        "sagemaker_kms_key_execution_grant",
        domain_key.logical_id(),
    ];
    domain_parents.extend(endpoint_ids.iter().copied());
    graph.add_resource("sagemaker_domain", ResourceKind::WorkspaceDomain, destroy, &domain, &domain_parents)?;

    let mut profile = UserProfile::create(&mut domain, role.name(), &role)?;
    graph.add_resource("sagemaker_user_profile", ResourceKind::UserProfile, destroy, &profile, &["sagemaker_domain"])?;

    let jupyter = domain
        .binding()
        .map(|b| b.default_user_settings.jupyter_server_app_settings.clone())
        .unwrap_or_else(crate::domain::ResourceSpec::jupyter_default);
    let app = Application::create(&mut profile, jupyter)?;
    graph.add_resource(
        "sagemaker_jupyter_server_app",
        ResourceKind::Application,
        destroy,
        &app,
        &["sagemaker_user_profile"],
    )?;

    // Console gate
    let (gate_role, gate_policy) = compose_gate(
        &ctx,
        &params.console_assume_principal,
        profile.arn(),
        domain.id(),
        params.console_cidr,
    )?;
    graph.add_resource(
        "sagemaker_console_role",
        ResourceKind::Role,
        destroy,
        &gate_role,
        &["sagemaker_user_profile"],
    )?;
    graph.add_resource(
        "sagemaker_console_policy",
        ResourceKind::ManagedPolicy,
        destroy,
        &gate_policy,
        &["sagemaker_console_role", "sagemaker_user_profile"],
    )?;

    graph.add_output(
        REPOSITORY_URL_OUTPUT,
        repository.clone_url_http(),
        "The CodeCommit repository URL to clone within your SageMaker user-profile notebook.",
    )?;
    graph.add_output(DOMAIN_ID_OUTPUT, domain.id(), "The SageMaker domain id.")?;

    let graph = graph.validate()?;
    info!(
        resources = graph.len(),
        digest = graph.digest(),
        domain = domain.name(),
        "workspace synthesized"
    );
    Ok(Synthesis {
        graph,
        repository_clone_url: repository.clone_url_http().to_string(),
        domain_id: domain.id().to_string(),
    })
}

fn declare_grant(
    graph: &mut GraphBuilder,
    id: &str,
    key: &EncryptionKey,
    statement: &PolicyStatement,
    extra_parents: &[&str],
) -> Result<()> {
    let mut parents = vec![key.logical_id()];
    parents.extend_from_slice(extra_parents);
    graph.add_resource(
        id,
        ResourceKind::KeyGrant,
        key.removal_policy(),
        &json!({ "keyArn": key.arn(), "statement": statement }),
        &parents,
    )
}
