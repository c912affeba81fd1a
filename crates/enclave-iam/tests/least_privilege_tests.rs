//! Least-privilege properties of the composed workspace identities

use enclave_core::{Arn, ArnContext, PolicyScopeViolation};
use enclave_iam::prelude::*;
use enclave_iam::{
    ConditionOperator, PolicyStatement, ResourceScope, PASSED_TO_SERVICE, SOURCE_IP,
};
use enclave_network::Ipv4Cidr;
use enclave_test_utils::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn inputs(ctx: &ArnContext, shared: bool, generative_ai: bool) -> ExecutionPolicyInputs {
    ExecutionPolicyInputs {
        execution_role: ctx.global_arn("iam", "role/sagemaker-user-profile-for-security-lake"),
        working_bucket: ctx.s3_arn("athena-gen-ai-bucket-results-111111111111"),
        workgroup: "security_lake_gen_ai".to_string(),
        repository: ctx.arn("codecommit", "sagemaker_gen_ai_repo"),
        keys: vec![key_arn(ctx, "domain-key"), key_arn(ctx, "query-key")],
        shared_account: shared.then(shared_account),
        generative_ai,
    }
}

fn compose(ctx: &ArnContext, shared: bool, generative_ai: bool) -> (Role, ManagedPolicy) {
    let composer = PolicyComposer::new(ctx);
    let mut role = compose_execution_role(&composer, generative_ai).unwrap();
    let policy = attach_execution_policy(&composer, &mut role, &inputs(ctx, shared, generative_ai)).unwrap();
    (role, policy)
}

fn all_statements(ctx: &ArnContext) -> Vec<PolicyStatement> {
    let (_, execution) = compose(ctx, true, true);
    let profile = ctx.arn("sagemaker", "user-profile/d-abc/default");
    let (_, gate) = compose_gate(
        ctx,
        &admin_role(),
        &profile,
        "d-abc",
        Ipv4Cidr::parse(RESTRICTED_CIDR).unwrap(),
    )
    .unwrap();
    execution
        .document()
        .statements()
        .chain(gate.document().statements())
        .cloned()
        .collect()
}

#[test]
fn every_statement_has_a_scope() {
    let ctx = fixed_context();
    for statement in all_statements(&ctx) {
        assert!(!statement.scope().arns().is_empty(), "{}", statement.sid());
    }
}

#[test]
fn every_pass_role_is_conditioned() {
    let ctx = fixed_context();
    let pass_roles: Vec<_> = all_statements(&ctx)
        .into_iter()
        .filter(PolicyStatement::is_pass_role)
        .collect();
    assert_eq!(pass_roles.len(), 2);
    for statement in pass_roles {
        assert!(statement.conditions().has_key(PASSED_TO_SERVICE), "{}", statement.sid());
    }
}

#[test]
fn pass_role_to_any_service_is_rejected() {
    let ctx = fixed_context();
    let role = ctx.global_arn("iam", "role/sagemaker-user-profile-for-security-lake");
    for value in ["*", "*.amazonaws.com", "?*"] {
        let err = StatementBuilder::allow("PassAny")
            .action_names(&["iam:PassRole"])
            .resource(role.clone())
            .conditions(Conditions::new().with(ConditionOperator::StringLike, PASSED_TO_SERVICE, [value]))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            PolicyScopeViolation::WildcardCondition {
                sid: "PassAny".into(),
                key: PASSED_TO_SERVICE.into(),
                value: value.into(),
            }
            .into()
        );
    }

    let mixed = StatementBuilder::allow("PassMixed")
        .action_names(&["iam:PassRole"])
        .resource(role)
        .conditions(Conditions::new().with(
            ConditionOperator::StringLike,
            PASSED_TO_SERVICE,
            ["sagemaker.amazonaws.com", "*"],
        ))
        .build();
    assert!(mixed.is_err());
}

#[test]
fn key_use_targets_concrete_keys() {
    let ctx = fixed_context();
    for statement in all_statements(&ctx).iter().filter(|s| s.is_key_use()) {
        let ResourceScope::Resources(arns) = statement.scope() else {
            panic!("{} uses keys through a carve-out", statement.sid());
        };
        for arn in arns {
            assert!(!arn.has_wildcard(), "{arn}");
            assert!(arn.resource().unwrap().starts_with("key/"), "{arn}");
        }
    }
}

#[test]
fn wildcard_resources_are_read_only_and_justified() {
    let ctx = fixed_context();
    for statement in all_statements(&ctx) {
        if statement.resources().iter().any(Arn::is_any) {
            assert!(!statement.grants_write(), "{}", statement.sid());
            assert!(statement.justification().is_some(), "{}", statement.sid());
        }
    }
}

#[test]
fn recomposing_is_idempotent() {
    let ctx = fixed_context();
    let (first_role, first) = compose(&ctx, true, true);
    let (second_role, second) = compose(&ctx, true, true);
    assert_eq!(first.document().len(), second.document().len());
    assert_eq!(
        first.document().sids().collect::<Vec<_>>(),
        second.document().sids().collect::<Vec<_>>()
    );
    assert_eq!(first_role, second_role);
    assert_eq!(
        serde_json::to_value(first.document()).unwrap(),
        serde_json::to_value(second.document()).unwrap()
    );
}

#[test]
fn shared_account_gets_exactly_two_glue_reads_and_no_writes() {
    let ctx = fixed_context();
    let (_, policy) = compose(&ctx, true, false);
    let glue_reads: Vec<_> = policy
        .document()
        .statements()
        .filter(|s| s.sid().starts_with("GlueCatalogRead"))
        .collect();
    assert_eq!(glue_reads.len(), 2);
    assert_eq!(glue_reads[0].actions(), glue_reads[1].actions());

    for statement in policy.document().statements() {
        let touches_shared = statement
            .resources()
            .iter()
            .any(|arn| arn.account() == Some(SHARED_ACCOUNT));
        if touches_shared {
            assert!(!statement.grants_write(), "{}", statement.sid());
        }
    }
}

#[test]
fn without_shared_account_only_local_glue_read() {
    let ctx = fixed_context();
    let (_, policy) = compose(&ctx, false, false);
    assert!(policy.document().get("GlueCatalogReadShared").is_none());
    assert!(policy.document().get("GlueCatalogReadLocal").is_some());
}

#[test]
fn gate_restricts_presigned_url_to_cidr() {
    let ctx = fixed_context();
    let profile = ctx.arn("sagemaker", "user-profile/d-abc/default");
    let (role, policy) = compose_gate(
        &ctx,
        &admin_role(),
        &profile,
        "d-abc",
        Ipv4Cidr::parse(RESTRICTED_CIDR).unwrap(),
    )
    .unwrap();

    let presign: Vec<_> = policy
        .document()
        .statements()
        .filter(|s| s.actions().iter().any(|a| a.as_str() == "sagemaker:CreatePresignedDomainUrl"))
        .collect();
    assert_eq!(presign.len(), 1);
    let statement = presign[0];
    assert_eq!(statement.actions().len(), 1);
    assert_eq!(statement.resources(), [profile]);
    assert_eq!(
        statement.conditions().keys().collect::<Vec<_>>(),
        [(ConditionOperator::IpAddress, SOURCE_IP)]
    );
    assert_eq!(
        statement.conditions().values(SOURCE_IP).unwrap(),
        [RESTRICTED_CIDR.to_string()]
    );
    assert_eq!(role.trust(), [Principal::arn(admin_role())]);
}

#[test]
fn policy_document_json_shape() {
    let ctx = fixed_context();
    let (role, policy) = compose(&ctx, false, false);
    let json = serde_json::to_value(policy.document()).unwrap();
    assert_eq!(json["Version"], "2012-10-17");
    let carve_out = json["Statement"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["Sid"] == "SageMakerNotResourceAllow")
        .unwrap();
    assert!(carve_out.get("Resource").is_none());
    assert_eq!(carve_out["NotResource"].as_array().unwrap().len(), 4);

    let role_json = serde_json::to_value(&role).unwrap();
    assert_eq!(
        role_json["assumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"][0],
        "sagemaker.amazonaws.com"
    );
}

proptest! {
    #[test]
    fn composition_holds_for_any_option_mix(shared in any::<bool>(), generative_ai in any::<bool>()) {
        let ctx = fixed_context();
        let (role, policy) = compose(&ctx, shared, generative_ai);
        prop_assert_eq!(role.trust().len(), if generative_ai { 2 } else { 1 });
        for statement in policy.document().statements() {
            prop_assert!(!statement.scope().arns().is_empty());
            if statement.is_pass_role() {
                prop_assert!(statement.conditions().has_key(PASSED_TO_SERVICE));
            }
        }
    }
}
