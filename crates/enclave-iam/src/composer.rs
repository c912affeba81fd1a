//! Identity & policy composer
//!
//! Builds roles and attaches least-privilege managed policies. On top of the
//! per-statement rules enforced by [`StatementBuilder`](crate::StatementBuilder)
//! the composer checks what needs the account context:
//!
//! - no write action on resources owned by another account
//! - identity policies never name principals
//! - role trust is non-empty, concrete and de-duplicated

use crate::document::PolicyDocument;
use crate::principal::Principal;
use crate::role::{ManagedPolicy, Role};
use crate::statement::{PolicyStatement, ResourceScope};
use enclave_core::{ArnContext, ConstructionError, PolicyScopeViolation, Result};
use tracing::debug;

const MAX_ROLE_NAME: usize = 64;
const MAX_POLICY_NAME: usize = 128;

/// Composes roles and policies within one account context
#[derive(Debug, Clone, Copy)]
pub struct PolicyComposer<'a> {
    ctx: &'a ArnContext,
}

impl<'a> PolicyComposer<'a> {
    /// Create a composer for `ctx`
    #[must_use]
    pub fn new(ctx: &'a ArnContext) -> Self {
        Self { ctx }
    }

    /// The account context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &'a ArnContext {
        self.ctx
    }

    /// Create a role assumable by exactly `trust`
    pub fn compose_role(
        &self,
        name: &str,
        trust: impl IntoIterator<Item = Principal>,
    ) -> Result<Role> {
        check_name("role name", name, MAX_ROLE_NAME)?;

        let mut principals: Vec<Principal> = Vec::new();
        for principal in trust {
            if principal.is_wildcard() {
                return Err(PolicyScopeViolation::WildcardPrincipal {
                    sid: format!("trust:{name}"),
                }
                .into());
            }
            if !principals.contains(&principal) {
                principals.push(principal);
            }
        }
        if principals.is_empty() {
            return Err(ConstructionError::invalid(
                "trust",
                format!("role '{name}' has no trusted principals"),
            ));
        }

        debug!(role = name, trust = principals.len(), "composed role");
        Ok(Role::new(
            name.to_string(),
            self.ctx.global_arn("iam", &format!("role/{name}")),
            principals,
        ))
    }

    /// Attach a managed policy built from `statements` to `role`
    ///
    /// Attaching the same name and statements again yields an identical
    /// policy and leaves the role unchanged.
    pub fn attach_policy(
        &self,
        role: &mut Role,
        name: &str,
        description: &str,
        statements: impl IntoIterator<Item = PolicyStatement>,
    ) -> Result<ManagedPolicy> {
        check_name("policy name", name, MAX_POLICY_NAME)?;

        let mut document = PolicyDocument::new();
        for statement in statements {
            self.check_statement(&statement)?;
            document.push(statement)?;
        }
        if document.is_empty() {
            return Err(ConstructionError::invalid(
                "policy",
                format!("policy '{name}' has no statements"),
            ));
        }

        role.attach(name);
        debug!(
            role = role.name(),
            policy = name,
            statements = document.len(),
            "attached managed policy"
        );
        Ok(ManagedPolicy::new(
            name.to_string(),
            description.to_string(),
            self.ctx.global_arn("iam", &format!("policy/{name}")),
            document,
            role.name(),
        ))
    }

    /// Account-aware checks for an identity-policy statement
    pub fn check_statement(&self, statement: &PolicyStatement) -> Result<()> {
        if !statement.principals().is_empty() {
            return Err(ConstructionError::invalid(
                "principal",
                format!(
                    "identity statement '{}' must not name principals",
                    statement.sid()
                ),
            ));
        }
        self.check_foreign_writes(statement)
    }

    /// Reject write actions on resources owned by another account
    pub fn check_foreign_writes(&self, statement: &PolicyStatement) -> Result<()> {
        let ResourceScope::Resources(arns) = statement.scope() else {
            return Ok(());
        };
        if !statement.grants_write() {
            return Ok(());
        }
        let own = self.ctx.account().as_str();
        if let Some(foreign) = arns
            .iter()
            .filter_map(|arn| arn.account())
            .find(|account| !account.is_empty() && *account != "*" && *account != own)
        {
            return Err(PolicyScopeViolation::ForeignAccountWrite {
                sid: statement.sid().to_string(),
                account: foreign.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn check_name(field: &str, name: &str, max: usize) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= max
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+=,.@_-".contains(c));
    if valid {
        Ok(())
    } else {
        Err(ConstructionError::invalid(
            field,
            format!("'{name}' must be 1-{max} characters of [A-Za-z0-9+=,.@_-]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementBuilder;
    use enclave_core::{AccountId, Arn, ErrorKind};

    fn ctx() -> ArnContext {
        ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
    }

    fn read(sid: &str) -> PolicyStatement {
        StatementBuilder::allow(sid)
            .action_names(&["glue:GetTable"])
            .resource(Arn::parse("arn:aws:glue:us-east-1:111111111111:table/*").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn role_trust_is_deduplicated() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        let role = composer
            .compose_role(
                "exec",
                [
                    Principal::service("sagemaker.amazonaws.com"),
                    Principal::service("sagemaker.amazonaws.com"),
                ],
            )
            .unwrap();
        assert_eq!(role.trust().len(), 1);
        assert_eq!(role.arn().as_str(), "arn:aws:iam::111111111111:role/exec");
    }

    #[test]
    fn role_needs_trust() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        assert!(composer.compose_role("exec", []).is_err());
        let err = composer.compose_role("exec", [Principal::Any]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyScope);
        assert!(composer
            .compose_role("bad name", [Principal::service("x.amazonaws.com")])
            .is_err());
    }

    #[test]
    fn attach_is_idempotent() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        let mut role = composer
            .compose_role("exec", [Principal::service("sagemaker.amazonaws.com")])
            .unwrap();
        let first = composer
            .attach_policy(&mut role, "p", "d", [read("A"), read("A")])
            .unwrap();
        let second = composer.attach_policy(&mut role, "p", "d", [read("A")]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.document().len(), 1);
        assert_eq!(role.managed_policies().len(), 1);
    }

    #[test]
    fn foreign_writes_rejected() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        let write = StatementBuilder::allow("Create")
            .action_names(&["glue:CreateDatabase"])
            .resource(Arn::parse("arn:aws:glue:us-east-1:222222222222:catalog").unwrap())
            .build()
            .unwrap();
        let err = composer.check_statement(&write).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyScope);

        let foreign_read = StatementBuilder::allow("Read")
            .action_names(&["glue:GetTable"])
            .resource(Arn::parse("arn:aws:glue:us-east-1:222222222222:table/*").unwrap())
            .build()
            .unwrap();
        assert!(composer.check_statement(&foreign_read).is_ok());
    }

    #[test]
    fn identity_statement_cannot_name_principals() {
        let ctx = ctx();
        let composer = PolicyComposer::new(&ctx);
        let with_principal = StatementBuilder::allow("P")
            .principal(Principal::service("logs.amazonaws.com"))
            .action_names(&["s3:GetObject"])
            .resource(Arn::parse("arn:aws:s3:::b/*").unwrap())
            .build()
            .unwrap();
        assert!(composer.check_statement(&with_principal).is_err());
    }
}
