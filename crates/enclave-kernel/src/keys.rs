//! Key registry
//!
//! Every key is created with rotation on and a bounded pending-deletion
//! window. Each key has exactly one purpose, and grants on its resource
//! policy are limited to that purpose's allow-list.

use enclave_core::{
    ArnContext, Arn, ConfigurationError, ConstructionError, IdentifierKind, IdentifierSource,
    PolicyScopeViolation, RemovalPolicy, Result,
};
use enclave_iam::{
    Action, ConditionOperator, Conditions, PolicyDocument, PolicyStatement, Principal,
    StatementBuilder, LOGS_ENCRYPTION_CONTEXT,
};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Default pending-deletion window
pub const DEFAULT_PENDING_WINDOW_DAYS: u32 = 7;
/// Accepted pending-deletion window
pub const PENDING_WINDOW_RANGE: std::ops::RangeInclusive<u32> = 7..=30;

/// What a key encrypts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    /// Flow log group encryption
    LogSink,
    /// Domain volumes and workspace data
    WorkspaceData,
    /// Query results bucket
    QueryOutput,
}

impl KeyPurpose {
    /// Actions a grant for this purpose may contain
    #[must_use]
    pub fn allow_list(self) -> &'static [&'static str] {
        match self {
            Self::LogSink => &[
                "kms:Encrypt*",
                "kms:Decrypt*",
                "kms:GenerateDataKey*",
                "kms:Describe*",
            ],
            Self::WorkspaceData => &[
                "kms:DescribeKey",
                "kms:Decrypt",
                "kms:Encrypt",
                "kms:GenerateDataKey",
                "kms:CreateGrant",
                "kms:ReEncrypt*",
            ],
            Self::QueryOutput => &[
                "kms:DescribeKey",
                "kms:Encrypt",
                "kms:Decrypt",
                "kms:GenerateDataKey*",
            ],
        }
    }

    fn sid_prefix(self) -> &'static str {
        match self {
            Self::LogSink => "LogSink",
            Self::WorkspaceData => "WorkspaceData",
            Self::QueryOutput => "QueryOutput",
        }
    }

    fn permits(self, action: &Action) -> bool {
        self.allow_list()
            .iter()
            .filter_map(|allowed| Action::parse(*allowed).ok())
            .any(|allowed| allowed.covers(action))
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sid_prefix())
    }
}

/// A customer-managed encryption key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionKey {
    logical_id: String,
    key_id: String,
    arn: Arn,
    alias: String,
    description: String,
    purpose: KeyPurpose,
    enable_key_rotation: bool,
    pending_window_days: u32,
    removal_policy: RemovalPolicy,
    #[serde(rename = "keyPolicy")]
    policy: PolicyDocument,
}

impl EncryptionKey {
    /// Logical id
    #[inline]
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Allocated key id
    #[inline]
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Key ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// `alias/<name>`
    #[inline]
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Purpose
    #[inline]
    #[must_use]
    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }

    /// Always true
    #[inline]
    #[must_use]
    pub fn rotation_enabled(&self) -> bool {
        self.enable_key_rotation
    }

    /// Days between scheduling deletion and deletion
    #[inline]
    #[must_use]
    pub fn pending_window_days(&self) -> u32 {
        self.pending_window_days
    }

    /// Removal policy
    #[inline]
    #[must_use]
    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    /// Resource policy grants
    #[must_use]
    pub fn grants(&self) -> &PolicyDocument {
        &self.policy
    }

    /// Whether any grant names `principal`
    #[must_use]
    pub fn grants_to(&self, principal: &Principal) -> bool {
        self.policy
            .statements()
            .any(|s| s.principals().contains(principal))
    }
}

/// Creates keys and grants within one account context
#[derive(Clone, Copy)]
pub struct KeyRegistry<'a> {
    ctx: &'a ArnContext,
    ids: &'a dyn IdentifierSource,
    pending_window_days: u32,
}

impl fmt::Debug for KeyRegistry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("ctx", self.ctx)
            .field("pending_window_days", &self.pending_window_days)
            .finish_non_exhaustive()
    }
}

impl<'a> KeyRegistry<'a> {
    /// Registry with the default pending window
    #[must_use]
    pub fn new(ctx: &'a ArnContext, ids: &'a dyn IdentifierSource) -> Self {
        Self {
            ctx,
            ids,
            pending_window_days: DEFAULT_PENDING_WINDOW_DAYS,
        }
    }

    /// Override the pending window
    pub fn with_pending_window(mut self, days: u32) -> Result<Self> {
        if !PENDING_WINDOW_RANGE.contains(&days) {
            return Err(ConstructionError::invalid(
                "pending_window_days",
                format!(
                    "{days} is outside {}..={}",
                    PENDING_WINDOW_RANGE.start(),
                    PENDING_WINDOW_RANGE.end()
                ),
            ));
        }
        self.pending_window_days = days;
        Ok(self)
    }

    /// Create a key
    pub fn create_key(
        &self,
        logical_id: &str,
        alias: &str,
        purpose: KeyPurpose,
        description: &str,
    ) -> Result<EncryptionKey> {
        let alias = alias.strip_prefix("alias/").unwrap_or(alias);
        let alias_ok = !alias.is_empty()
            && !alias.starts_with("aws/")
            && alias
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "/_-".contains(c));
        if !alias_ok {
            return Err(ConstructionError::invalid(
                "alias",
                format!("'{alias}' is not a valid customer key alias"),
            ));
        }

        let key_id = self.ids.allocate(IdentifierKind::Key, logical_id);
        let arn = self.ctx.arn("kms", &format!("key/{key_id}"));
        debug!(key = logical_id, %arn, %purpose, "key created");
        Ok(EncryptionKey {
            logical_id: logical_id.to_string(),
            key_id,
            arn,
            alias: format!("alias/{alias}"),
            description: description.to_string(),
            purpose,
            enable_key_rotation: true,
            pending_window_days: self.pending_window_days,
            removal_policy: RemovalPolicy::Destroy,
            policy: PolicyDocument::new(),
        })
    }

    /// Add a grant to `key`'s resource policy
    ///
    /// Returns the grant statement and whether the policy changed.
    pub fn grant(
        &self,
        key: &mut EncryptionKey,
        principal: Principal,
        actions: &[&str],
        conditions: Conditions,
    ) -> Result<(PolicyStatement, bool)> {
        let actions = Action::list(actions)?;
        let excess: Vec<String> = actions
            .iter()
            .filter(|a| !key.purpose.permits(a))
            .map(ToString::to_string)
            .collect();
        if !excess.is_empty() {
            return Err(PolicyScopeViolation::ActionsExceedAllowList {
                purpose: key.purpose.to_string(),
                excess,
            }
            .into());
        }
        if key.purpose == KeyPurpose::LogSink {
            self.check_log_context(key, &conditions)?;
        }

        if let Some(existing) = key.policy.statements().find(|s| {
            s.principals() == [principal.clone()]
                && s.actions() == actions.as_slice()
                && *s.conditions() == conditions
        }) {
            return Ok((existing.clone(), false));
        }

        let sid = format!("{}Grant{}", key.purpose.sid_prefix(), key.policy.len() + 1);
        let statement = StatementBuilder::allow(sid)
            .principal(principal)
            .actions(actions)
            .resource(key.arn.clone())
            .conditions(conditions)
            .build()?;
        key.policy.push(statement.clone())?;
        debug!(
            key = %key.logical_id,
            sid = statement.sid(),
            "key grant added"
        );
        Ok((statement, true))
    }

    fn check_log_context(&self, key: &EncryptionKey, conditions: &Conditions) -> Result<()> {
        let missing = || -> ConstructionError {
            ConfigurationError::MissingCondition {
                sid: format!("{}Grant", key.purpose.sid_prefix()),
                key: LOGS_ENCRYPTION_CONTEXT.to_string(),
            }
            .into()
        };
        let values = conditions
            .get(ConditionOperator::ArnEquals, LOGS_ENCRYPTION_CONTEXT)
            .ok_or_else(missing)?;
        for value in values {
            let arn = Arn::parse(value.as_str())?;
            let concrete = !arn.has_wildcard()
                && arn.service() == Some("logs")
                && arn.account() == Some(self.ctx.account().as_str());
            if !concrete {
                return Err(ConstructionError::invalid(
                    LOGS_ENCRYPTION_CONTEXT,
                    format!("'{value}' is not a log group of this account"),
                ));
            }
        }
        Ok(())
    }
}

/// Condition binding a log-sink grant to one log group
#[must_use]
pub fn log_group_context(ctx: &ArnContext, log_group: &str) -> Conditions {
    Conditions::new().with(
        ConditionOperator::ArnEquals,
        LOGS_ENCRYPTION_CONTEXT,
        [ctx.log_group_arn(log_group).to_string()],
    )
}
