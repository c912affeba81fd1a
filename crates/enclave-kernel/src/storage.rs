//! Storage layer
//!
//! Buckets are private, versioned, TLS-only and lifecycle-managed. Every
//! bucket except the terminal access-log sink ships its server access logs
//! to another bucket.

use enclave_core::{
    Arn, ArnContext, ConfigurationError, ConstructionError, RemovalPolicy, Result,
};
use enclave_iam::{
    ConditionOperator, Conditions, PolicyDocument, Principal, StatementBuilder, SECURE_TRANSPORT,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

static BUCKET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("static regex"));

/// Days before objects move to intelligent tiering
pub const DEFAULT_TRANSITION_DAYS: u32 = 31;
/// Days before objects expire
pub const DEFAULT_EXPIRATION_DAYS: u32 = 365;

const TLS_DENY_SID: &str = "DenyInsecureTransport";

/// Server-side encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "keyArn", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BucketEncryption {
    /// Provider-managed key
    KmsManaged,
    /// Customer-managed key
    Kms(Arn),
}

impl BucketEncryption {
    /// Key ARN for customer-managed encryption
    #[must_use]
    pub fn key_arn(&self) -> Option<&Arn> {
        match self {
            Self::KmsManaged => None,
            Self::Kms(arn) => Some(arn),
        }
    }
}

/// Lifecycle transition target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    /// Access-pattern driven tiering
    IntelligentTiering,
    /// Infrequent access
    StandardIa,
    /// Archive
    Glacier,
}

/// Move objects to `storage_class` after `after_days`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Target class
    pub storage_class: StorageClass,
    /// Days after creation
    pub after_days: u32,
}

/// One lifecycle rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    /// Transitions, in any order
    pub transitions: Vec<Transition>,
    /// Days after creation at which objects expire
    pub expiration_days: Option<u32>,
}

impl LifecycleRule {
    /// Intelligent tiering after 31 days, expiry after 365
    #[must_use]
    pub fn default_rule() -> Self {
        Self {
            transitions: vec![Transition {
                storage_class: StorageClass::IntelligentTiering,
                after_days: DEFAULT_TRANSITION_DAYS,
            }],
            expiration_days: Some(DEFAULT_EXPIRATION_DAYS),
        }
    }

    /// Rule without expiration
    #[must_use]
    pub fn transitions_only(transitions: Vec<Transition>) -> Self {
        Self {
            transitions,
            expiration_days: None,
        }
    }
}

/// Where a bucket's server access logs go
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogTarget {
    /// Destination bucket name
    pub bucket: String,
    /// Key prefix
    pub prefix: Option<String>,
}

/// Requested bucket shape
#[derive(Debug, Clone)]
pub struct BucketSpec {
    name: String,
    encryption: BucketEncryption,
    versioned: bool,
    lifecycle: Vec<LifecycleRule>,
    access_log: Option<AccessLogTarget>,
    terminal: bool,
    removal: RemovalPolicy,
    auto_delete_objects: bool,
}

impl BucketSpec {
    /// Spec with the default lifecycle, versioning and removal policy
    #[must_use]
    pub fn new(name: impl Into<String>, encryption: BucketEncryption) -> Self {
        Self {
            name: name.into(),
            encryption,
            versioned: true,
            lifecycle: vec![LifecycleRule::default_rule()],
            access_log: None,
            terminal: false,
            removal: RemovalPolicy::Destroy,
            auto_delete_objects: true,
        }
    }

    /// Send access logs to `bucket`
    #[inline]
    #[must_use]
    pub fn with_access_log(mut self, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        self.access_log = Some(AccessLogTarget {
            bucket: bucket.into(),
            prefix,
        });
        self
    }

    /// Replace the lifecycle rules
    #[inline]
    #[must_use]
    pub fn with_lifecycle(mut self, rules: Vec<LifecycleRule>) -> Self {
        self.lifecycle = rules;
        self
    }

    /// Request versioning on or off
    #[inline]
    #[must_use]
    pub fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    /// Removal policy
    #[inline]
    #[must_use]
    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    #[must_use]
    fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Public access block, all four switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccessBlock {
    /// Reject public ACLs
    pub block_public_acls: bool,
    /// Reject public bucket policies
    pub block_public_policy: bool,
    /// Ignore existing public ACLs
    pub ignore_public_acls: bool,
    /// Restrict cross-account access under public policies
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    const ALL: Self = Self {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };
}

/// Object ownership setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectOwnership {
    /// Bucket owner owns objects written with the `bucket-owner-full-control` ACL
    BucketOwnerPreferred,
}

/// A constructed bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucket {
    name: String,
    arn: Arn,
    encryption: BucketEncryption,
    bucket_key_enabled: bool,
    public_access_block: PublicAccessBlock,
    object_ownership: ObjectOwnership,
    enforce_ssl: bool,
    versioned: bool,
    lifecycle_rules: Vec<LifecycleRule>,
    server_access_logs: Option<AccessLogTarget>,
    removal_policy: RemovalPolicy,
    auto_delete_objects: bool,
    #[serde(rename = "bucketPolicy")]
    policy: PolicyDocument,
}

/// Create a bucket
pub fn create_bucket(ctx: &ArnContext, spec: BucketSpec) -> Result<StorageBucket> {
    if !BUCKET_NAME_RE.is_match(&spec.name) || spec.name.contains("..") {
        return Err(ConstructionError::invalid(
            "bucket_name",
            format!("'{}' is not a valid bucket name", spec.name),
        ));
    }
    if !spec.versioned {
        return Err(ConstructionError::invalid(
            "versioned",
            format!("bucket '{}' must be versioned", spec.name),
        ));
    }
    check_lifecycle(&spec.name, &spec.lifecycle)?;

    match (&spec.access_log, spec.terminal) {
        (None, false) => {
            return Err(ConstructionError::invalid(
                "server_access_logs",
                format!("bucket '{}' must name an access-log bucket", spec.name),
            ))
        }
        (Some(target), _) if target.bucket == spec.name => {
            return Err(ConstructionError::invalid(
                "server_access_logs",
                format!("bucket '{}' cannot log to itself", spec.name),
            ))
        }
        _ => {}
    }

    let arn = ctx.s3_arn(&spec.name);
    let mut policy = PolicyDocument::new();
    policy.push(
        StatementBuilder::deny(TLS_DENY_SID)
            .principal(Principal::Any)
            .action_names(&["s3:*"])
            .resource(arn.clone())
            .resource(arn.child("/*"))
            .conditions(Conditions::new().with(
                ConditionOperator::Bool,
                SECURE_TRANSPORT,
                ["false"],
            ))
            .build()?,
    )?;

    info!(
        bucket = %spec.name,
        terminal = spec.terminal,
        encryption = ?spec.encryption,
        "bucket created"
    );
    Ok(StorageBucket {
        name: spec.name,
        arn,
        encryption: spec.encryption,
        bucket_key_enabled: true,
        public_access_block: PublicAccessBlock::ALL,
        object_ownership: ObjectOwnership::BucketOwnerPreferred,
        enforce_ssl: true,
        versioned: true,
        lifecycle_rules: spec.lifecycle,
        server_access_logs: spec.access_log,
        removal_policy: spec.removal,
        auto_delete_objects: spec.auto_delete_objects,
        policy,
    })
}

/// Create the terminal access-log sink
///
/// Encrypted with the provider-managed key; it does not log its own access.
pub fn create_access_log_bucket(
    ctx: &ArnContext,
    name: impl Into<String>,
    removal: RemovalPolicy,
) -> Result<StorageBucket> {
    create_bucket(
        ctx,
        BucketSpec::new(name, BucketEncryption::KmsManaged)
            .with_removal(removal)
            .terminal(),
    )
}

fn check_lifecycle(bucket: &str, rules: &[LifecycleRule]) -> Result<()> {
    if !rules.iter().any(|r| r.expiration_days.is_some()) {
        return Err(ConfigurationError::MissingLifecycleExpiration {
            bucket: bucket.to_string(),
        }
        .into());
    }
    for rule in rules {
        if rule.expiration_days == Some(0) {
            return Err(ConstructionError::invalid(
                "expiration_days",
                format!("bucket '{bucket}' expires objects on creation"),
            ));
        }
        if let Some(expiration) = rule.expiration_days {
            if let Some(late) = rule.transitions.iter().find(|t| t.after_days >= expiration) {
                return Err(ConstructionError::invalid(
                    "lifecycle",
                    format!(
                        "bucket '{bucket}': transition at day {} is not before expiration at day {expiration}",
                        late.after_days
                    ),
                ));
            }
        }
    }
    Ok(())
}

impl StorageBucket {
    /// Bucket name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// ARN pattern of every object
    #[must_use]
    pub fn objects_arn(&self) -> Arn {
        self.arn.child("/*")
    }

    /// `s3://<name>/`
    #[must_use]
    pub fn s3_url(&self) -> String {
        format!("s3://{}/", self.name)
    }

    /// Encryption setting
    #[inline]
    #[must_use]
    pub fn encryption(&self) -> &BucketEncryption {
        &self.encryption
    }

    /// Access-log destination, absent only for the terminal sink
    #[inline]
    #[must_use]
    pub fn access_log(&self) -> Option<&AccessLogTarget> {
        self.server_access_logs.as_ref()
    }

    /// Lifecycle rules
    #[inline]
    #[must_use]
    pub fn lifecycle_rules(&self) -> &[LifecycleRule] {
        &self.lifecycle_rules
    }

    /// Public access block
    #[inline]
    #[must_use]
    pub fn public_access_block(&self) -> PublicAccessBlock {
        self.public_access_block
    }

    /// Always true
    #[inline]
    #[must_use]
    pub fn enforces_ssl(&self) -> bool {
        self.enforce_ssl
    }

    /// Always true
    #[inline]
    #[must_use]
    pub fn versioned(&self) -> bool {
        self.versioned
    }

    /// Removal policy
    #[inline]
    #[must_use]
    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    /// Bucket resource policy
    #[must_use]
    pub fn policy(&self) -> &PolicyDocument {
        &self.policy
    }

    /// Let `role` write objects
    ///
    /// Returns whether the policy changed.
    pub fn grant_write(&mut self, role: &Arn) -> Result<bool> {
        let suffix = role
            .resource()
            .and_then(|r| r.rsplit('/').next())
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>();
        let statement = StatementBuilder::allow(format!("WriteAccess{suffix}"))
            .principal(Principal::arn(role.clone()))
            .action_names(&[
                "s3:PutObject",
                "s3:PutObjectAcl",
                "s3:DeleteObject",
                "s3:GetBucketLocation",
            ])
            .resource(self.arn.clone())
            .resource(self.objects_arn())
            .build()?;
        let changed = self.policy.push(statement)?;
        if changed {
            debug!(bucket = %self.name, %role, "bucket write granted");
        }
        Ok(changed)
    }
}
