//! Construction-time error types
//!
//! Every error here is fatal: construction either yields a fully specified,
//! invariant-satisfying resource graph or fails before anything is emitted.
//!
//! - [`ConfigurationError`]: missing scope, missing condition, empty justification
//! - [`DependencyOrderError`]: a child constructed before its parent exists
//! - [`PolicyScopeViolation`]: a grant broader than its purpose allows

/// Result alias used throughout the enclave crates
pub type Result<T, E = ConstructionError> = std::result::Result<T, E>;

/// Top-level construction error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// Missing or invalid configuration of a single entity
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Entity built out of dependency order
    #[error("dependency order error: {0}")]
    DependencyOrder(#[from] DependencyOrderError),

    /// Grant broader than its declared purpose
    #[error("policy scope violation: {0}")]
    PolicyScope(#[from] PolicyScopeViolation),
}

/// Coarse classification of a [`ConstructionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ConfigurationError`]
    Configuration,
    /// See [`DependencyOrderError`]
    DependencyOrder,
    /// See [`PolicyScopeViolation`]
    PolicyScope,
}

impl ConstructionError {
    /// Classify this error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::DependencyOrder(_) => ErrorKind::DependencyOrder,
            Self::PolicyScope(_) => ErrorKind::PolicyScope,
        }
    }

    /// Shorthand for [`ConfigurationError::InvalidValue`]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Statement has neither resources nor not-resources
    #[error("statement '{sid}' has an empty resource scope")]
    EmptyResourceScope { sid: String },

    /// Statement has no actions
    #[error("statement '{sid}' grants no actions")]
    EmptyActions { sid: String },

    /// Required condition key absent
    #[error("statement '{sid}' is missing required condition '{key}'")]
    MissingCondition { sid: String, key: String },

    /// Audit justification absent or blank
    #[error("empty justification for {context}")]
    EmptyJustification { context: String },

    /// Field value rejected
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Identifier reused with different content
    #[error("duplicate {what}: '{id}'")]
    Duplicate { what: &'static str, id: String },

    /// Security group not trusted by the perimeter
    #[error("security group '{group}' is not trusted by perimeter '{perimeter}'")]
    UntrustedSecurityGroup { group: String, perimeter: String },

    /// Bucket built without an expiring lifecycle rule
    #[error("bucket '{bucket}' has no lifecycle expiration")]
    MissingLifecycleExpiration { bucket: String },

    /// At most one instance allowed
    #[error("{what} already exists in '{parent}'")]
    CardinalityExceeded { what: &'static str, parent: String },
}

/// Dependency ordering errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyOrderError {
    /// Child declared before its parent exists
    #[error("'{child}' depends on '{parent}' which does not exist yet")]
    MissingParent { child: String, parent: String },

    /// Child requires a parent of this kind but declares none
    #[error("'{child}' must declare a dependency on a {kind}")]
    MissingRequiredEdge { child: String, kind: String },

    /// Parent exists but has not reached its active state
    #[error("'{child}' requires '{parent}' to be active (currently {state})")]
    ParentNotActive {
        child: String,
        parent: String,
        state: String,
    },

    /// Activation prerequisite absent
    #[error("'{resource}' cannot activate: {missing} missing")]
    PrerequisiteMissing { resource: String, missing: String },

    /// Parent torn down while children remain
    #[error("'{parent}' still has live children: {children:?}")]
    ChildrenRemaining {
        parent: String,
        children: Vec<String>,
    },

    /// State machine transition rejected
    #[error("illegal transition for '{resource}': {from} -> {to}")]
    IllegalTransition {
        resource: String,
        from: String,
        to: String,
    },

    /// Resource depends on itself
    #[error("'{0}' depends on itself")]
    SelfDependency(String),

    /// Edge would close a cycle
    #[error("dependency cycle through '{0}'")]
    Cycle(String),
}

/// Scope violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyScopeViolation {
    /// Actions outside the allow-list for the declared purpose
    #[error("actions {excess:?} exceed the allow-list for {purpose}")]
    ActionsExceedAllowList {
        purpose: String,
        excess: Vec<String>,
    },

    /// Key-use action on `*` or a wildcard key pattern
    #[error("statement '{sid}' uses keys on non-concrete resource '{resource}'")]
    WildcardKeyResource { sid: String, resource: String },

    /// Non-read-only action on the `*` resource
    #[error("statement '{sid}' grants non-read-only actions {actions:?} on '*'")]
    WildcardResourceForWrite { sid: String, actions: Vec<String> },

    /// Service-wide action without a carve-out
    #[error("statement '{sid}' grants '{action}' without a notResources carve-out")]
    ServiceWideAction { sid: String, action: String },

    /// Write action against another account's resources
    #[error("statement '{sid}' grants write actions on account {account}")]
    ForeignAccountWrite { sid: String, account: String },

    /// `*` principal in an allow grant
    #[error("grant '{sid}' names a wildcard principal")]
    WildcardPrincipal { sid: String },

    /// Condition value that matches every possible value of its key
    #[error("statement '{sid}' conditions '{key}' on wildcard '{value}'")]
    WildcardCondition {
        sid: String,
        key: String,
        value: String,
    },

    /// Network rule with an unscoped peer
    #[error("rule '{rule}' targets an unscoped peer")]
    UnscopedPeer { rule: String },
}
