//! Policy statements
//!
//! A [`PolicyStatement`] can only be obtained from [`StatementBuilder::build`],
//! which rejects anything over-broad instead of emitting it:
//!
//! - empty action set or empty resource scope
//! - `iam:PassRole` without an `iam:PassedToService` condition
//! - key-use actions on anything but concrete key ARNs
//! - non-read-only actions on the bare `*` resource
//! - read-only actions on `*` without an audit justification
//! - service-wide actions (`svc:*`) without a `notResources` carve-out
//! - a wildcard principal in an `Allow` grant

use crate::action::Action;
use crate::condition::{Conditions, PASSED_TO_SERVICE};
use crate::principal::Principal;
use enclave_core::{
    require_justification, Arn, ConfigurationError, ConstructionError, PolicyScopeViolation, Result,
};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Effect {
    /// Grant
    Allow,
    /// Explicit denial
    Deny,
}

/// Resources a statement applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    /// Exactly these resources
    Resources(Vec<Arn>),
    /// Everything except these resources
    NotResources(Vec<Arn>),
}

impl ResourceScope {
    /// The ARNs listed, whichever variant
    #[must_use]
    pub fn arns(&self) -> &[Arn] {
        match self {
            Self::Resources(arns) | Self::NotResources(arns) => arns,
        }
    }
}

/// A single validated statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyStatement {
    sid: String,
    effect: Effect,
    principals: Vec<Principal>,
    actions: Vec<Action>,
    scope: ResourceScope,
    conditions: Conditions,
    justification: Option<String>,
}

impl PolicyStatement {
    /// Statement id
    #[inline]
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Effect
    #[inline]
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Principals (resource policies and trust policies only)
    #[inline]
    #[must_use]
    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    /// Actions
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Resource scope
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Resources, if scoped positively
    #[must_use]
    pub fn resources(&self) -> &[Arn] {
        match &self.scope {
            ResourceScope::Resources(arns) => arns,
            ResourceScope::NotResources(_) => &[],
        }
    }

    /// Not-resources, if scoped by carve-out
    #[must_use]
    pub fn not_resources(&self) -> &[Arn] {
        match &self.scope {
            ResourceScope::NotResources(arns) => arns,
            ResourceScope::Resources(_) => &[],
        }
    }

    /// Conditions
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Audit justification for a `*` resource
    #[inline]
    #[must_use]
    pub fn justification(&self) -> Option<&str> {
        self.justification.as_deref()
    }

    /// Any action that is not read-only
    #[must_use]
    pub fn grants_write(&self) -> bool {
        self.actions.iter().any(|a| !a.is_read_only())
    }

    /// Grants any key-use action
    #[must_use]
    pub fn is_key_use(&self) -> bool {
        self.actions.iter().any(|a| a.service() == "kms")
    }

    /// Grants `iam:PassRole`, directly or through a glob
    #[must_use]
    pub fn is_pass_role(&self) -> bool {
        let pass_role = Action::pass_role();
        self.actions.iter().any(|a| a.covers(&pass_role))
    }
}

impl Serialize for PolicyStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Sid", &self.sid)?;
        map.serialize_entry("Effect", &self.effect)?;
        if !self.principals.is_empty() {
            map.serialize_entry("Principal", &Principal::block(&self.principals))?;
        }
        map.serialize_entry("Action", &self.actions)?;
        match &self.scope {
            ResourceScope::Resources(arns) => map.serialize_entry("Resource", arns)?,
            ResourceScope::NotResources(arns) => map.serialize_entry("NotResource", arns)?,
        }
        if !self.conditions.is_empty() {
            map.serialize_entry("Condition", &self.conditions)?;
        }
        map.end()
    }
}

/// Builder for [`PolicyStatement`]
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    sid: String,
    effect: Effect,
    principals: Vec<Principal>,
    actions: Vec<Action>,
    resources: Vec<Arn>,
    not_resources: Vec<Arn>,
    conditions: Conditions,
    justification: Option<String>,
    error: Option<ConstructionError>,
}

impl StatementBuilder {
    /// Start an `Allow` statement
    pub fn allow(sid: impl Into<String>) -> Self {
        Self::new(sid, Effect::Allow)
    }

    /// Start a `Deny` statement
    pub fn deny(sid: impl Into<String>) -> Self {
        Self::new(sid, Effect::Deny)
    }

    fn new(sid: impl Into<String>, effect: Effect) -> Self {
        Self {
            sid: sid.into(),
            effect,
            principals: Vec::new(),
            actions: Vec::new(),
            resources: Vec::new(),
            not_resources: Vec::new(),
            conditions: Conditions::new(),
            justification: None,
            error: None,
        }
    }

    /// Add a principal
    #[must_use]
    pub fn principal(mut self, principal: Principal) -> Self {
        if !self.principals.contains(&principal) {
            self.principals.push(principal);
        }
        self
    }

    /// Add parsed actions
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        for action in actions {
            if !self.actions.contains(&action) {
                self.actions.push(action);
            }
        }
        self
    }

    /// Add actions by name; a malformed name surfaces from [`Self::build`]
    #[must_use]
    pub fn action_names(self, names: &[&str]) -> Self {
        match Action::list(names) {
            Ok(actions) => self.actions(actions),
            Err(err) => self.fail(err),
        }
    }

    /// Add a resource
    #[must_use]
    pub fn resource(mut self, arn: Arn) -> Self {
        if !self.resources.contains(&arn) {
            self.resources.push(arn);
        }
        self
    }

    /// Add resources
    #[must_use]
    pub fn resources(self, arns: impl IntoIterator<Item = Arn>) -> Self {
        arns.into_iter().fold(self, Self::resource)
    }

    /// Add carve-out resources
    #[must_use]
    pub fn not_resources(mut self, arns: impl IntoIterator<Item = Arn>) -> Self {
        for arn in arns {
            if !self.not_resources.contains(&arn) {
                self.not_resources.push(arn);
            }
        }
        self
    }

    /// Replace the condition block
    #[must_use]
    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Record why a `*` resource is acceptable
    #[must_use]
    pub fn justification(mut self, reason: impl Into<String>) -> Self {
        self.justification = Some(reason.into());
        self
    }

    fn fail(mut self, err: ConstructionError) -> Self {
        self.error.get_or_insert(err);
        self
    }

    /// Validate and produce the statement
    pub fn build(self) -> Result<PolicyStatement> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let sid = self.sid;
        if sid.is_empty() || !sid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConstructionError::invalid(
                "sid",
                format!("'{sid}' must be non-empty and alphanumeric"),
            ));
        }
        if self.actions.is_empty() {
            return Err(ConfigurationError::EmptyActions { sid }.into());
        }

        let scope = match (self.resources.is_empty(), self.not_resources.is_empty()) {
            (true, true) => return Err(ConfigurationError::EmptyResourceScope { sid }.into()),
            (false, false) => {
                return Err(ConstructionError::invalid(
                    "scope",
                    format!("statement '{sid}' mixes resources and notResources"),
                ))
            }
            (false, true) => ResourceScope::Resources(self.resources),
            (true, false) => ResourceScope::NotResources(self.not_resources),
        };

        let statement = PolicyStatement {
            sid,
            effect: self.effect,
            principals: self.principals,
            actions: self.actions,
            scope,
            conditions: self.conditions,
            justification: None,
        };
        let justification = check_scope(&statement, self.justification.as_deref())?;
        Ok(PolicyStatement {
            justification,
            ..statement
        })
    }
}

/// Scope rules that only apply to `Allow` statements
fn check_scope(statement: &PolicyStatement, justification: Option<&str>) -> Result<Option<String>> {
    let sid = statement.sid();
    if statement.effect == Effect::Deny {
        return Ok(justification.map(str::to_string));
    }

    if statement.principals.iter().any(Principal::is_wildcard) {
        return Err(PolicyScopeViolation::WildcardPrincipal { sid: sid.to_string() }.into());
    }

    if statement.is_pass_role() {
        if !statement.conditions.has_key(PASSED_TO_SERVICE) {
            return Err(ConfigurationError::MissingCondition {
                sid: sid.to_string(),
                key: PASSED_TO_SERVICE.to_string(),
            }
            .into());
        }
        let unscoped = statement
            .conditions
            .entries(PASSED_TO_SERVICE)
            .flat_map(|(_, values)| values)
            .find(|value| matches_any_service(value));
        if let Some(value) = unscoped {
            return Err(PolicyScopeViolation::WildcardCondition {
                sid: sid.to_string(),
                key: PASSED_TO_SERVICE.to_string(),
                value: value.clone(),
            }
            .into());
        }
    }

    if statement.is_key_use() {
        let ResourceScope::Resources(arns) = &statement.scope else {
            return Err(PolicyScopeViolation::WildcardKeyResource {
                sid: sid.to_string(),
                resource: "notResources".to_string(),
            }
            .into());
        };
        if let Some(bad) = arns.iter().find(|arn| !is_concrete_key(arn)) {
            return Err(PolicyScopeViolation::WildcardKeyResource {
                sid: sid.to_string(),
                resource: bad.to_string(),
            }
            .into());
        }
    }

    if let ResourceScope::Resources(_) = &statement.scope {
        if let Some(action) = statement.actions.iter().find(|a| a.is_service_wide()) {
            return Err(PolicyScopeViolation::ServiceWideAction {
                sid: sid.to_string(),
                action: action.to_string(),
            }
            .into());
        }
    }

    if statement.resources().iter().any(Arn::is_any) {
        let writes: Vec<String> = statement
            .actions
            .iter()
            .filter(|a| !a.is_read_only())
            .map(ToString::to_string)
            .collect();
        if !writes.is_empty() {
            return Err(PolicyScopeViolation::WildcardResourceForWrite {
                sid: sid.to_string(),
                actions: writes,
            }
            .into());
        }
        let reason = require_justification(
            &format!("'*' resource in statement '{sid}'"),
            justification.unwrap_or_default(),
        )?;
        return Ok(Some(reason));
    }

    Ok(justification.map(str::to_string))
}

/// `*`, `*.amazonaws.com` and the like name every service principal
fn matches_any_service(value: &str) -> bool {
    let host = value.strip_suffix(".amazonaws.com").unwrap_or(value);
    host.chars().all(|c| c == '*' || c == '?')
}

fn is_concrete_key(arn: &Arn) -> bool {
    !arn.has_wildcard()
        && arn.service() == Some("kms")
        && arn
            .resource()
            .and_then(|r| r.strip_prefix("key/"))
            .is_some_and(|id| !id.is_empty())
}
