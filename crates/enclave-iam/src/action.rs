//! Actions and access levels

use enclave_core::{ConstructionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name prefixes of actions that only read or discover
const READ_PREFIXES: &[&str] = &[
    "Get",
    "List",
    "Describe",
    "BatchGet",
    "BatchDescribe",
    "Search",
    "View",
    "GitPull",
];

/// Access level of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    /// Read or discovery only
    Read,
    /// Anything that creates, mutates, deletes or invokes
    Write,
}

/// A `service:Name` action, possibly containing `*` globs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    /// Parse and validate
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let Some((service, name)) = value.split_once(':') else {
            return Err(ConstructionError::invalid(
                "action",
                format!("'{value}' is not of the form service:Name"),
            ));
        };
        let service_ok = !service.is_empty()
            && service.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let name_ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '*');
        if !service_ok || !name_ok {
            return Err(ConstructionError::invalid(
                "action",
                format!("'{value}' is not of the form service:Name"),
            ));
        }
        Ok(Self(value))
    }

    /// Parse a list of actions
    pub fn list(values: &[&str]) -> Result<Vec<Self>> {
        values.iter().map(|v| Self::parse(*v)).collect()
    }

    /// `iam:PassRole`
    pub(crate) fn pass_role() -> Self {
        Self("iam:PassRole".to_string())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Service prefix, for example `kms`
    #[must_use]
    pub fn service(&self) -> &str {
        self.0.split_once(':').map_or("", |(s, _)| s)
    }

    /// Action name, for example `Decrypt`
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, n)| n)
    }

    /// `service:*`
    #[inline]
    #[must_use]
    pub fn is_service_wide(&self) -> bool {
        self.name() == "*"
    }

    /// Access level inferred from the action name
    #[must_use]
    pub fn access_level(&self) -> AccessLevel {
        let name = self.name();
        if READ_PREFIXES.iter().any(|p| name.starts_with(p)) {
            AccessLevel::Read
        } else {
            AccessLevel::Write
        }
    }

    /// Read or discovery only
    #[inline]
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.access_level() == AccessLevel::Read
    }

    /// Whether this action (as a pattern) covers `other`
    ///
    /// A `*` in `other` is matched literally, so `kms:Encrypt*` covers
    /// `kms:Encrypt` and `kms:Encrypt*` but not `kms:*`.
    #[must_use]
    pub fn covers(&self, other: &Action) -> bool {
        glob_match(
            &self.0.to_ascii_lowercase(),
            &other.0.to_ascii_lowercase(),
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Action {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Action {
    type Error = ConstructionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.0
    }
}

/// `*`-only glob match
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let source = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
    Regex::new(&source).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> Action {
        Action::parse(s).unwrap()
    }

    #[test]
    fn parse_splits_service_and_name() {
        let action = a("kms:GenerateDataKey*");
        assert_eq!(action.service(), "kms");
        assert_eq!(action.name(), "GenerateDataKey*");
        assert!(Action::parse("kms").is_err());
        assert!(Action::parse("kms:").is_err());
        assert!(Action::parse("KMS:Decrypt").is_err());
    }

    #[test]
    fn read_prefixes_classify() {
        assert!(a("glue:GetTables").is_read_only());
        assert!(a("athena:List*").is_read_only());
        assert!(a("codecommit:GitPull").is_read_only());
        assert!(!a("codecommit:GitPush").is_read_only());
        assert!(!a("glue:CreateDatabase").is_read_only());
        assert!(!a("sagemaker:*").is_read_only());
    }

    #[test]
    fn covers_is_glob_aware() {
        assert!(a("kms:Encrypt*").covers(&a("kms:Encrypt")));
        assert!(a("kms:Encrypt*").covers(&a("kms:Encrypt*")));
        assert!(!a("kms:Encrypt*").covers(&a("kms:*")));
        assert!(a("kms:Describe*").covers(&a("kms:DescribeKey")));
        assert!(a("sagemaker:*App").covers(&a("sagemaker:DeleteApp")));
        assert!(!a("sagemaker:*App").covers(&a("sagemaker:ListApps")));
        assert!(a("iam:*").covers(&a("iam:PassRole")));
    }

    #[test]
    fn glob_backtracks_across_stars() {
        assert!(glob_match("*Data*Key*", "GenerateDataKeyWithoutPlaintext"));
        assert!(glob_match("a*b*c", "aXbYbZc"));
        assert!(!glob_match("a*b*c", "aXbYbZ"));
        assert!(glob_match("Get.*", "Get.Object"));
        assert!(!glob_match("Get.*", "GetXObject"));
    }

    #[test]
    fn service_wide() {
        assert!(a("sagemaker:*").is_service_wide());
        assert!(!a("sagemaker:*App").is_service_wide());
    }
}
