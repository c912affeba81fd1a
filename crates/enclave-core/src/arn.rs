//! Resource names

use crate::error::{ConstructionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A resource name, or the bare `*` resource
///
/// Patterns such as `arn:aws:glue:us-east-1:111111111111:table/*` are valid
/// ARNs; only the bare `*` counts as [`Arn::is_any`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Arn(String);

impl Arn {
    /// The bare `*` resource
    #[must_use]
    pub fn any() -> Self {
        Self("*".to_string())
    }

    /// Parse and validate
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value == "*" {
            return Ok(Self(value));
        }
        let parts: Vec<&str> = value.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[1].is_empty() || parts[2].is_empty() {
            return Err(ConstructionError::invalid(
                "arn",
                format!("'{value}' is not of the form arn:partition:service:region:account:resource"),
            ));
        }
        if parts[5].is_empty() {
            return Err(ConstructionError::invalid("arn", format!("'{value}' names no resource")));
        }
        Ok(Self(value))
    }

    pub(crate) fn from_parts(
        partition: &str,
        service: &str,
        region: &str,
        account: &str,
        resource: &str,
    ) -> Self {
        Self(format!("arn:{partition}:{service}:{region}:{account}:{resource}"))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare `*`
    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.0 == "*"
    }

    /// Contains a `*` anywhere
    #[inline]
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.0.contains('*')
    }

    fn part(&self, index: usize) -> Option<&str> {
        if self.is_any() {
            return None;
        }
        self.0.splitn(6, ':').nth(index)
    }

    /// Service segment
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.part(2)
    }

    /// Region segment (empty for global resources)
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.part(3)
    }

    /// Account segment (empty for provider-owned resources)
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.part(4)
    }

    /// Resource segment
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.part(5)
    }

    /// Append a path suffix, for example `/*` for bucket objects
    #[must_use]
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Arn {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Arn {
    type Error = ConstructionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Arn> for String {
    fn from(value: Arn) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segments() {
        let arn = Arn::parse("arn:aws:logs:us-east-1:111111111111:log-group:/aws/sagemaker/studio:*").unwrap();
        assert_eq!(arn.service(), Some("logs"));
        assert_eq!(arn.region(), Some("us-east-1"));
        assert_eq!(arn.account(), Some("111111111111"));
        assert_eq!(arn.resource(), Some("log-group:/aws/sagemaker/studio:*"));
        assert!(arn.has_wildcard());
        assert!(!arn.is_any());
    }

    #[test]
    fn bare_star_is_any() {
        let any = Arn::parse("*").unwrap();
        assert!(any.is_any());
        assert_eq!(any.account(), None);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Arn::parse("bucket-name").is_err());
        assert!(Arn::parse("arn:aws:s3:::").is_err());
        assert!(Arn::parse("arn::s3:::b").is_err());
    }

    #[test]
    fn child_appends_suffix() {
        let bucket = Arn::parse("arn:aws:s3:::results").unwrap();
        assert_eq!(bucket.child("/*").as_str(), "arn:aws:s3:::results/*");
    }
}
