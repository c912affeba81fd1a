//! ARN context
//!
//! Account, region and partition are never ambient: every ARN builder takes an
//! [`ArnContext`] explicitly, which keeps composition testable with fixed
//! fake values.

use crate::arn::Arn;
use crate::error::{ConstructionError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{12}$").expect("static regex"));
static REGION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]$").expect("static regex"));

/// Twelve-digit account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate an account id
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !ACCOUNT_RE.is_match(&value) {
            return Err(ConstructionError::invalid(
                "account",
                format!("'{value}' is not a 12-digit account id"),
            ));
        }
        Ok(Self(value))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = ConstructionError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// Partition, account and region used to render ARNs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArnContext {
    partition: String,
    account: AccountId,
    region: String,
}

impl ArnContext {
    /// Create a context in the `aws` partition
    pub fn new(account: AccountId, region: impl Into<String>) -> Result<Self> {
        Self::with_partition("aws", account, region)
    }

    /// Create a context in an explicit partition
    pub fn with_partition(
        partition: impl Into<String>,
        account: AccountId,
        region: impl Into<String>,
    ) -> Result<Self> {
        let partition = partition.into();
        let region = region.into();
        if partition.is_empty() {
            return Err(ConstructionError::invalid("partition", "must not be empty"));
        }
        if !REGION_RE.is_match(&region) {
            return Err(ConstructionError::invalid(
                "region",
                format!("'{region}' is not a region name"),
            ));
        }
        Ok(Self {
            partition,
            account,
            region,
        })
    }

    /// Partition name
    #[inline]
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Owning account
    #[inline]
    #[must_use]
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Region name
    #[inline]
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Same partition and region, different account
    #[must_use]
    pub fn for_account(&self, account: &AccountId) -> Self {
        Self {
            partition: self.partition.clone(),
            account: account.clone(),
            region: self.region.clone(),
        }
    }

    /// `arn:<partition>:<service>:<region>:<account>:<resource>`
    #[must_use]
    pub fn arn(&self, service: &str, resource: &str) -> Arn {
        Arn::from_parts(&self.partition, service, &self.region, self.account.as_str(), resource)
    }

    /// Regional ARN with no account (provider-owned resources)
    #[must_use]
    pub fn provider_arn(&self, service: &str, resource: &str) -> Arn {
        Arn::from_parts(&self.partition, service, &self.region, "", resource)
    }

    /// Global ARN with no region (identity resources)
    #[must_use]
    pub fn global_arn(&self, service: &str, resource: &str) -> Arn {
        Arn::from_parts(&self.partition, service, "", self.account.as_str(), resource)
    }

    /// ARN matching the resource in any region and account
    #[must_use]
    pub fn any_location_arn(&self, service: &str, resource: &str) -> Arn {
        Arn::from_parts(&self.partition, service, "*", "*", resource)
    }

    /// S3 ARNs carry neither region nor account
    #[must_use]
    pub fn s3_arn(&self, resource: &str) -> Arn {
        Arn::from_parts(&self.partition, "s3", "", "", resource)
    }

    /// Log group ARN
    #[must_use]
    pub fn log_group_arn(&self, log_group: &str) -> Arn {
        self.arn("logs", &format!("log-group:{log_group}"))
    }

    /// Regional service principal, for example `logs.us-east-1.amazonaws.com`
    #[must_use]
    pub fn regional_service_principal(&self, service: &str) -> String {
        format!("{service}.{}.amazonaws.com", self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ArnContext {
        ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
    }

    #[test]
    fn account_requires_twelve_digits() {
        assert!(AccountId::new("1234").is_err());
        assert!(AccountId::new("12345678901a").is_err());
        assert!(AccountId::new("222222222222").is_ok());
    }

    #[test]
    fn region_is_validated() {
        let account = AccountId::new("111111111111").unwrap();
        assert!(ArnContext::new(account.clone(), "not a region").is_err());
        assert!(ArnContext::new(account, "eu-central-1").is_ok());
    }

    #[test]
    fn renders_arns() {
        let ctx = ctx();
        assert_eq!(
            ctx.arn("glue", "catalog").as_str(),
            "arn:aws:glue:us-east-1:111111111111:catalog"
        );
        assert_eq!(
            ctx.global_arn("iam", "role/x").as_str(),
            "arn:aws:iam::111111111111:role/x"
        );
        assert_eq!(ctx.s3_arn("bucket").as_str(), "arn:aws:s3:::bucket");
        assert_eq!(
            ctx.log_group_arn("/aws/vpc/flowlogs").as_str(),
            "arn:aws:logs:us-east-1:111111111111:log-group:/aws/vpc/flowlogs"
        );
        assert_eq!(ctx.regional_service_principal("logs"), "logs.us-east-1.amazonaws.com");
    }

    #[test]
    fn for_account_keeps_region() {
        let other = ctx().for_account(&AccountId::new("222222222222").unwrap());
        assert_eq!(other.region(), "us-east-1");
        assert_eq!(other.account().as_str(), "222222222222");
    }
}
