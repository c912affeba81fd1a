//! Statement conditions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition key naming the service a role may be passed to
pub const PASSED_TO_SERVICE: &str = "iam:PassedToService";
/// Condition key naming the caller's network origin
pub const SOURCE_IP: &str = "aws:SourceIp";
/// Condition key tying a key operation to a log group
pub const LOGS_ENCRYPTION_CONTEXT: &str = "kms:EncryptionContext:aws:logs:arn";
/// Condition key for TLS transport
pub const SECURE_TRANSPORT: &str = "aws:SecureTransport";

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Exact string match
    StringEquals,
    /// Exact match when the key is present
    StringEqualsIfExists,
    /// Glob string match
    StringLike,
    /// Exact ARN match
    ArnEquals,
    /// Source address within CIDR
    IpAddress,
    /// Boolean match
    Bool,
}

/// Operator → key → values
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<ConditionOperator, BTreeMap<String, Vec<String>>>);

impl Conditions {
    /// Empty condition block
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values under `operator`/`key`
    #[must_use]
    pub fn with<I, S>(mut self, operator: ConditionOperator, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .0
            .entry(operator)
            .or_default()
            .entry(key.to_string())
            .or_default();
        for value in values {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
        self
    }

    /// No conditions at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values for `key` under any operator, if present and non-empty
    #[must_use]
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.0
            .values()
            .filter_map(|keys| keys.get(key))
            .find(|values| !values.is_empty())
            .map(Vec::as_slice)
    }

    /// Values stored under exactly `operator`/`key`, if non-empty
    #[must_use]
    pub fn get(&self, operator: ConditionOperator, key: &str) -> Option<&[String]> {
        self.0
            .get(&operator)
            .and_then(|keys| keys.get(key))
            .filter(|values| !values.is_empty())
            .map(Vec::as_slice)
    }

    /// Every non-empty value list for `key`, with its operator
    pub fn entries<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = (ConditionOperator, &'a [String])> + 'a {
        self.0.iter().filter_map(move |(op, keys)| {
            keys.get(key)
                .filter(|values| !values.is_empty())
                .map(|values| (*op, values.as_slice()))
        })
    }

    /// Whether `key` is constrained to at least one value
    #[inline]
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.values(key).is_some()
    }

    /// All (operator, key) pairs
    pub fn keys(&self) -> impl Iterator<Item = (ConditionOperator, &str)> + '_ {
        self.0
            .iter()
            .flat_map(|(op, keys)| keys.keys().map(move |k| (*op, k.as_str())))
    }
}
