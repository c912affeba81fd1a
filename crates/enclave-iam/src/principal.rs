//! Principals named by trust policies and resource grants

use enclave_core::Arn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Who a statement applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// A service, for example `sagemaker.amazonaws.com`
    Service(String),
    /// A concrete role, user or account ARN
    Arn(Arn),
    /// Everyone; only meaningful in `Deny` statements
    Any,
}

impl Principal {
    /// Service principal
    pub fn service(name: impl Into<String>) -> Self {
        Self::Service(name.into())
    }

    /// ARN principal
    #[must_use]
    pub fn arn(arn: Arn) -> Self {
        Self::Arn(arn)
    }

    /// Whether this names everyone
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Arn(arn) => arn.is_any(),
            Self::Service(name) => name == "*" || name.is_empty(),
        }
    }

    /// Render principals as an IAM `Principal` block
    pub(crate) fn block(principals: &[Principal]) -> serde_json::Value {
        if principals.iter().any(|p| matches!(p, Self::Any)) {
            return serde_json::Value::String("*".to_string());
        }
        let mut block: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for principal in principals {
            match principal {
                Self::Service(name) => block.entry("Service").or_default().push(name.clone()),
                Self::Arn(arn) => block.entry("AWS").or_default().push(arn.to_string()),
                Self::Any => {}
            }
        }
        serde_json::json!(block)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => f.write_str(name),
            Self::Arn(arn) => write!(f, "{arn}"),
            Self::Any => f.write_str("*"),
        }
    }
}
