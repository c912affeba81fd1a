//! Operator configuration
//!
//! Loaded from TOML. Everything except the account has a default.
//!
//! ```toml
//! account = "111111111111"
//! region = "us-east-1"
//!
//! [parameters]
//! console_cidr = "203.0.113.0/24"
//! console_assume_principal = "arn:aws:iam::111111111111:role/Admin"
//! ```

use crate::domain::{DOMAIN_PREFIX, PROJECT_TAG};
use crate::keys::DEFAULT_PENDING_WINDOW_DAYS;
use crate::workgroup::WORKGROUP_NAME;
use enclave_core::{AccountId, Arn, ArnContext, ConstructionError, RemovalPolicy};
use enclave_network::{Ipv4Cidr, NetworkConfig, DEFAULT_FLOW_LOG_GROUP};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Required operator parameter absent
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// Value rejected by construction rules
    #[error(transparent)]
    Invalid(#[from] ConstructionError),
}

/// Parameters supplied by the operator at deploy time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorParameters {
    /// Source block allowed to request presigned URLs
    pub console_cidr: Option<Ipv4Cidr>,
    /// Principal allowed to assume the console role
    pub console_assume_principal: Option<String>,
    /// Account hosting a shared data catalog
    pub shared_catalog_account: Option<String>,
}

/// Parameters after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameters {
    /// Defaults to `0.0.0.0/0`
    pub console_cidr: Ipv4Cidr,
    /// Concrete principal ARN
    pub console_assume_principal: Arn,
    /// 12-digit account
    pub shared_catalog_account: Option<AccountId>,
}

impl OperatorParameters {
    /// Validate and fill defaults
    pub fn resolve(&self) -> Result<ResolvedParameters, ConfigError> {
        let console_cidr = self.console_cidr.unwrap_or_else(|| {
            warn!("console_cidr not set; presigned URLs can be requested from any address");
            Ipv4Cidr::any()
        });

        let principal = self
            .console_assume_principal
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingParameter("console_assume_principal"))?;
        let console_assume_principal = Arn::parse(principal)?;
        if console_assume_principal.has_wildcard() {
            return Err(ConstructionError::invalid(
                "console_assume_principal",
                format!("'{principal}' must be a concrete principal"),
            )
            .into());
        }

        let shared_catalog_account = self
            .shared_catalog_account
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(AccountId::new)
            .transpose()?;

        Ok(ResolvedParameters {
            console_cidr,
            console_assume_principal,
            shared_catalog_account,
        })
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_partition() -> String {
    "aws".to_string()
}

fn default_project_tag() -> String {
    PROJECT_TAG.to_string()
}

fn default_domain_prefix() -> String {
    DOMAIN_PREFIX.to_string()
}

fn default_pending_window() -> u32 {
    DEFAULT_PENDING_WINDOW_DAYS
}

fn default_flow_log_group() -> String {
    DEFAULT_FLOW_LOG_GROUP.to_string()
}

fn default_workgroup() -> String {
    WORKGROUP_NAME.to_string()
}

fn default_true() -> bool {
    true
}

/// Workspace configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnclaveConfig {
    /// Deployment account
    pub account: String,
    /// Deployment region
    #[serde(default = "default_region")]
    pub region: String,
    /// ARN partition
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Value of the `project` tag
    #[serde(default = "default_project_tag")]
    pub project_tag: String,
    /// Domain name prefix; the account id is appended
    #[serde(default = "default_domain_prefix")]
    pub domain_prefix: String,
    /// Network layout
    #[serde(default)]
    pub network: NetworkConfig,
    /// Key pending-deletion window in days
    #[serde(default = "default_pending_window")]
    pub key_pending_window_days: u32,
    /// Flow log group name
    #[serde(default = "default_flow_log_group")]
    pub flow_log_group: String,
    /// Grant foundation-model access to the execution role
    #[serde(default = "default_true")]
    pub generative_ai: bool,
    /// Query workgroup name
    #[serde(default = "default_workgroup")]
    pub workgroup: String,
    /// Removal policy for data-bearing resources
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    /// Operator parameters
    #[serde(default)]
    pub parameters: OperatorParameters,
}

impl EnclaveConfig {
    /// Defaults for `account`
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: default_region(),
            partition: default_partition(),
            project_tag: default_project_tag(),
            domain_prefix: default_domain_prefix(),
            network: NetworkConfig::default(),
            key_pending_window_days: default_pending_window(),
            flow_log_group: default_flow_log_group(),
            generative_ai: true,
            workgroup: default_workgroup(),
            removal_policy: RemovalPolicy::default(),
            parameters: OperatorParameters::default(),
        }
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Self::from_toml(&text)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Account and region context
    pub fn context(&self) -> Result<ArnContext, ConfigError> {
        let account = AccountId::new(self.account.as_str())?;
        Ok(ArnContext::with_partition(
            self.partition.as_str(),
            account,
            self.region.as_str(),
        )?)
    }

    /// Set the region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the network layout
    #[inline]
    #[must_use]
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Toggle foundation-model access
    #[inline]
    #[must_use]
    pub fn with_generative_ai(mut self, enabled: bool) -> Self {
        self.generative_ai = enabled;
        self
    }

    /// Set the key pending window
    #[inline]
    #[must_use]
    pub fn with_key_pending_window(mut self, days: u32) -> Self {
        self.key_pending_window_days = days;
        self
    }

    /// Set the operator parameters
    #[inline]
    #[must_use]
    pub fn with_parameters(mut self, parameters: OperatorParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = EnclaveConfig::from_toml(r#"account = "111111111111""#).unwrap();
        assert_eq!(config, EnclaveConfig::new("111111111111"));
        assert_eq!(config.region, "us-east-1");
        assert!(config.generative_ai);
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = EnclaveConfig::from_toml("account = \"111111111111\"\nacount = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_account_is_invalid() {
        let config = EnclaveConfig::new("12345");
        assert!(matches!(config.context(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn assume_principal_is_required() {
        let err = OperatorParameters::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("console_assume_principal")));
    }

    #[test]
    fn console_cidr_defaults_to_any() {
        let params = OperatorParameters {
            console_assume_principal: Some("arn:aws:iam::111111111111:role/Admin".into()),
            ..OperatorParameters::default()
        };
        let resolved = params.resolve().unwrap();
        assert!(resolved.console_cidr.is_any());
        assert!(resolved.shared_catalog_account.is_none());
    }

    #[test]
    fn shared_account_must_be_twelve_digits() {
        let params = OperatorParameters {
            console_assume_principal: Some("arn:aws:iam::111111111111:role/Admin".into()),
            shared_catalog_account: Some("2222".into()),
            ..OperatorParameters::default()
        };
        assert!(matches!(params.resolve(), Err(ConfigError::Invalid(_))));
    }
}
