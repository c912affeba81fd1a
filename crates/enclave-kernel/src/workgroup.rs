//! Analytics workgroup

use crate::storage::{BucketEncryption, StorageBucket};
use enclave_core::{Arn, ArnContext, ConstructionError, Result};
use serde::Serialize;
use tracing::info;

/// Default workgroup name
pub const WORKGROUP_NAME: &str = "security_lake_gen_ai";
/// Default workgroup description
pub const WORKGROUP_DESCRIPTION: &str = "Workgroup for Security Lake ML and Gen AI.";

/// Query result encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEncryption {
    /// Always `SSE_KMS`
    pub encryption_option: &'static str,
    /// Key protecting results
    pub kms_key: Arn,
}

/// Query workgroup with an enforced, encrypted output location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsWorkgroup {
    name: String,
    arn: Arn,
    description: String,
    state: &'static str,
    recursive_delete_option: bool,
    enforce_work_group_configuration: bool,
    publish_cloud_watch_metrics_enabled: bool,
    requester_pays_enabled: bool,
    output_location: String,
    encryption_configuration: ResultEncryption,
}

/// Create a workgroup writing to `bucket` under `key_arn`
///
/// The bucket must already be encrypted with that same key.
pub fn create_workgroup(
    ctx: &ArnContext,
    name: &str,
    bucket: &StorageBucket,
    key_arn: &Arn,
) -> Result<AnalyticsWorkgroup> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c));
    if !valid {
        return Err(ConstructionError::invalid(
            "workgroup_name",
            format!("'{name}' is not a valid workgroup name"),
        ));
    }
    match bucket.encryption() {
        BucketEncryption::Kms(arn) if arn == key_arn => {}
        other => {
            return Err(ConstructionError::invalid(
                "output_bucket",
                format!(
                    "bucket '{}' is encrypted with {other:?}, expected {key_arn}",
                    bucket.name()
                ),
            ))
        }
    }

    info!(workgroup = name, bucket = bucket.name(), "workgroup created");
    Ok(AnalyticsWorkgroup {
        name: name.to_string(),
        arn: ctx.arn("athena", &format!("workgroup/{name}")),
        description: WORKGROUP_DESCRIPTION.to_string(),
        state: "ENABLED",
        recursive_delete_option: true,
        enforce_work_group_configuration: true,
        publish_cloud_watch_metrics_enabled: false,
        requester_pays_enabled: false,
        output_location: bucket.s3_url(),
        encryption_configuration: ResultEncryption {
            encryption_option: "SSE_KMS",
            kms_key: key_arn.clone(),
        },
    })
}

impl AnalyticsWorkgroup {
    /// Name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// `s3://<bucket>/`
    #[inline]
    #[must_use]
    pub fn output_location(&self) -> &str {
        &self.output_location
    }

    /// Always true
    #[inline]
    #[must_use]
    pub fn enforces_configuration(&self) -> bool {
        self.enforce_work_group_configuration
    }

    /// Result encryption
    #[inline]
    #[must_use]
    pub fn encryption(&self) -> &ResultEncryption {
        &self.encryption_configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{create_bucket, BucketSpec};
    use enclave_core::AccountId;

    fn ctx() -> ArnContext {
        ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
    }

    fn bucket(ctx: &ArnContext, encryption: BucketEncryption) -> StorageBucket {
        create_bucket(
            ctx,
            BucketSpec::new("results-bucket", encryption).with_access_log("log-bucket", None),
        )
        .unwrap()
    }

    #[test]
    fn workgroup_binds_bucket_key() {
        let ctx = ctx();
        let key = ctx.arn("kms", "key/query");
        let wg = create_workgroup(&ctx, WORKGROUP_NAME, &bucket(&ctx, BucketEncryption::Kms(key.clone())), &key)
            .unwrap();
        assert!(wg.enforces_configuration());
        assert_eq!(wg.output_location(), "s3://results-bucket/");
        assert_eq!(wg.encryption().kms_key, key);
        assert_eq!(wg.encryption().encryption_option, "SSE_KMS");
        assert_eq!(
            wg.arn().as_str(),
            "arn:aws:athena:us-east-1:111111111111:workgroup/security_lake_gen_ai"
        );
    }

    #[test]
    fn mismatched_key_rejected() {
        let ctx = ctx();
        let key = ctx.arn("kms", "key/query");
        let other = ctx.arn("kms", "key/other");
        assert!(create_workgroup(&ctx, "wg", &bucket(&ctx, BucketEncryption::Kms(other)), &key).is_err());
        assert!(create_workgroup(&ctx, "wg", &bucket(&ctx, BucketEncryption::KmsManaged), &key).is_err());
    }
}
