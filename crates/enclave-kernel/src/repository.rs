//! Source repository collaborator
//!
//! Only the repository's identity and its initial content bundle are modelled;
//! version-control operations happen elsewhere.

use enclave_core::{Arn, ArnContext, ConstructionError, Result};
use serde::Serialize;

/// Default repository name
pub const REPOSITORY_NAME: &str = "sagemaker_gen_ai_repo";
/// Default repository description
pub const REPOSITORY_DESCRIPTION: &str =
    "Repository for SageMaker notebooks to run analytics for Security Lake.";
/// Default content bundle
pub const NOTEBOOK_BUNDLE: &str = "notebooks/notebooks.zip";

/// Archive used to seed the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBundle {
    /// Local archive path
    pub archive: String,
    /// Branch the archive is committed to
    pub branch: String,
}

/// A source repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRepository {
    name: String,
    description: String,
    arn: Arn,
    clone_url_http: String,
    code: ContentBundle,
}

impl SourceRepository {
    /// Repository seeded with `archive` on `main`
    pub fn new(
        ctx: &ArnContext,
        name: impl Into<String>,
        description: impl Into<String>,
        archive: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= 100
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
            && !name.ends_with(".git");
        if !valid {
            return Err(ConstructionError::invalid(
                "repository_name",
                format!("'{name}' is not a valid repository name"),
            ));
        }
        let archive = archive.into();
        if !archive.ends_with(".zip") {
            return Err(ConstructionError::invalid(
                "repository_code",
                format!("'{archive}' is not a zip archive"),
            ));
        }
        Ok(Self {
            arn: ctx.arn("codecommit", &name),
            clone_url_http: format!(
                "https://git-codecommit.{}.amazonaws.com/v1/repos/{name}",
                ctx.region()
            ),
            description: description.into(),
            code: ContentBundle {
                archive,
                branch: "main".to_string(),
            },
            name,
        })
    }

    /// The notebook repository
    pub fn notebooks(ctx: &ArnContext) -> Result<Self> {
        Self::new(ctx, REPOSITORY_NAME, REPOSITORY_DESCRIPTION, NOTEBOOK_BUNDLE)
    }

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

    /// HTTP clone URL
    #[inline]
    #[must_use]
    pub fn clone_url_http(&self) -> &str {
        &self.clone_url_http
    }

    /// Initial content
    #[inline]
    #[must_use]
    pub fn code(&self) -> &ContentBundle {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::AccountId;

    #[test]
    fn notebook_repository() {
        let ctx = ArnContext::new(AccountId::new("111111111111").unwrap(), "eu-west-1").unwrap();
        let repo = SourceRepository::notebooks(&ctx).unwrap();
        assert_eq!(
            repo.clone_url_http(),
            "https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/sagemaker_gen_ai_repo"
        );
        assert_eq!(
            repo.arn().as_str(),
            "arn:aws:codecommit:eu-west-1:111111111111:sagemaker_gen_ai_repo"
        );
        assert_eq!(repo.code().branch, "main");
    }

    #[test]
    fn invalid_names_rejected() {
        let ctx = ArnContext::new(AccountId::new("111111111111").unwrap(), "eu-west-1").unwrap();
        assert!(SourceRepository::new(&ctx, "", "d", "a.zip").is_err());
        assert!(SourceRepository::new(&ctx, "repo.git", "d", "a.zip").is_err());
        assert!(SourceRepository::new(&ctx, "has space", "d", "a.zip").is_err());
        assert!(SourceRepository::new(&ctx, "repo", "d", "a.tar").is_err());
    }
}
