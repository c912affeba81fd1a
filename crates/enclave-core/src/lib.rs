//! Enclave Core
//!
//! Shared vocabulary for the studio enclave crates:
//! - [`ArnContext`]: partition/account/region passed explicitly into ARN builders
//! - [`Arn`]: validated resource names
//! - [`IdentifierSource`]: seam for identifiers allocated by the provisioning engine
//! - [`ConstructionError`]: the three fatal construction-time error kinds
//! - [`RemovalPolicy`] and [`Tag`]: attributes fixed at construction time

#![warn(unreachable_pub)]

pub mod arn;
pub mod context;
pub mod error;
pub mod ids;
pub mod removal;

pub use arn::Arn;
pub use context::{AccountId, ArnContext};
pub use error::{
    ConfigurationError, ConstructionError, DependencyOrderError, ErrorKind, PolicyScopeViolation,
    Result,
};
pub use ids::{DerivedIdentifiers, IdentifierKind, IdentifierSource};
pub use removal::{RemovalPolicy, Tag};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reject blank audit strings
///
/// Returns the trimmed justification.
pub fn require_justification(context: &str, justification: &str) -> Result<String> {
    let trimmed = justification.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::EmptyJustification {
            context: context.to_string(),
        }
        .into());
    }
    Ok(trimmed.to_string())
}
