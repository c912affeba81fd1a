//! Identifiers allocated by the provisioning engine
//!
//! The core never invents physical identifiers on its own: they flow in through
//! an [`IdentifierSource`]. [`DerivedIdentifiers`] derives stable values from
//! the logical id so that repeated synthesis yields the same document.

use sha2::{Digest, Sha256};

/// Kind of physical identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// Encryption key id (UUID form)
    Key,
    /// Private network id
    Vpc,
    /// Subnet id
    Subnet,
    /// Security group id
    SecurityGroup,
    /// Interface endpoint id
    Endpoint,
    /// NAT gateway id
    NatGateway,
    /// Workspace domain id
    Domain,
}

impl IdentifierKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Key => "",
            Self::Vpc => "vpc-",
            Self::Subnet => "subnet-",
            Self::SecurityGroup => "sg-",
            Self::Endpoint => "vpce-",
            Self::NatGateway => "nat-",
            Self::Domain => "d-",
        }
    }
}

/// Source of physical identifiers for logical resources
pub trait IdentifierSource {
    /// Identifier for `logical_id` of the given kind
    fn allocate(&self, kind: IdentifierKind, logical_id: &str) -> String;
}

/// Deterministic identifiers derived from SHA-256 of the logical id
#[derive(Debug, Clone, Default)]
pub struct DerivedIdentifiers {
    salt: String,
}

impl DerivedIdentifiers {
    /// Unsalted source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Salted source; different salts give disjoint identifier spaces
    #[must_use]
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    fn digest(&self, kind: IdentifierKind, logical_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update([0]);
        hasher.update(kind.prefix().as_bytes());
        hasher.update(logical_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl IdentifierSource for DerivedIdentifiers {
    fn allocate(&self, kind: IdentifierKind, logical_id: &str) -> String {
        let hex = self.digest(kind, logical_id);
        match kind {
            IdentifierKind::Key => format!(
                "{}-{}-{}-{}-{}",
                &hex[0..8],
                &hex[8..12],
                &hex[12..16],
                &hex[16..20],
                &hex[20..32]
            ),
            IdentifierKind::Domain => format!("{}{}", kind.prefix(), &hex[..12]),
            _ => format!("{}{}", kind.prefix(), &hex[..17]),
        }
    }
}
