//! Enclave Kernel
//!
//! Assembles an isolated notebook workspace as a validated resource graph.
//!
//! Components, leaf to root:
//! - [`keys`]: single-purpose encryption keys and their grants
//! - [`storage`]: locked-down buckets and the access-log sink
//! - [`repository`]: the notebook source repository
//! - [`workgroup`]: the encrypted query workgroup
//! - [`domain`]: domain, user profile and application lifecycle
//! - [`graph`]: ordering, validation, digest and the emitted document
//! - [`blueprint`]: wires all of the above in dependency order
//!
//! ```rust,ignore
//! use enclave_kernel::prelude::*;
//!
//! let config = EnclaveConfig::load("enclave.toml")?;
//! let synthesis = synthesize(&config, &DerivedIdentifiers::new())?;
//! println!("{}", synthesis.graph.to_document().to_json()?);
//! ```

#![warn(unreachable_pub)]

pub mod blueprint;
pub mod config;
pub mod domain;
pub mod graph;
pub mod keys;
pub mod repository;
pub mod storage;
pub mod telemetry;
pub mod workgroup;

pub use blueprint::{synthesize, Synthesis, DOMAIN_ID_OUTPUT, REPOSITORY_URL_OUTPUT};
pub use config::{ConfigError, EnclaveConfig, OperatorParameters, ResolvedParameters};
pub use domain::{
    Application, DomainPrerequisites, DomainSettings, DomainSpec, DomainState, UserProfile,
    WorkspaceDomain,
};
pub use graph::{GraphBuilder, GraphDocument, ResourceGraph, ResourceKind};
pub use keys::{EncryptionKey, KeyPurpose, KeyRegistry};
pub use repository::SourceRepository;
pub use storage::{create_access_log_bucket, create_bucket, BucketEncryption, BucketSpec, StorageBucket};
pub use workgroup::{create_workgroup, AnalyticsWorkgroup};

/// Kernel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{
        synthesize, EnclaveConfig, GraphBuilder, GraphDocument, ResourceGraph, ResourceKind,
        Synthesis,
    };
    pub use enclave_core::{DerivedIdentifiers, IdentifierSource};
}
