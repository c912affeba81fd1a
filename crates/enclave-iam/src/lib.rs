//! Enclave IAM
//!
//! Least-privilege identity for the workspace. Statements are validated when
//! they are built, documents are keyed by sid, and the composer adds the checks
//! that need the owning account.
//!
//! ```rust,ignore
//! use enclave_iam::prelude::*;
//!
//! let composer = PolicyComposer::new(&ctx);
//! let mut role = compose_execution_role(&composer, true)?;
//! let policy = attach_execution_policy(&composer, &mut role, &inputs)?;
//! ```

#![warn(unreachable_pub)]

pub mod action;
pub mod composer;
pub mod condition;
pub mod console_gate;
pub mod document;
pub mod execution;
pub mod principal;
pub mod role;
pub mod statement;

pub use action::{AccessLevel, Action};
pub use composer::PolicyComposer;
pub use condition::{
    ConditionOperator, Conditions, LOGS_ENCRYPTION_CONTEXT, PASSED_TO_SERVICE, SECURE_TRANSPORT,
    SOURCE_IP,
};
pub use console_gate::{compose_gate, gate_statements, GATE_POLICY_NAME, GATE_ROLE_NAME};
pub use document::{PolicyDocument, POLICY_VERSION};
pub use execution::{
    attach_execution_policy, compose_execution_role, execution_policy, ExecutionPolicyInputs,
    EXECUTION_POLICY_NAME, EXECUTION_ROLE_NAME,
};
pub use principal::Principal;
pub use role::{ManagedPolicy, Role};
pub use statement::{Effect, PolicyStatement, ResourceScope, StatementBuilder};

/// Common imports
pub mod prelude {
    pub use crate::{
        attach_execution_policy, compose_execution_role, compose_gate, Action, ConditionOperator,
        Conditions, ExecutionPolicyInputs, ManagedPolicy, PolicyComposer, PolicyDocument,
        PolicyStatement, Principal, Role, StatementBuilder,
    };
}
