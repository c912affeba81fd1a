//! Policy documents
//!
//! Statements are keyed by sid in insertion order. Re-adding an identical
//! statement is a no-op, so composing the same statement set twice never
//! accumulates duplicates; reusing a sid for different content is an error.

use crate::statement::PolicyStatement;
use enclave_core::{ConfigurationError, Result};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Policy language version emitted in every document
pub const POLICY_VERSION: &str = "2012-10-17";

/// An ordered, sid-keyed set of statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    statements: IndexMap<String, PolicyStatement>,
}

impl PolicyDocument {
    /// Empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document from statements
    pub fn from_statements(statements: impl IntoIterator<Item = PolicyStatement>) -> Result<Self> {
        let mut doc = Self::new();
        doc.extend(statements)?;
        Ok(doc)
    }

    /// Add a statement
    ///
    /// Returns `true` if the document changed.
    pub fn push(&mut self, statement: PolicyStatement) -> Result<bool> {
        match self.statements.get(statement.sid()) {
            Some(existing) if *existing == statement => Ok(false),
            Some(_) => Err(ConfigurationError::Duplicate {
                what: "statement sid",
                id: statement.sid().to_string(),
            }
            .into()),
            None => {
                self.statements.insert(statement.sid().to_string(), statement);
                Ok(true)
            }
        }
    }

    /// Add several statements
    pub fn extend(&mut self, statements: impl IntoIterator<Item = PolicyStatement>) -> Result<()> {
        for statement in statements {
            self.push(statement)?;
        }
        Ok(())
    }

    /// Statements in insertion order
    pub fn statements(&self) -> impl Iterator<Item = &PolicyStatement> + '_ {
        self.statements.values()
    }

    /// Statement ids in insertion order
    pub fn sids(&self) -> impl Iterator<Item = &str> + '_ {
        self.statements.keys().map(String::as_str)
    }

    /// Look up by sid
    #[must_use]
    pub fn get(&self, sid: &str) -> Option<&PolicyStatement> {
        self.statements.get(sid)
    }

    /// Number of statements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// No statements
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Audit justifications keyed by sid
    #[must_use]
    pub fn justifications(&self) -> BTreeMap<String, String> {
        self.statements
            .values()
            .filter_map(|s| s.justification().map(|j| (s.sid().to_string(), j.to_string())))
            .collect()
    }
}

impl Serialize for PolicyDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("Version", POLICY_VERSION)?;
        let statements: Vec<&PolicyStatement> = self.statements.values().collect();
        map.serialize_entry("Statement", &statements)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementBuilder;
    use enclave_core::{Arn, ErrorKind};

    fn statement(sid: &str, action: &str) -> PolicyStatement {
        StatementBuilder::allow(sid)
            .action_names(&[action])
            .resource(Arn::parse("arn:aws:s3:::bucket/*").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn identical_push_is_idempotent() {
        let mut doc = PolicyDocument::new();
        assert!(doc.push(statement("A", "s3:GetObject")).unwrap());
        assert!(!doc.push(statement("A", "s3:GetObject")).unwrap());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn conflicting_sid_rejected() {
        let mut doc = PolicyDocument::new();
        doc.push(statement("A", "s3:GetObject")).unwrap();
        let err = doc.push(statement("A", "s3:PutObject")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn keeps_insertion_order() {
        let doc = PolicyDocument::from_statements([
            statement("Zeta", "s3:GetObject"),
            statement("Alpha", "s3:PutObject"),
        ])
        .unwrap();
        assert_eq!(doc.sids().collect::<Vec<_>>(), ["Zeta", "Alpha"]);
    }

    #[test]
    fn serializes_version_and_statements() {
        let doc = PolicyDocument::from_statements([statement("A", "s3:GetObject")]).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["Version"], POLICY_VERSION);
        assert_eq!(json["Statement"].as_array().unwrap().len(), 1);
    }
}
