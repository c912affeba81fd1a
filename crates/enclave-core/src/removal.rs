//! Teardown policy and tags, fixed at construction time

use serde::{Deserialize, Serialize};

/// What the provisioning engine does with a resource on stack deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalPolicy {
    /// Delete the resource (keys enter their pending-deletion window)
    #[default]
    Destroy,
    /// Leave the resource in place
    Retain,
}

/// Resource tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The `project` tag carried by every workspace resource
    pub fn project(value: impl Into<String>) -> Self {
        Self::new("project", value)
    }
}
