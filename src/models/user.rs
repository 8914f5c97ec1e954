//! User and role models
//!
//! Shapes returned by the user and role administration endpoints.

use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// User as listed by the administration endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

impl Role {
    /// Role known only by name (the per-user roles endpoint returns bare names)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
        }
    }
}

/// Input for creating a role
#[derive(Debug, Clone, Serialize)]
pub struct CreateRoleInput {
    pub name: String,
}
