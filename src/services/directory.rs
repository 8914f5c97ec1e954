//! User and role directory
//!
//! Read access to the user administration endpoints and role management.

use std::sync::Arc;

use crate::api::{path_segment, ApiError, Transport};
use crate::models::{CreateRoleInput, Role, User};

/// Error types for directory operations
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Invalid input, rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Users known to the API
pub struct UserDirectory {
    transport: Arc<Transport>,
}

impl UserDirectory {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.transport.get_json("/users").await?)
    }

    pub async fn get(&self, id: &str) -> Result<User, DirectoryError> {
        Ok(self
            .transport
            .get_json(&format!("/users/{}", path_segment(id)))
            .await?)
    }

    /// Roles held by a user
    ///
    /// The endpoint answers with bare role names.
    pub async fn roles(&self, username: &str) -> Result<Vec<Role>, DirectoryError> {
        if username.trim().is_empty() {
            return Err(DirectoryError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        let names: Vec<String> = self
            .transport
            .get_json(&format!("/users/{}/roles", path_segment(username)))
            .await?;
        Ok(names.into_iter().map(Role::named).collect())
    }
}

/// Role management
pub struct RoleDirectory {
    transport: Arc<Transport>,
}

impl RoleDirectory {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Vec<Role>, DirectoryError> {
        Ok(self.transport.get_json("/roles").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Role, DirectoryError> {
        Ok(self
            .transport
            .get_json(&format!("/roles/{}", path_segment(id)))
            .await?)
    }

    pub async fn create(&self, name: &str) -> Result<Role, DirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::ValidationError(
                "Role name cannot be empty".to_string(),
            ));
        }
        let role: Role = self
            .transport
            .post_json(
                "/roles",
                &CreateRoleInput {
                    name: name.to_string(),
                },
            )
            .await?;
        tracing::info!("Created role {}", role.name);
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedBackend;
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_user_roles_are_bare_names() {
        let backend = ScriptedBackend::new();
        backend.respond_json(
            "GET",
            "/users/jane%20doe/roles",
            StatusCode::OK,
            json!(["Admin", "Author"]),
        );
        let users = UserDirectory::new(Arc::new(Transport::new(backend)));

        let roles = users.roles("jane doe").await.unwrap();

        assert_eq!(roles, vec![Role::named("Admin"), Role::named("Author")]);
    }

    #[tokio::test]
    async fn test_list_users() {
        let backend = ScriptedBackend::new();
        backend.respond_json(
            "GET",
            "/users",
            StatusCode::OK,
            json!([{"id": 1, "username": "a", "email": "a@x.com"}]),
        );
        let users = UserDirectory::new(Arc::new(Transport::new(backend)));

        let all = users.list().await.unwrap();

        assert_eq!(all[0].id, "1");
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_found() {
        let backend = ScriptedBackend::new();
        let users = UserDirectory::new(Arc::new(Transport::new(backend)));

        let err = users.get("404").await.unwrap_err();

        assert!(matches!(err, DirectoryError::Api(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_create_role() {
        let backend = ScriptedBackend::new();
        backend.respond_json(
            "POST",
            "/roles",
            StatusCode::CREATED,
            json!({"id": 3, "name": "Editor"}),
        );
        let roles = RoleDirectory::new(Arc::new(Transport::new(backend.clone())));

        let role = roles.create(" Editor ").await.unwrap();

        assert_eq!(role.id, "3");
        let request = backend.requests().pop().unwrap();
        assert_eq!(
            request.body,
            crate::api::RequestBody::Json(json!({"name": "Editor"}))
        );
    }

    #[tokio::test]
    async fn test_create_role_requires_name() {
        let backend = ScriptedBackend::new();
        let roles = RoleDirectory::new(Arc::new(Transport::new(backend.clone())));

        assert!(matches!(
            roles.create("  ").await,
            Err(DirectoryError::ValidationError(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }
}
