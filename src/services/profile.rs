//! Profile service
//!
//! Account changes for the logged-in user (email, password, picture) and
//! profile picture lookups through the avatar cache.

use serde::Serialize;
use std::sync::Arc;

use super::session::SessionStore;
use super::upload::{ImageUpload, IMAGE_FIELD};
use crate::api::{ApiError, ApiRequest, Transport};
use crate::cache::{ObjectUrl, ResourceCache};
use crate::config::UploadConfig;

const MY_PROFILE_PICTURE_PATH: &str = "/me/profile-picture";

/// Error types for profile operations
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Invalid input, rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The operation needs a resident session
    #[error("Not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Serialize)]
struct ChangeEmailRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    new_password: &'a str,
    password: &'a str,
}

/// Profile service
pub struct ProfileService {
    transport: Arc<Transport>,
    session: Arc<SessionStore>,
    avatars: Arc<ResourceCache>,
    upload: UploadConfig,
}

impl ProfileService {
    pub fn new(
        transport: Arc<Transport>,
        session: Arc<SessionStore>,
        avatars: Arc<ResourceCache>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            transport,
            session,
            avatars,
            upload,
        }
    }

    /// Change the account email, confirmed with the current password
    pub async fn change_email(&self, new_email: &str, password: &str) -> Result<(), ProfileError> {
        let new_email = new_email.trim();
        if new_email.is_empty() || !new_email.contains('@') {
            return Err(ProfileError::ValidationError("Invalid email format".to_string()));
        }
        require_password(password)?;
        self.require_session()?;

        self.transport
            .put(
                "/me/change/email",
                &ChangeEmailRequest {
                    email: new_email,
                    password,
                },
            )
            .await?;
        tracing::info!("Email changed");
        Ok(())
    }

    /// Change the account password, confirmed with the current password
    pub async fn change_password(
        &self,
        new_password: &str,
        password: &str,
    ) -> Result<(), ProfileError> {
        if new_password.is_empty() {
            return Err(ProfileError::ValidationError(
                "New password cannot be empty".to_string(),
            ));
        }
        require_password(password)?;
        self.require_session()?;

        self.transport
            .put(
                "/me/change/password",
                &ChangePasswordRequest {
                    new_password,
                    password,
                },
            )
            .await?;
        tracing::info!("Password changed");
        Ok(())
    }

    /// Replace the profile picture of the logged-in user
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the image type is not allowed, or the image is
    ///   empty or too large (no request is made)
    /// - `NotLoggedIn` without a resident session
    /// - `Api` if the upload fails
    ///
    /// On success the user's cached avatar is invalidated.
    pub async fn change_profile_picture(&self, image: ImageUpload) -> Result<(), ProfileError> {
        image
            .validate(&self.upload)
            .map_err(ProfileError::ValidationError)?;
        let user_id = self.require_session()?;

        let request =
            ApiRequest::put("/me/change/profile-picture").file(image.into_part(IMAGE_FIELD));
        self.transport.send(request).await?;

        self.avatars.invalidate(&user_id).await;
        tracing::info!("Profile picture changed for {}", user_id);
        Ok(())
    }

    /// Profile picture of any user, through the avatar cache
    pub async fn profile_picture(&self, user_id: &str) -> Option<ObjectUrl> {
        self.avatars.get_resource(user_id).await
    }

    /// Profile picture of the logged-in user
    ///
    /// Cached under the user's own id, so it shares an entry with
    /// [`profile_picture`](Self::profile_picture).
    pub async fn my_profile_picture(&self) -> Option<ObjectUrl> {
        let session = self.session.current()?;
        self.avatars
            .get_resource_at(&session.id, MY_PROFILE_PICTURE_PATH)
            .await
    }

    fn require_session(&self) -> Result<String, ProfileError> {
        self.session
            .current()
            .map(|s| s.id)
            .ok_or(ProfileError::NotLoggedIn)
    }
}

fn require_password(password: &str) -> Result<(), ProfileError> {
    if password.is_empty() {
        return Err(ProfileError::ValidationError(
            "Current password is required".to_string(),
        ));
    }
    Ok(())
}
