//! Data models
//!
//! This module contains the data structures exchanged with the blog API:
//! - Session identity and auth request/response shapes
//! - Users and roles
//! - Blogs and authors

mod blog;
mod session;
mod user;

pub use blog::{Author, Blog, BlogWithContent, CreateBlogInput, UpdateBlogInput};
pub use session::{
    parse_expiry, AuthUser, Credentials, Identity, RegistrationDetails, Session,
    DEFAULT_SESSION_LIFETIME_DAYS,
};
pub use user::{CreateRoleInput, Role, User};

use serde::{Deserialize, Deserializer};

/// Accept an id sent either as a JSON string or a JSON number
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Text(text) => Ok(text),
        RawId::Number(number) => Ok(number.to_string()),
    }
}
