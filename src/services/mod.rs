//! Services layer
//!
//! This module contains the stateful client-side services:
//! - Session store and authorization cache
//! - Profile, blog, user and role services
//! - Navigation guard
//! - Upload validation

pub mod admin;
pub mod blog;
pub mod directory;
pub mod guard;
pub mod profile;
pub mod session;
pub mod upload;

pub use admin::{AdminCheck, AuthorizationCache, ADMIN_CHECK_PATH};
pub use blog::{BlogService, BlogServiceError};
pub use directory::{DirectoryError, RoleDirectory, UserDirectory};
pub use guard::{Access, Navigation, NavigationGuard};
pub use profile::{ProfileError, ProfileService};
pub use session::{remaining_seconds, SessionError, SessionStore};
pub use upload::ImageUpload;
