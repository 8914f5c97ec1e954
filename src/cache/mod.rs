//! Resource cache
//!
//! Cache-aside layer over binary remote resources (profile pictures, blog
//! banners) keyed by owner id. Each entry is either a revocable object URL
//! or an explicit "absent" marker; a key that was never queried has no
//! entry at all.

pub mod blob;
pub mod resource;

pub use blob::{Blob, BlobRegistry, ObjectUrl};
pub use resource::ResourceCache;

use crate::api::path_segment;

/// Kind of binary resource a cache holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `GET /users/{id}/profile-picture`
    ProfilePicture,
    /// `GET /blogs/{id}/banner`
    BlogBanner,
}

impl ResourceKind {
    /// Remote path of the resource owned by `owner_id`
    pub fn path(&self, owner_id: &str) -> String {
        let owner = path_segment(owner_id);
        match self {
            ResourceKind::ProfilePicture => format!("/users/{}/profile-picture", owner),
            ResourceKind::BlogBanner => format!("/blogs/{}/banner", owner),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::ProfilePicture => "profile picture",
            ResourceKind::BlogBanner => "blog banner",
        }
    }
}

/// Cached lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEntry {
    Present(ObjectUrl),
    Absent,
}

impl ResourceEntry {
    pub fn url(&self) -> Option<&ObjectUrl> {
        match self {
            ResourceEntry::Present(url) => Some(url),
            ResourceEntry::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ResourceEntry::Present(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_paths() {
        assert_eq!(
            ResourceKind::ProfilePicture.path("42"),
            "/users/42/profile-picture"
        );
        assert_eq!(ResourceKind::BlogBanner.path("7"), "/blogs/7/banner");
        assert_eq!(
            ResourceKind::ProfilePicture.path("a/b"),
            "/users/a%2Fb/profile-picture"
        );
    }

    #[test]
    fn test_entry_accessors() {
        assert_eq!(ResourceEntry::Absent.url(), None);
        assert!(!ResourceEntry::Absent.is_present());
    }
}
