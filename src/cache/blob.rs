//! Object URL registry
//!
//! Fetched binary payloads are handed out as opaque `blob:<uuid>` handles.
//! A handle stays resolvable until it is revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Revocable handle to a registered payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Process-wide table of live object URLs
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: RwLock<HashMap<ObjectUrl, Blob>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and return a fresh handle to it
    pub fn register(&self, bytes: Vec<u8>, content_type: impl Into<String>) -> ObjectUrl {
        let url = ObjectUrl(format!("blob:{}", uuid::Uuid::new_v4()));
        let blob = Blob {
            content_type: content_type.into(),
            bytes: Arc::new(bytes),
        };
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone(), blob);
        url
    }

    /// Look up a live handle
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
    }

    /// Release a handle. Returns false if it was already revoked.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self
            .blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(url)
            .is_some();
        if removed {
            tracing::trace!("Revoked {}", url);
        }
        removed
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_resolve_revoke() {
        let registry = BlobRegistry::new();
        let url = registry.register(vec![1, 2, 3], "image/png");

        assert!(url.as_str().starts_with("blob:"));
        let blob = registry.resolve(&url).unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.len(), 3);

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = BlobRegistry::new();
        let a = registry.register(vec![0], "image/png");
        let b = registry.register(vec![0], "image/png");

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }
}
