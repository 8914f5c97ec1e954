//! Application wiring
//!
//! Builds every component from one [`Config`]: the transport with its
//! middleware chain, the session store bound as re-authentication target,
//! the resource caches and the services on top.

use anyhow::Result;
use std::sync::Arc;

use crate::api::{HttpBackend, ReauthMiddleware, ReqwestBackend, RequestStats, TracingMiddleware, Transport};
use crate::cache::{BlobRegistry, ResourceCache, ResourceKind};
use crate::config::Config;
use crate::models::Session;
use crate::services::{
    BlogService, NavigationGuard, ProfileService, RoleDirectory, SessionStore, UserDirectory,
};
use crate::storage::{create_storage, KeyValueStore};

/// Fully wired client core
pub struct App {
    pub config: Config,
    pub transport: Arc<Transport>,
    pub session: Arc<SessionStore>,
    pub blobs: Arc<BlobRegistry>,
    pub avatars: Arc<ResourceCache>,
    pub banners: Arc<ResourceCache>,
    pub profile: ProfileService,
    pub blogs: BlogService,
    pub users: UserDirectory,
    pub roles: RoleDirectory,
    pub guard: NavigationGuard,
    pub request_stats: Arc<RequestStats>,
}

impl App {
    /// Wire the core against the configured API and storage
    pub fn new(config: Config) -> Result<Self> {
        let backend = ReqwestBackend::boxed(&config.api)?;
        let storage = create_storage(&config.storage);
        tracing::debug!(
            "Using API at {} with {:?} session storage",
            config.api.base_url,
            config.storage.driver
        );
        Ok(Self::with_parts(config, backend, storage))
    }

    /// Wire the core over an explicit backend and storage
    pub fn with_parts(
        config: Config,
        backend: Arc<dyn HttpBackend>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let request_stats = Arc::new(RequestStats::new());
        let reauth = Arc::new(ReauthMiddleware::new());
        let transport = Arc::new(
            Transport::new(backend)
                .with_middleware(reauth.clone())
                .with_middleware(Arc::new(TracingMiddleware::new(request_stats.clone()))),
        );

        let session = Arc::new(SessionStore::new(transport.clone(), storage));
        session.attach(&reauth);

        let blobs = Arc::new(BlobRegistry::new());
        let capacity = config.cache.max_capacity;
        let avatars = Arc::new(ResourceCache::new(
            ResourceKind::ProfilePicture,
            transport.clone(),
            blobs.clone(),
            capacity,
        ));
        let banners = Arc::new(ResourceCache::new(
            ResourceKind::BlogBanner,
            transport.clone(),
            blobs.clone(),
            capacity,
        ));

        let profile = ProfileService::new(
            transport.clone(),
            session.clone(),
            avatars.clone(),
            config.upload.clone(),
        );
        let blogs = BlogService::new(transport.clone(), banners.clone(), config.upload.clone());
        let users = UserDirectory::new(transport.clone());
        let roles = RoleDirectory::new(transport.clone());
        let guard = NavigationGuard::new(session.clone());

        Self {
            config,
            transport,
            session,
            blobs,
            avatars,
            banners,
            profile,
            blogs,
            users,
            roles,
            guard,
            request_stats,
        }
    }

    /// Adopt the persisted session, if it is still valid
    pub async fn start(&self) -> Option<Session> {
        let restored = self.session.restore().await;
        match &restored {
            Some(session) => tracing::info!("Resumed session for {}", session.username),
            None => tracing::debug!("Starting anonymous"),
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedBackend;
    use crate::api::ApiResponse;
    use crate::models::Credentials;
    use crate::storage::MemoryStorage;
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_expired_call_recovers_through_wired_session() {
        let backend = ScriptedBackend::new();
        backend.respond_json(
            "POST",
            "/auth/login",
            StatusCode::OK,
            json!({"id": "1", "username": "a", "email": "a@x.com", "expiry": "2999-01-01"}),
        );
        backend.respond_json("GET", "/roles/me/Admin", StatusCode::OK, json!(true));
        backend.respond("GET", "/users", ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new()));
        backend.respond_json("GET", "/users", StatusCode::OK, json!([]));
        backend.respond("POST", "/auth/refresh", ApiResponse::new(StatusCode::OK, Vec::new()));

        let app = App::with_parts(
            Config::default(),
            backend.clone(),
            Arc::new(MemoryStorage::new()),
        );
        app.session.login(Credentials::new("a", "p")).await.unwrap();

        let users = app.users.list().await.unwrap();

        assert!(users.is_empty());
        assert!(app.session.is_logged_in());
        assert_eq!(backend.calls("POST", "/auth/refresh"), 1);
        assert!(app.request_stats.total_requests() >= 4);
    }

    #[tokio::test]
    async fn test_start_restores_persisted_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set("user", r#"{"id":"1","username":"a","email":"a@x.com"}"#)
            .await
            .unwrap();
        storage.set("expiration", "2999-01-01T00:00:00Z").await.unwrap();
        let backend = ScriptedBackend::new();
        backend.respond_json("GET", "/roles/me/Admin", StatusCode::OK, json!(true));

        let app = App::with_parts(Config::default(), backend, storage);
        let session = app.start().await.unwrap();

        assert_eq!(session.username, "a");
        assert!(app.session.admin_check().await);
    }
}
