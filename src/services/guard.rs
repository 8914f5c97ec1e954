//! Navigation guard
//!
//! Decides whether a route may be entered given the resident session and,
//! for admin routes, the shared admin check.

use std::sync::Arc;

use super::session::SessionStore;

/// Who may enter a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Login and registration pages
    GuestOnly,
    Authenticated,
    Admin,
}

/// Guard outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    RedirectToLogin,
    RedirectToHome,
    /// Send the user back to the route they came from
    RedirectBack(String),
}

pub struct NavigationGuard {
    session: Arc<SessionStore>,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Decide a navigation from `from` to a route requiring `access`
    ///
    /// Admin routes wait for the shared admin check of the current session
    /// and decide on its result, so a guard racing a session restore observes
    /// the same answer as every other waiter. A check overtaken by an
    /// identity change resolves to `false`.
    pub async fn check(&self, access: Access, from: &str) -> Navigation {
        let logged_in = self.session.is_logged_in();
        match access {
            Access::Public => Navigation::Proceed,
            Access::GuestOnly if logged_in => Navigation::RedirectToHome,
            Access::GuestOnly => Navigation::Proceed,
            Access::Authenticated | Access::Admin if !logged_in => Navigation::RedirectToLogin,
            Access::Authenticated => Navigation::Proceed,
            Access::Admin => {
                if self.session.admin_check().await {
                    Navigation::Proceed
                } else if !from.is_empty() && from != "/" {
                    tracing::debug!("Admin route refused, returning to {}", from);
                    Navigation::RedirectBack(from.to_string())
                } else {
                    Navigation::RedirectToHome
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedBackend;
    use crate::api::Transport;
    use crate::models::Credentials;
    use crate::storage::MemoryStorage;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    async fn guard(logged_in: bool, admin: bool) -> (Arc<ScriptedBackend>, NavigationGuard) {
        let backend = ScriptedBackend::new();
        backend.respond_json(
            "POST",
            "/auth/login",
            StatusCode::OK,
            json!({"id": "1", "username": "a", "email": "a@x.com", "expiry": "2999-01-01"}),
        );
        backend.respond_after(
            "GET",
            "/roles/me/Admin",
            Duration::from_millis(20),
            crate::api::ApiResponse::json(StatusCode::OK, &json!(admin)),
        );
        let transport = Arc::new(Transport::new(backend.clone()));
        let session = Arc::new(SessionStore::new(transport, Arc::new(MemoryStorage::new())));
        if logged_in {
            session.login(Credentials::new("a", "p")).await.unwrap();
        }
        (backend, NavigationGuard::new(session))
    }

    #[tokio::test]
    async fn test_anonymous_routes() {
        let (_, guard) = guard(false, false).await;

        assert_eq!(guard.check(Access::Public, "/").await, Navigation::Proceed);
        assert_eq!(guard.check(Access::GuestOnly, "/").await, Navigation::Proceed);
        assert_eq!(
            guard.check(Access::Authenticated, "/").await,
            Navigation::RedirectToLogin
        );
        assert_eq!(guard.check(Access::Admin, "/").await, Navigation::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_logged_in_user_skips_login_page() {
        let (_, guard) = guard(true, false).await;

        assert_eq!(guard.check(Access::GuestOnly, "/").await, Navigation::RedirectToHome);
        assert_eq!(guard.check(Access::Authenticated, "/").await, Navigation::Proceed);
    }

    #[tokio::test]
    async fn test_admin_route_waits_for_shared_check() {
        let (backend, guard) = guard(true, true).await;

        let (a, b) = tokio::join!(
            guard.check(Access::Admin, "/"),
            guard.check(Access::Admin, "/blogs")
        );

        assert_eq!(a, Navigation::Proceed);
        assert_eq!(b, Navigation::Proceed);
        assert_eq!(backend.calls("GET", "/roles/me/Admin"), 1);
    }

    #[tokio::test]
    async fn test_non_admin_is_sent_back() {
        let (_, guard) = guard(true, false).await;

        assert_eq!(
            guard.check(Access::Admin, "/blogs/3").await,
            Navigation::RedirectBack("/blogs/3".to_string())
        );
        assert_eq!(guard.check(Access::Admin, "/").await, Navigation::RedirectToHome);
    }

    #[tokio::test]
    async fn test_admin_decision_ignores_flag_of_a_later_identity() {
        let backend = ScriptedBackend::new();
        for (id, name) in [("1", "a"), ("2", "b")] {
            backend.respond_json(
                "POST",
                "/auth/login",
                StatusCode::OK,
                json!({"id": id, "username": name, "email": "x@x.com", "expiry": "2999-01-01"}),
            );
        }
        backend.respond_after(
            "GET",
            "/roles/me/Admin",
            Duration::from_millis(50),
            crate::api::ApiResponse::json(StatusCode::OK, &json!(true)),
        );
        backend.respond_json("GET", "/roles/me/Admin", StatusCode::OK, json!(true));
        let transport = Arc::new(Transport::new(backend.clone()));
        let session = Arc::new(SessionStore::new(transport, Arc::new(MemoryStorage::new())));
        let guard = NavigationGuard::new(session.clone());
        session.login(Credentials::new("a", "p")).await.unwrap();

        let (decision, second_is_admin) = tokio::join!(guard.check(Access::Admin, "/blogs"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.login(Credentials::new("b", "p")).await.unwrap();
            session.admin_check().await
        });

        assert!(second_is_admin);
        assert!(session.is_admin());
        assert_eq!(decision, Navigation::RedirectBack("/blogs".to_string()));
    }
}
