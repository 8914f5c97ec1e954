//! Transport middleware
//!
//! Contains the ordered middleware chain evaluated around every call:
//! - [`ReauthMiddleware`]: one-shot transparent re-authentication on HTTP 401
//! - [`TracingMiddleware`]: request logging and lightweight statistics
//!
//! Call-scoped state (the retry marker) lives in [`CallContext`], never in the
//! request itself.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use super::client::HttpBackend;
use super::responses::{ApiError, ApiRequest, ApiResponse};

// ============================================================================
// Call context and chain
// ============================================================================

/// State scoped to one logical call (including its single resubmission)
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    retried: bool,
    reauth_disabled: bool,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for calls that must never trigger re-authentication
    /// (the auth endpoints themselves)
    pub fn without_reauth() -> Self {
        Self {
            retried: false,
            reauth_disabled: true,
        }
    }

    /// Whether the one-shot retry has been used
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Whether a 401 on this call may still trigger re-authentication
    pub fn allows_reauth(&self) -> bool {
        !self.retried && !self.reauth_disabled
    }
}

/// Middleware evaluated around each transport call
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        request: ApiRequest,
        ctx: &mut CallContext,
        next: Next<'_>,
    ) -> Result<ApiResponse, ApiError>;
}

/// The remainder of the chain; running it with an empty chain hits the backend
#[derive(Clone, Copy)]
pub struct Next<'a> {
    backend: &'a dyn HttpBackend,
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(backend: &'a dyn HttpBackend, chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { backend, chain }
    }

    /// Run the rest of the chain. Non-2xx responses become [`ApiError::Status`].
    pub async fn run(
        self,
        request: ApiRequest,
        ctx: &mut CallContext,
    ) -> Result<ApiResponse, ApiError> {
        match self.chain.split_first() {
            Some((first, rest)) => {
                first
                    .handle(request, ctx, Next::new(self.backend, rest))
                    .await
            }
            None => self.backend.execute(&request).await?.error_for_status(),
        }
    }
}

// ============================================================================
// Re-authentication
// ============================================================================

/// Session operations the re-authentication middleware calls back into
#[async_trait]
pub trait SessionRecovery: Send + Sync {
    /// Obtain a fresh session from the stored refresh credential
    async fn reauthenticate(&self) -> Result<(), ApiError>;

    /// Drop to the logged-out state
    async fn force_logout(&self);
}

/// One-shot re-authentication on HTTP 401
///
/// The session store is bound after construction because the store itself
/// issues its requests through the transport that owns this middleware.
#[derive(Default)]
pub struct ReauthMiddleware {
    recovery: OnceLock<Weak<dyn SessionRecovery>>,
}

impl ReauthMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the session store. Later binds are ignored.
    pub fn bind(&self, recovery: Weak<dyn SessionRecovery>) {
        if self.recovery.set(recovery).is_err() {
            tracing::warn!("Re-authentication target already bound, ignoring");
        }
    }

    fn recovery(&self) -> Option<Arc<dyn SessionRecovery>> {
        self.recovery.get().and_then(Weak::upgrade)
    }
}

#[async_trait]
impl Middleware for ReauthMiddleware {
    async fn handle(
        &self,
        request: ApiRequest,
        ctx: &mut CallContext,
        next: Next<'_>,
    ) -> Result<ApiResponse, ApiError> {
        let resubmission = ctx.allows_reauth().then(|| request.clone());

        let original_error = match next.run(request, ctx).await {
            Err(e) if e.is_unauthorized() && ctx.allows_reauth() => e,
            other => return other,
        };
        let Some(request) = resubmission else {
            return Err(original_error);
        };

        ctx.mark_retried();

        let Some(recovery) = self.recovery() else {
            tracing::warn!("No session bound for re-authentication");
            return Err(original_error);
        };

        if let Err(e) = recovery.reauthenticate().await {
            tracing::error!("Unable to refresh session, logging out: {}", e);
            recovery.force_logout().await;
            return Err(original_error);
        }

        tracing::debug!("Session refreshed, resubmitting {} {}", request.method, request.path);
        match next.run(request, ctx).await {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Still unauthorized after refresh, logging out");
                recovery.force_logout().await;
                Err(e)
            }
            other => other,
        }
    }
}

// ============================================================================
// Request statistics and logging
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    /// Total number of requests sent
    total_requests: AtomicU64,
    /// Requests answered with a non-2xx status or failed in transit
    failed_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64, failed: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if failed {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Get average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every request that reaches the wire and records its timing
pub struct TracingMiddleware {
    stats: Arc<RequestStats>,
}

impl TracingMiddleware {
    pub fn new(stats: Arc<RequestStats>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        request: ApiRequest,
        ctx: &mut CallContext,
        next: Next<'_>,
    ) -> Result<ApiResponse, ApiError> {
        let method = request.method.clone();
        let path = request.path.clone();
        let started = Instant::now();

        let result = next.run(request, ctx).await;

        let elapsed = started.elapsed();
        self.stats
            .record(elapsed.as_micros() as u64, result.is_err());
        match &result {
            Ok(response) => tracing::debug!(
                "{} {} -> {} in {:?}",
                method,
                path,
                response.status,
                elapsed
            ),
            Err(e) => tracing::debug!("{} {} failed in {:?}: {}", method, path, elapsed, e),
        }
        result
    }
}
