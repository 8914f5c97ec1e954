//! Transport layer
//!
//! Everything the rest of the crate needs to talk to the blog API:
//! - `client`: the [`Transport`] and its HTTP backends
//! - `cookies`: the persistable credential cookie jar
//! - `middleware`: the call chain (re-authentication, tracing)
//! - `responses`: request/response/error types

pub mod client;
pub mod cookies;
pub mod middleware;
pub mod responses;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{path_segment, HttpBackend, ReqwestBackend, Transport};
pub use cookies::CredentialJar;
pub use middleware::{
    CallContext, Middleware, Next, ReauthMiddleware, RequestStats, SessionRecovery,
    TracingMiddleware,
};
pub use responses::{ApiError, ApiRequest, ApiResponse, FilePart, RequestBody};
