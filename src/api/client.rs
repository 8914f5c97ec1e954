//! HTTP transport
//!
//! [`Transport`] is the single client every component talks to the blog API
//! through. It keeps session cookies in the backend's [`CredentialJar`], runs
//! the middleware chain around each call and exposes verb helpers plus typed
//! JSON helpers.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::cookies::CredentialJar;
use super::middleware::{CallContext, Middleware, Next};
use super::responses::{ApiError, ApiRequest, ApiResponse, RequestBody};
use crate::config::ApiConfig;

/// Executes one request on the wire and returns the raw response, whatever
/// its status
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Snapshot of the credential cookies; `None` if the backend keeps none
    fn credentials(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Replace the credential cookies with a snapshot
    fn load_credentials(&self, _snapshot: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn clear_credentials(&self) {}
}

/// reqwest-based backend with a cookie jar (credentials on every request)
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: String,
    jar: Arc<CredentialJar>,
}

impl ReqwestBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let jar = Arc::new(CredentialJar::new());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            jar,
        })
    }

    /// Boxed backend for dependency injection
    pub fn boxed(config: &ApiConfig) -> Result<Arc<dyn HttpBackend>, ApiError> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));

        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Json(value) => builder = builder.json(value),
            RequestBody::Multipart(part) => {
                let file = reqwest::multipart::Part::bytes(part.bytes.clone())
                    .file_name(part.file_name.clone())
                    .mime_str(&part.content_type)
                    .map_err(|e| {
                        ApiError::InvalidRequest(format!(
                            "Invalid content type '{}': {}",
                            part.content_type, e
                        ))
                    })?;
                let form = reqwest::multipart::Form::new().part(part.field.clone(), file);
                builder = builder.multipart(form);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {}", e)))?;

        Ok(ApiResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }

    fn credentials(&self) -> anyhow::Result<Option<String>> {
        if self.jar.is_empty() {
            return Ok(None);
        }
        self.jar.to_json().map(Some)
    }

    fn load_credentials(&self, snapshot: &str) -> anyhow::Result<()> {
        self.jar.load_json(snapshot)
    }

    fn clear_credentials(&self) {
        self.jar.clear();
    }
}

/// Verb-based client with an ordered middleware chain
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Transport {
    pub fn new(backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            backend,
            middleware: Vec::new(),
        }
    }

    /// Append a middleware; the first one added is the outermost
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Send with a fresh call context
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send_with(request, CallContext::new()).await
    }

    /// Send with an explicit call context
    pub async fn send_with(
        &self,
        request: ApiRequest,
        mut ctx: CallContext,
    ) -> Result<ApiResponse, ApiError> {
        Next::new(self.backend.as_ref(), &self.middleware)
            .run(request, &mut ctx)
            .await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Snapshot of the credential cookies, for persistence
    pub fn credentials(&self) -> anyhow::Result<Option<String>> {
        self.backend.credentials()
    }

    /// Adopt persisted credential cookies
    pub fn load_credentials(&self, snapshot: &str) -> anyhow::Result<()> {
        self.backend.load_credentials(snapshot)
    }

    pub fn clear_credentials(&self) {
        self.backend.clear_credentials();
    }

    /// GET and decode the body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path).await?.decode()
    }

    /// POST a JSON body and decode the response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, body).await?.decode()
    }

    /// PUT a JSON body and decode the response
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put(path, body).await?.decode()
    }
}

/// Percent-encode one path segment (owner ids, usernames)
pub fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedBackend;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_success_passes_through_unchanged() {
        let backend = ScriptedBackend::new();
        backend.respond("GET", "/blogs", ApiResponse::new(StatusCode::OK, "[]"));
        let transport = Transport::new(backend.clone());

        let response = transport.get("/blogs").await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "[]");
        assert_eq!(backend.calls("GET", "/blogs"), 1);
    }

    #[tokio::test]
    async fn test_non_success_becomes_status_error() {
        let backend = ScriptedBackend::new();
        backend.respond(
            "DELETE",
            "/blogs/1",
            ApiResponse::new(StatusCode::FORBIDDEN, "nope"),
        );
        let transport = Transport::new(backend.clone());

        let err = transport.delete("/blogs/1").await.unwrap_err();

        assert_eq!(err.status_code(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_get_json_validates_shape() {
        let backend = ScriptedBackend::new();
        backend.respond(
            "GET",
            "/roles/me/Admin",
            ApiResponse::new(StatusCode::OK, r#"{"admin": true}"#),
        );
        let transport = Transport::new(backend);

        let result: Result<bool, ApiError> = transport.get_json("/roles/me/Admin").await;

        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_path_segment_encoding() {
        assert_eq!(path_segment("42"), "42");
        assert_eq!(path_segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_reqwest_backend_joins_paths() {
        let config = ApiConfig {
            base_url: "http://localhost:8080/api/v1/".to_string(),
            timeout_seconds: 5,
        };
        let backend = ReqwestBackend::new(&config).unwrap();
        assert_eq!(backend.url("/auth/login"), "http://localhost:8080/api/v1/auth/login");
        assert_eq!(backend.url("users"), "http://localhost:8080/api/v1/users");
    }

    #[test]
    fn test_reqwest_backend_credentials_follow_the_jar() {
        use reqwest::cookie::CookieStore;
        use reqwest::header::HeaderValue;

        let config = ApiConfig::default();
        let backend = ReqwestBackend::new(&config).unwrap();
        assert!(backend.credentials().unwrap().is_none());

        let source = CredentialJar::new();
        let url = reqwest::Url::parse("http://localhost:8080/api/v1/auth/login").unwrap();
        let header = HeaderValue::from_static("refresh=r1; Path=/");
        source.set_cookies(&mut std::iter::once(&header), &url);

        backend.load_credentials(&source.to_json().unwrap()).unwrap();
        assert_eq!(backend.jar.len(), 1);
        assert!(backend.credentials().unwrap().is_some());

        backend.clear_credentials();
        assert!(backend.credentials().unwrap().is_none());
    }
}
