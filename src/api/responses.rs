//! Request and response types shared by the transport
//!
//! Every call is an [`ApiRequest`]; every 2xx answer is an [`ApiResponse`];
//! everything else is an [`ApiError`]. Response bodies are decoded into
//! explicit types at this boundary so callers never branch on ad hoc fields.

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

/// Maximum number of body bytes echoed into a status error message
const ERROR_BODY_PREVIEW: usize = 200;

/// Transport-level error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Connection, TLS or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Body did not match the expected shape
    #[error("Unexpected response shape: {0}")]
    Decode(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build a status error with the canonical reason as message
    pub fn status(status: StatusCode) -> Self {
        Self::Status {
            status,
            message: status.canonical_reason().unwrap_or("Unknown status").to_string(),
        }
    }

    /// HTTP status of the failure, if the server answered
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND)
    }
}

/// Outbound request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(FilePart),
}

/// Single file sent as a multipart form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outbound request, relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Attach a single-file multipart body
    pub fn file(mut self, part: FilePart) -> Self {
        self.body = RequestBody::Multipart(part);
        self
    }
}

/// Response as received from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// JSON response helper (mostly for scripted backends)
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Empty body (or whitespace only)
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(|b| b.is_ascii_whitespace())
    }

    /// Decode the body into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Lossy UTF-8 view of the body
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`ApiError::Status`]
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            return Ok(self);
        }
        let preview: String = self.text().trim().chars().take(ERROR_BODY_PREVIEW).collect();
        if preview.is_empty() {
            Err(ApiError::status(self.status))
        } else {
            Err(ApiError::Status {
                status: self.status,
                message: preview,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_keeps_success() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, Vec::new());
        assert!(response.error_for_status().is_ok());
    }

    #[test]
    fn test_error_for_status_uses_body_or_reason() {
        let err = ApiResponse::new(StatusCode::UNAUTHORIZED, "token expired")
            .error_for_status()
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("token expired"));

        let err = ApiResponse::new(StatusCode::NOT_FOUND, "")
            .error_for_status()
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"unexpected": true}"#);
        let result: Result<bool, ApiError> = response.decode();
        assert!(matches!(result, Err(ApiError::Decode(_))));

        let response = ApiResponse::new(StatusCode::OK, "true");
        assert!(response.decode::<bool>().unwrap());
    }

    #[test]
    fn test_json_body_builder() {
        let request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({"username": "a"}))
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.body,
            RequestBody::Json(serde_json::json!({"username": "a"}))
        );
    }

    #[test]
    fn test_whitespace_body_is_empty() {
        assert!(ApiResponse::new(StatusCode::OK, " \n").is_empty());
        assert!(!ApiResponse::new(StatusCode::OK, "x").is_empty());
    }
}
