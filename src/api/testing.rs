//! Scripted backend for unit tests
//!
//! Routes are keyed by method and path. Each route holds a queue of replies;
//! the last reply is sticky once the queue is down to one. Unknown routes
//! answer 404.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::HttpBackend;
use super::responses::{ApiError, ApiRequest, ApiResponse};

#[derive(Clone)]
enum Reply {
    Response(ApiResponse, Duration),
    Error(ApiError),
}

type RouteKey = (String, String);

#[derive(Default)]
pub struct ScriptedBackend {
    routes: Mutex<HashMap<RouteKey, VecDeque<Reply>>>,
    log: Mutex<Vec<ApiRequest>>,
    credentials: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: &str, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response
    pub fn respond(&self, method: &str, path: &str, response: ApiResponse) {
        self.push(method, path, Reply::Response(response, Duration::ZERO));
    }

    /// Queue a JSON response
    pub fn respond_json(&self, method: &str, path: &str, status: StatusCode, value: serde_json::Value) {
        self.respond(method, path, ApiResponse::json(status, &value));
    }

    /// Queue a response delivered after `delay`
    pub fn respond_after(&self, method: &str, path: &str, delay: Duration, response: ApiResponse) {
        self.push(method, path, Reply::Response(response, delay));
    }

    /// Queue a transport failure
    pub fn fail(&self, method: &str, path: &str, error: ApiError) {
        self.push(method, path, Reply::Error(error));
    }

    /// Number of requests seen for a route
    pub fn calls(&self, method: &str, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && r.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Stand-in for the cookies a real server would have set
    pub fn set_credentials(&self, snapshot: &str) {
        *self.credentials.lock().unwrap() = Some(snapshot.to_string());
    }

    pub fn current_credentials(&self) -> Option<String> {
        self.credentials.lock().unwrap().clone()
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.log.lock().unwrap().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let key = (request.method.as_str().to_string(), request.path.clone());
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(response, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(response)
            }
            Some(Reply::Error(error)) => Err(error),
            None => Ok(ApiResponse::new(StatusCode::NOT_FOUND, Vec::new())),
        }
    }

    fn credentials(&self) -> anyhow::Result<Option<String>> {
        Ok(self.current_credentials())
    }

    fn load_credentials(&self, snapshot: &str) -> anyhow::Result<()> {
        self.set_credentials(snapshot);
        Ok(())
    }

    fn clear_credentials(&self) {
        *self.credentials.lock().unwrap() = None;
    }
}
