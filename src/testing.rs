//! Scripted collaborators shared by the async client tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::SessionListener;
use crate::error::ApiError;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Replays canned responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(ApiResponse {
            status,
            body: body.to_string().into_bytes(),
        }));
    }

    pub fn push_bytes(&self, status: u16, body: &[u8]) {
        self.push(Ok(ApiResponse {
            status,
            body: body.to_vec(),
        }));
    }

    pub fn push(&self, response: Result<ApiResponse, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {}", request.path))
    }
}

#[derive(Default)]
pub struct RecordingListener {
    redirects: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl SessionListener for RecordingListener {
    fn session_expired(&self, login_route: &str) {
        self.redirects.lock().unwrap().push(login_route.to_string());
    }
}
