//! In-memory transport and fixtures for unit tests.

use crate::controller::RegistrationController;
use crate::error::TransportError;
use crate::transport::{HttpRequest, Transport};
use crate::types::{Endpoints, Environment, ServiceConfig};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Replays canned responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<Vec<u8>, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_front(&self, response: Result<Vec<u8>, TransportError>) {
        self.responses.lock().unwrap().push_front(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Status {
                    status: 599,
                    body: "no scripted response".into(),
                })
            })
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        bundle_id: "com.example.app".into(),
        project_id: "demo-project".into(),
        api_key: SecretString::new("api-key".into()),
        app_id: "1:123:ios:abc".into(),
        sender_id: "123".into(),
    }
}

pub fn test_controller(transport: Arc<ScriptedTransport>) -> RegistrationController {
    RegistrationController::new(test_config(), Environment::Production, transport)
        .with_endpoints(Endpoints::with_base_url("http://backend.test"))
}

pub fn checkin_body(time_msec: u64) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "android_id": 4242u64,
        "security_token": 99u64,
        "version_info": "v1",
        "digest": "dg",
        "time_msec": time_msec,
    }))
    .unwrap()
}

pub fn installation_body() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "fid": "fid-1",
        "refreshToken": "refresh-1",
        "authToken": {"token": "auth-1", "expiresIn": "604800s"},
    }))
    .unwrap()
}

/// Holds every response until `release` is called, then answers with `body`.
pub struct GatedTransport {
    gate: Notify,
    body: Vec<u8>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl GatedTransport {
    pub fn new(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            gate: Notify::new(),
            body,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.gate.notified().await;
        Ok(self.body.clone())
    }
}

pub fn gated_controller(transport: Arc<GatedTransport>) -> RegistrationController {
    RegistrationController::new(test_config(), Environment::Production, transport)
        .with_endpoints(Endpoints::with_base_url("http://backend.test"))
}
