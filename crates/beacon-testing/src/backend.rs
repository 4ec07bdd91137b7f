use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use beacon_transport::{HttpBackend, HttpRequest, HttpResponse, NetworkFault};

enum Scripted {
    Response(HttpResponse),
    Fault(String),
}

/// Scripted HTTP backend: responses are served in push order and every
/// request is recorded for later inspection.
///
/// With an empty script every request is acknowledged with
/// `{"status": "ok"}`.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a generic success acknowledgment.
    pub fn push_success(&self, status: &str) {
        self.push_raw(200, json!({"status": status}).to_string());
    }

    /// Queue a failure body in the `message` form.
    pub fn push_failure(&self, message: &str) {
        self.push_raw(200, json!({"message": message}).to_string());
    }

    /// Queue an authentication grant.
    pub fn push_auth(&self, token: &str, secret: &str) {
        self.push_raw(200, json!({"token": token, "secret": secret}).to_string());
    }

    /// Queue a raw body with a status code.
    pub fn push_raw(&self, status: u16, body: String) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Scripted::Response(HttpResponse { status, body }));
    }

    /// Queue a transport-level fault (connect/timeout).
    pub fn push_network_fault(&self, message: &str) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Scripted::Fault(message.to_string()));
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// Paths of every request seen so far, in arrival order.
    pub fn request_paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetworkFault> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);

        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Fault(message)) => Err(NetworkFault(message)),
            None => Ok(HttpResponse {
                status: 200,
                body: json!({"status": "ok"}).to_string(),
            }),
        }
    }
}
