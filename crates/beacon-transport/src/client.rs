use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use beacon_types::{ServerConfig, WireModel};
use beacon_wire::{
    AUTH_TOKEN_PATH, AuthSuccess, Classified, DumpCategory, Endpoint, STORAGE_CONFIG_PATH,
    classify, dump, load,
};

use crate::backend::{HttpBackend, HttpRequest, HttpResponse, Method};
use crate::error::{Error, Result};

/// Fixed authentication request payload.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub org_id: String,
    pub auth_secret: String,
    pub device_id: String,
    pub session_id: String,
    pub partner_tag: String,
    pub environment: String,
    pub client_version: String,
    pub platform: String,
    /// Final value of the server-requested auth mechanism, when one is in
    /// play for this deployment.
    pub mechanism_value: Option<String>,
}

impl Credentials {
    fn to_wire(&self) -> Value {
        let mut body = json!({
            "app_id": self.app_id,
            "org_id": self.org_id,
            "auth_secret": self.auth_secret,
            "device_id": self.device_id,
            "session_id": self.session_id,
            "partner_tag": self.partner_tag,
            "environment": self.environment,
            "client_version": self.client_version,
            "platform": self.platform,
        });
        if let Some(value) = &self.mechanism_value {
            body["auth_mechanism_value"] = Value::String(value.clone());
        }
        body
    }
}

/// Bearer token plus the shared secret used for request signing.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

/// Retry discipline for network-level faults.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub count: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: 3,
            interval: Duration::from_secs(2),
        }
    }
}

/// How a multi-record POST travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostMode {
    /// All records in one request body, insertion order preserved.
    Batch,
    /// One request per record, issued sequentially; the list is walked to
    /// the end even when individual sends fail.
    OneAtATime,
}

/// Outcome of a classified send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The server acknowledged the payload.
    Delivered,
    /// The server rejected the request and re-authentication succeeded;
    /// delivery is NOT confirmed and the caller retries the operation.
    Reauthenticated,
}

#[derive(Debug, Default)]
struct AuthState {
    tokens: Option<TokenPair>,
    /// Bumped on every successful authentication; used to coalesce
    /// concurrent re-auth attempts.
    generation: u64,
    last_error: Option<String>,
}

/// Authenticated HTTP client for the collection service.
///
/// Response handling is body-shape driven: a parseable success shape is a
/// delivery, a parseable failure shape triggers re-authentication, anything
/// else is a bad response shape. Network faults are a separate, retryable
/// branch.
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    base_url: String,
    retry: RwLock<RetryPolicy>,
    credentials: RwLock<Option<Credentials>>,
    auth: RwLock<AuthState>,
    reauth_gate: Mutex<()>,
}

impl Transport {
    pub fn new(backend: Arc<dyn HttpBackend>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            backend,
            base_url,
            retry: RwLock::new(RetryPolicy::default()),
            credentials: RwLock::new(None),
            auth: RwLock::new(AuthState::default()),
            reauth_gate: Mutex::new(()),
        }
    }

    pub async fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.retry.write().await = policy;
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().await = Some(credentials);
    }

    pub async fn has_token(&self) -> bool {
        self.auth.read().await.tokens.is_some()
    }

    /// Human-readable description of the most recent authentication
    /// failure, for caller inspection.
    pub async fn last_error(&self) -> Option<String> {
        self.auth.read().await.last_error.clone()
    }

    /// Authenticate against the token endpoint and store the bearer token
    /// and signing secret.
    pub async fn authenticate(&self) -> Result<()> {
        let credentials = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(Error::NoCredentials)?;

        let request = HttpRequest {
            method: Method::Post,
            url: self.url(AUTH_TOKEN_PATH),
            query: Vec::new(),
            bearer: None,
            signature: None,
            body: Some(credentials.to_wire()),
        };

        let response = match self.execute_with_retry(request).await {
            Ok(response) => response,
            Err(err) => {
                self.record_error(err.to_string()).await;
                return Err(err);
            }
        };

        let Ok(value) = serde_json::from_str::<Value>(&response.body) else {
            let message = format!("Token endpoint returned non-JSON: {}", excerpt(&response.body));
            self.record_error(message.clone()).await;
            return Err(Error::BadResponseShape(message));
        };

        if let Ok(granted) = serde_json::from_value::<AuthSuccess>(value.clone()) {
            let mut auth = self.auth.write().await;
            auth.tokens = Some(TokenPair {
                token: granted.token,
                secret: granted.secret,
            });
            auth.generation += 1;
            auth.last_error = None;
            debug!("Authentication succeeded");
            return Ok(());
        }

        match classify(&value) {
            Classified::Failure(failure) => {
                let text = failure.text();
                self.record_error(text.clone()).await;
                Err(Error::AuthenticationFailed(text))
            }
            _ => {
                let message = format!(
                    "Token endpoint returned unrecognized shape: {}",
                    excerpt(&response.body)
                );
                self.record_error(message.clone()).await;
                Err(Error::BadResponseShape(message))
            }
        }
    }

    /// Re-authenticate behind a single-flight gate: concurrent failers
    /// coalesce onto one in-flight attempt and adopt its outcome.
    pub async fn reauthenticate(&self) -> Result<()> {
        let observed = self.auth.read().await.generation;
        let _gate = self.reauth_gate.lock().await;
        if self.auth.read().await.generation != observed {
            return Ok(());
        }
        self.authenticate().await
    }

    /// POST a slice of records to the type's endpoint.
    pub async fn post<T: WireModel + Endpoint>(
        &self,
        items: &[T],
        mode: PostMode,
    ) -> Result<PostOutcome> {
        let bodies: Vec<Value> = items
            .iter()
            .map(|item| dump(item, DumpCategory::ForBackend))
            .collect();
        self.post_raw(T::PATH, &bodies, mode).await
    }

    /// POST pre-rendered wire bodies (the cached-outbox path).
    pub async fn post_raw(
        &self,
        path: &str,
        bodies: &[Value],
        mode: PostMode,
    ) -> Result<PostOutcome> {
        if bodies.is_empty() {
            return Ok(PostOutcome::Delivered);
        }

        match mode {
            PostMode::Batch => {
                self.send_classified(Method::Post, path, Some(Value::Array(bodies.to_vec())), Vec::new())
                    .await
            }
            PostMode::OneAtATime => {
                // Partial success beats all-or-nothing abandonment: keep
                // walking the list, report the last item's outcome.
                let mut last = Ok(PostOutcome::Delivered);
                for (index, body) in bodies.iter().enumerate() {
                    let outcome = self
                        .send_classified(Method::Post, path, Some(body.clone()), Vec::new())
                        .await;
                    if let Err(err) = &outcome {
                        debug!(index, error = %err, "Item send failed, continuing through list");
                    }
                    last = outcome;
                }
                last
            }
        }
    }

    /// GET records of one type, filtered by query parameters.
    pub async fn get<T: WireModel + Endpoint + Default>(
        &self,
        query: Vec<(String, String)>,
    ) -> Result<Vec<T>> {
        let request = self.request(Method::Get, T::PATH, None, query).await;
        let response = self.execute_with_retry(request).await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("{} returned 404", T::PATH)));
        }

        let value = parse_body(&response)?;
        if let Value::Object(_) = &value
            && let Classified::Failure(failure) = classify(&value)
        {
            return Err(self.rejected(failure.text()).await);
        }

        let items = match value {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            other => {
                return Err(Error::BadResponseShape(format!(
                    "{} returned {}",
                    T::PATH,
                    excerpt(&other.to_string())
                )));
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let mut record = T::default();
            load(&mut record, item)
                .map_err(|e| Error::BadResponseShape(format!("{}: {}", T::PATH, e)))?;
            records.push(record);
        }
        Ok(records)
    }

    /// DELETE at the type's endpoint, classified like a POST.
    pub async fn delete<T: Endpoint>(&self, query: Vec<(String, String)>) -> Result<PostOutcome> {
        self.send_classified(Method::Delete, T::PATH, None, query)
            .await
    }

    /// Fetch the server-pushed configuration document.
    pub async fn fetch_server_config(&self) -> Result<ServerConfig> {
        let request = self
            .request(Method::Get, STORAGE_CONFIG_PATH, None, Vec::new())
            .await;
        let response = self.execute_with_retry(request).await?;
        let value = parse_body(&response)?;

        if let Classified::Failure(failure) = classify(&value) {
            return Err(self.rejected(failure.text()).await);
        }

        serde_json::from_value::<ServerConfig>(value).map_err(|e| {
            Error::BadResponseShape(format!("{}: {}", STORAGE_CONFIG_PATH, e))
        })
    }

    // --- internals ---

    async fn send_classified(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: Vec<(String, String)>,
    ) -> Result<PostOutcome> {
        let request = self.request(method, path, body, query).await;
        let response = self.execute_with_retry(request).await?;
        let value = parse_body(&response)?;

        match classify(&value) {
            Classified::Success(success) => {
                debug!(path, status = %success.status, "Delivered");
                Ok(PostOutcome::Delivered)
            }
            Classified::Failure(failure) => {
                warn!(path, failure = %failure.text(), "Request rejected, re-authenticating");
                self.reauthenticate().await?;
                Ok(PostOutcome::Reauthenticated)
            }
            Classified::Unparseable => Err(Error::BadResponseShape(format!(
                "{} returned {}",
                path,
                excerpt(&response.body)
            ))),
        }
    }

    /// Record a rejection, attempt re-auth, and surface the original
    /// failure text.
    async fn rejected(&self, text: String) -> Error {
        warn!(failure = %text, "Request rejected, re-authenticating");
        if let Err(err) = self.reauthenticate().await {
            return err;
        }
        Error::AuthenticationFailed(text)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: Vec<(String, String)>,
    ) -> HttpRequest {
        let auth = self.auth.read().await;
        let bearer = auth.tokens.as_ref().map(|pair| pair.token.clone());
        let signature = auth
            .tokens
            .as_ref()
            .map(|pair| sign(&pair.secret, path, body.as_ref()));
        HttpRequest {
            method,
            url: self.url(path),
            query,
            bearer,
            signature,
            body,
        }
    }

    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse> {
        let retry = *self.retry.read().await;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.backend.execute(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(fault) => {
                    if attempt > retry.count {
                        return Err(Error::Network(fault.0));
                    }
                    debug!(attempt, error = %fault, "Network fault, retrying");
                    tokio::time::sleep(retry.interval).await;
                }
            }
        }
    }

    async fn record_error(&self, message: String) {
        self.auth.write().await.last_error = Some(message);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Signature over the signing secret, the path, and the body rendering.
fn sign(secret: &str, path: &str, body: Option<&Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(path.as_bytes());
    if let Some(body) = body {
        hasher.update(body.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn parse_body(response: &HttpResponse) -> Result<Value> {
    serde_json::from_str::<Value>(&response.body)
        .map_err(|_| Error::BadResponseShape(format!("Non-JSON body: {}", excerpt(&response.body))))
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= 120 {
        text.to_string()
    } else {
        text.chars().take(120).collect::<String>() + "..."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_stable_and_body_sensitive() {
        let a = sign("secret", "collect/event", Some(&json!({"a": 1})));
        let b = sign("secret", "collect/event", Some(&json!({"a": 1})));
        let c = sign("secret", "collect/event", Some(&json!({"a": 2})));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(300);
        assert!(excerpt(&long).len() < 130);
        assert_eq!(excerpt("short"), "short");
    }
}
