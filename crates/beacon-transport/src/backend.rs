use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// HTTP verb subset the collection service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// One outbound request, fully resolved.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    /// Request signature derived from the shared secret.
    pub signature: Option<String>,
    pub body: Option<Value>,
}

/// Raw response: status plus the unparsed body text.
///
/// The body stays text so that shape classification can distinguish a
/// non-JSON body from a network fault.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Transport-level failure (connect, DNS, timeout). Distinct from every
/// body-shape outcome.
#[derive(Debug)]
pub struct NetworkFault(pub String);

impl fmt::Display for NetworkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NetworkFault {}

/// Seam between the transport client and the HTTP stack; the test backend
/// scripts responses through the same interface.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, NetworkFault>;
}

/// Production backend on reqwest (rustls, JSON bodies).
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> std::result::Result<Self, NetworkFault> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkFault(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, NetworkFault> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(signature) = &request.signature {
            builder = builder.header("x-beacon-signature", signature);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkFault(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkFault(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
