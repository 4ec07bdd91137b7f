use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::Mutex;

use beacon_runtime::{AuthState, Dispatcher, DispatcherHandle, Score, Session};
use beacon_store::Store;
use beacon_transport::{Credentials, HttpBackend, ReqwestBackend, RetryPolicy, Transport};
use beacon_types::{Config, KeepPolicy, LogLevel, MetaMap, ModuleTarget, StorageScope, StringList};

use crate::error::{Error, Result};

/// Handle to one collection session.
///
/// Submission entry points are fire-and-forget: they return a bool meaning
/// "accepted for send". Authentication and storage calls are awaited for
/// their outcome.
pub struct Client {
    session: Arc<Session>,
    dispatcher: Mutex<Option<DispatcherHandle>>,
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            base_url: base_url.into(),
            config: None,
            store_path: None,
            backend: None,
            timeout: Duration::from_secs(30),
        }
    }

    // --- authentication ---

    pub async fn sign_in(
        &self,
        credentials: Credentials,
        user_id: Option<String>,
    ) -> Result<AuthState> {
        Ok(self.session.sign_in(credentials, user_id).await?)
    }

    pub async fn submit_mechanism_value(&self, value: impl Into<String>) -> Result<AuthState> {
        Ok(self.session.submit_mechanism_value(value).await?)
    }

    pub async fn auth_state(&self) -> AuthState {
        self.session.auth_state().await
    }

    pub async fn last_auth_error(&self) -> Option<String> {
        self.session.last_auth_error().await
    }

    // --- submission ---

    pub async fn event(&self, name: &str, meta: MetaMap) -> bool {
        self.session.submit_event(name, meta).await
    }

    pub async fn log(&self, level: LogLevel, text: &str, meta: MetaMap) -> bool {
        self.session.submit_log(level, text, meta).await
    }

    pub async fn log_debug(&self, text: &str, meta: MetaMap) -> bool {
        self.session.log_debug(text, meta).await
    }

    pub async fn log_info(&self, text: &str, meta: MetaMap) -> bool {
        self.session.log_info(text, meta).await
    }

    pub async fn log_warn(&self, text: &str, meta: MetaMap) -> bool {
        self.session.log_warn(text, meta).await
    }

    pub async fn log_error(&self, text: &str, meta: MetaMap) -> bool {
        self.session.log_error(text, meta).await
    }

    pub async fn telemetry(&self, name: &str, meta: MetaMap) -> bool {
        self.session.submit_telemetry(name, meta).await
    }

    pub async fn ai_proxy(&self, prompt: &str, past_messages: StringList, provider: &str) -> bool {
        self.session
            .submit_ai_proxy(prompt, past_messages, provider)
            .await
    }

    /// Stamp a key onto the metadata of every subsequently submitted
    /// record.
    pub async fn set_super_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.session.set_super_meta(key, value).await
    }

    pub async fn remove_super_meta(&self, key: &str) {
        self.session.remove_super_meta(key).await
    }

    /// Stable device identifier, generated on first use.
    pub async fn device_id(&self) -> String {
        self.session.device_id().await
    }

    // --- timed wrappers ---

    pub async fn start_assessment(&self, name: &str, meta: MetaMap) -> bool {
        self.session.start_assessment(name, meta).await
    }

    pub async fn complete_assessment(
        &self,
        name: &str,
        score: impl Into<Score>,
        result_options: Option<&str>,
        meta: MetaMap,
    ) -> bool {
        self.session
            .complete_assessment(name, score.into(), result_options, meta)
            .await
    }

    pub async fn start_objective(&self, name: &str, meta: MetaMap) -> bool {
        self.session.start_objective(name, meta).await
    }

    pub async fn complete_objective(
        &self,
        name: &str,
        score: impl Into<Score>,
        result_options: Option<&str>,
        meta: MetaMap,
    ) -> bool {
        self.session
            .complete_objective(name, score.into(), result_options, meta)
            .await
    }

    pub async fn start_interaction(&self, name: &str, meta: MetaMap) -> bool {
        self.session.start_interaction(name, meta).await
    }

    pub async fn complete_interaction(
        &self,
        name: &str,
        interaction_type: &str,
        meta: MetaMap,
    ) -> bool {
        self.session
            .complete_interaction(name, interaction_type, meta)
            .await
    }

    pub async fn start_level(&self, name: &str, meta: MetaMap) -> bool {
        self.session.start_level(name, meta).await
    }

    pub async fn complete_level(&self, name: &str, status: &str, meta: MetaMap) -> bool {
        self.session.complete_level(name, status, meta).await
    }

    pub async fn start_timed_event(&self, name: &str, meta: MetaMap) -> bool {
        self.session.start_timed_event(name, meta).await
    }

    pub async fn complete_timed_event(&self, name: &str, meta: MetaMap) -> bool {
        self.session.complete_timed_event(name, meta).await
    }

    // --- storage ---

    pub async fn set_entry(
        &self,
        name: &str,
        data: MetaMap,
        scope: StorageScope,
        policy: KeepPolicy,
    ) -> Result<()> {
        Ok(self.session.set_entry(name, data, scope, policy).await?)
    }

    pub async fn get_entry(&self, name: &str, scope: StorageScope) -> Result<Vec<MetaMap>> {
        Ok(self.session.get_entry(name, scope).await?)
    }

    pub async fn remove_entry(&self, name: &str, scope: StorageScope) -> Result<()> {
        Ok(self.session.remove_entry(name, scope).await?)
    }

    pub async fn remove_all(&self, scope: StorageScope) -> Result<()> {
        Ok(self.session.remove_all(scope).await?)
    }

    // --- module sequencing ---

    pub async fn next_module(&self) -> Option<ModuleTarget> {
        self.session.next_module().await
    }

    pub async fn peek_module(&self) -> Option<ModuleTarget> {
        self.session.peek_module().await
    }

    pub async fn clear_modules(&self) -> Result<()> {
        Ok(self.session.clear_modules().await?)
    }

    // --- lifecycle ---

    /// Push everything currently cached toward the server.
    pub async fn flush(&self) {
        if let Some(handle) = self.dispatcher.lock().await.as_ref() {
            handle.flush().await;
        }
    }

    /// Drain the send queue and stop background work. Safe to call once.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.dispatcher.lock().await.take() {
            handle.shutdown().await;
        }
        self.session.stop_background().await;
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    base_url: String,
    config: Option<Config>,
    store_path: Option<PathBuf>,
    backend: Option<Arc<dyn HttpBackend>>,
    timeout: Duration,
}

impl ClientBuilder {
    /// Use an explicit configuration instead of loading the config file.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Location of the durable cache database.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Substitute the HTTP stack (used by tests).
    pub fn backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn build(self) -> Result<Client> {
        let config = match self.config {
            Some(config) => config,
            None => Config::load().map_err(|e| Error::Internal(anyhow!(e)))?,
        };

        let backend: Arc<dyn HttpBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(
                ReqwestBackend::new(self.timeout)
                    .map_err(|e| Error::Internal(anyhow!("HTTP client: {}", e)))?,
            ),
        };

        let transport = Arc::new(Transport::new(backend, self.base_url));
        transport
            .set_retry_policy(RetryPolicy {
                count: config.retry_count,
                interval: Duration::from_millis(config.retry_interval_ms),
            })
            .await;

        let store = if config.durable_cache {
            let path = match self.store_path {
                Some(path) => path,
                None => default_cache_path()?,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Internal(anyhow!("Cache dir: {}", e)))?;
            }
            Store::open(&path).map_err(|e| Error::Internal(anyhow!(e)))?
        } else {
            Store::open_in_memory().map_err(|e| Error::Internal(anyhow!(e)))?
        };

        let session = Session::new(transport, store, config);
        let dispatcher = Dispatcher::start(session.clone()).await;

        Ok(Client {
            session,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }
}

fn default_cache_path() -> Result<PathBuf> {
    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("beacon").join("cache.db"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".beacon").join("cache.db"));
    }
    Err(Error::Internal(anyhow!(
        "Could not determine cache path: no HOME directory or XDG data directory found"
    )))
}
