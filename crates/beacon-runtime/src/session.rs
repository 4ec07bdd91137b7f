use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use beacon_store::Store;
use beacon_transport::{Credentials, RetryPolicy, Transport};
use beacon_types::{Clock, Config, MetaMap};

use crate::dispatcher::Outgoing;
use crate::error::{Error, Result};
use crate::modules::ModuleSequencer;

/// Authentication lifecycle.
///
/// `Failed` is terminal until an external retry (a fresh `sign_in` call);
/// re-authentication while `Authenticated` is a self-transition handled by
/// the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    /// The server requested an additional mechanism value before granting
    /// a full session.
    AuthMechanismRequired,
    Authenticated,
    Failed,
}

/// Kinds of timed Start/Complete activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimedKind {
    Assessment,
    Objective,
    Interaction,
    Level,
    TimedEvent,
}

impl TimedKind {
    pub fn label(&self) -> &'static str {
        match self {
            TimedKind::Assessment => "assessment",
            TimedKind::Objective => "objective",
            TimedKind::Interaction => "interaction",
            TimedKind::Level => "level",
            TimedKind::TimedEvent => "timed_event",
        }
    }

    pub(crate) fn name_field(&self) -> Option<&'static str> {
        match self {
            TimedKind::Assessment => Some("assessment_name"),
            TimedKind::Objective => Some("objective_name"),
            TimedKind::Level => Some("level_name"),
            TimedKind::Interaction | TimedKind::TimedEvent => None,
        }
    }

    /// Whether calls of this kind queue while the session is not yet
    /// authenticated.
    pub(crate) fn queues_before_auth(&self) -> bool {
        matches!(
            self,
            TimedKind::Assessment | TimedKind::Objective | TimedKind::Interaction
        )
    }

    pub(crate) fn parse_label(label: &str) -> Option<Self> {
        match label {
            "assessment" => Some(TimedKind::Assessment),
            "objective" => Some(TimedKind::Objective),
            "interaction" => Some(TimedKind::Interaction),
            "level" => Some(TimedKind::Level),
            "timed_event" => Some(TimedKind::TimedEvent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallPhase {
    Start,
    Complete,
}

/// Values captured alongside a Complete call.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallExtras {
    /// Normalized decimal score string.
    pub score: Option<String>,
    pub status: Option<String>,
    pub interaction_type: Option<String>,
    pub result_options: Option<String>,
}

/// A wrapper call captured while the session was not yet authenticated,
/// replayed verbatim (with its original instant) once it is.
#[derive(Debug, Clone)]
pub(crate) struct QueuedCall {
    pub phase: CallPhase,
    pub kind: TimedKind,
    pub name: String,
    pub meta: MetaMap,
    pub extras: CallExtras,
    pub at_millis: i64,
}

/// Local key of the generated device identifier.
const DEVICE_ID_KEY: &str = "device_id";
/// Local key of the super-metadata map stamped onto every record.
const SUPER_META_KEY: &str = "super_meta";
/// Local key of the in-flight timed-event snapshot, used to recover
/// running durations after an abrupt termination.
const RUNNING_EVENTS_KEY: &str = "running_events";

/// Owner of all per-session mutable state: auth lifecycle, the pre-auth
/// activity queue, timed-event start maps, and the module cursor.
///
/// Passed explicitly as `Arc<Session>`; there is no process-wide state, so
/// concurrent sessions and tests do not interfere.
pub struct Session {
    pub(crate) transport: Arc<Transport>,
    pub(crate) store: Mutex<Store>,
    pub(crate) config: RwLock<Config>,
    pub(crate) clock: Clock,
    state: RwLock<AuthState>,
    pub(crate) environment: RwLock<String>,
    pub(crate) user_id: RwLock<Option<String>>,
    credentials: Mutex<Option<Credentials>>,
    pub(crate) pending: Mutex<VecDeque<QueuedCall>>,
    pub(crate) timers: Mutex<HashMap<TimedKind, HashMap<String, i64>>>,
    pub(crate) super_meta: RwLock<MetaMap>,
    pub(crate) modules: Mutex<ModuleSequencer>,
    sender: RwLock<Option<mpsc::Sender<Outgoing>>>,
    reauth_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(transport: Arc<Transport>, store: Store, config: Config) -> Arc<Self> {
        let super_meta = load_super_meta(&store);
        let timers = load_running_events(&store);
        Arc::new(Self {
            transport,
            store: Mutex::new(store),
            config: RwLock::new(config),
            clock: Clock::new(),
            state: RwLock::new(AuthState::Unauthenticated),
            environment: RwLock::new(String::new()),
            user_id: RwLock::new(None),
            credentials: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            timers: Mutex::new(timers),
            super_meta: RwLock::new(super_meta),
            modules: Mutex::new(ModuleSequencer::new()),
            sender: RwLock::new(None),
            reauth_task: Mutex::new(None),
        })
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub async fn auth_state(&self) -> AuthState {
        *self.state.read().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth_state().await == AuthState::Authenticated
    }

    pub async fn config_snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Human-readable description of the last authentication failure.
    pub async fn last_auth_error(&self) -> Option<String> {
        self.transport.last_error().await
    }

    pub(crate) async fn attach_sender(&self, tx: mpsc::Sender<Outgoing>) {
        *self.sender.write().await = Some(tx);
    }

    /// Hand a record to the dispatcher. Returns whether it was accepted for
    /// send; delivery itself is only observable through logging.
    pub(crate) async fn send_to_dispatcher(&self, message: Outgoing) -> bool {
        let sender = self.sender.read().await.clone();
        match sender {
            Some(tx) => match tx.try_send(message) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "Dispatcher queue rejected record");
                    false
                }
            },
            None => {
                warn!("No dispatcher attached, record dropped");
                false
            }
        }
    }

    /// Submit credentials and drive the authentication lifecycle.
    ///
    /// Ends in `Authenticated` (queued activity replayed),
    /// `AuthMechanismRequired` (awaiting `submit_mechanism_value`), or
    /// `Failed` (queued activity discarded).
    pub async fn sign_in(
        self: &Arc<Self>,
        mut credentials: Credentials,
        user_id: Option<String>,
    ) -> Result<AuthState> {
        if credentials.device_id.is_empty() {
            credentials.device_id = self.device_id().await;
        }
        *self.state.write().await = AuthState::Authenticating;
        *self.environment.write().await = credentials.environment.clone();
        *self.user_id.write().await = user_id;
        *self.credentials.lock().await = Some(credentials.clone());
        self.transport.set_credentials(credentials).await;

        if let Err(err) = self.transport.authenticate().await {
            self.fail(&err.to_string()).await;
            return Err(err.into());
        }

        self.adopt_server_config().await;

        if !self.config.read().await.auth_mechanisms.is_empty() {
            *self.state.write().await = AuthState::AuthMechanismRequired;
            info!("Server requires an auth mechanism value");
            return Ok(AuthState::AuthMechanismRequired);
        }

        self.finish_authenticated().await;
        Ok(AuthState::Authenticated)
    }

    /// Complete an `AuthMechanismRequired` session with the final mechanism
    /// value.
    pub async fn submit_mechanism_value(
        self: &Arc<Self>,
        value: impl Into<String>,
    ) -> Result<AuthState> {
        if self.auth_state().await != AuthState::AuthMechanismRequired {
            return Err(Error::InvalidState(
                "No auth mechanism is pending".to_string(),
            ));
        }
        let Some(mut credentials) = self.credentials.lock().await.clone() else {
            return Err(Error::InvalidState("No credentials on file".to_string()));
        };

        credentials.mechanism_value = Some(value.into());
        self.transport.set_credentials(credentials).await;

        match self.transport.authenticate().await {
            Ok(()) => {
                self.finish_authenticated().await;
                Ok(AuthState::Authenticated)
            }
            Err(err) => {
                self.fail(&err.to_string()).await;
                Err(err.into())
            }
        }
    }

    /// Stop background work (the proactive re-auth check).
    pub async fn stop_background(&self) {
        if let Some(task) = self.reauth_task.lock().await.take() {
            task.abort();
        }
    }

    // --- super metadata ---

    /// Set a key stamped onto the metadata of every subsequently submitted
    /// record. Persisted locally.
    pub async fn set_super_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.super_meta.write().await.set(key, value);
        self.persist_super_meta().await;
    }

    /// Remove a super-metadata key.
    pub async fn remove_super_meta(&self, key: &str) {
        self.super_meta.write().await.remove(key);
        self.persist_super_meta().await;
    }

    pub async fn super_meta(&self) -> MetaMap {
        self.super_meta.read().await.clone()
    }

    async fn persist_super_meta(&self) {
        let rendered = self.super_meta.read().await.to_json_object().to_string();
        let store = self.store.lock().await;
        if let Err(err) = store.kv_set(SUPER_META_KEY, &rendered) {
            warn!(error = %err, "Failed to persist super metadata");
        }
    }

    /// Device identifier: generated once, reused for the lifetime of the
    /// local store.
    pub async fn device_id(&self) -> String {
        let store = self.store.lock().await;
        match store.kv_get(DEVICE_ID_KEY) {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = beacon_types::RecordId::generate().to_string();
                if let Err(err) = store.kv_set(DEVICE_ID_KEY, &id) {
                    warn!(error = %err, "Failed to persist device id");
                }
                id
            }
            Err(err) => {
                warn!(error = %err, "Device id lookup failed, using a transient one");
                beacon_types::RecordId::generate().to_string()
            }
        }
    }

    /// Persist the in-flight timed-event map so running durations survive
    /// an abrupt termination.
    pub(crate) async fn persist_running_events(&self) {
        if !self.config.read().await.durable_cache {
            return;
        }
        let rendered = {
            let timers = self.timers.lock().await;
            let mut root = serde_json::Map::new();
            for (kind, starts) in timers.iter() {
                let mut inner = serde_json::Map::new();
                for (name, at) in starts {
                    inner.insert(name.clone(), serde_json::Value::from(*at));
                }
                root.insert(kind.label().to_string(), serde_json::Value::Object(inner));
            }
            serde_json::Value::Object(root).to_string()
        };
        let store = self.store.lock().await;
        if let Err(err) = store.kv_set(RUNNING_EVENTS_KEY, &rendered) {
            warn!(error = %err, "Failed to persist running events");
        }
    }

    // --- internals ---

    async fn adopt_server_config(self: &Arc<Self>) {
        match self.transport.fetch_server_config().await {
            Ok(server) => {
                let mut config = self.config.write().await;
                config.merge_server(&server);
                self.transport
                    .set_retry_policy(RetryPolicy {
                        count: config.retry_count,
                        interval: Duration::from_millis(config.retry_interval_ms),
                    })
                    .await;
                drop(config);

                if let Some(modules) = server.modules {
                    self.modules.lock().await.set_modules(modules);
                }
            }
            Err(err) => {
                debug!(error = %err, "Server config unavailable, keeping local values");
            }
        }
    }

    async fn finish_authenticated(self: &Arc<Self>) {
        *self.state.write().await = AuthState::Authenticated;
        self.restore_module_cursor().await;
        self.replay_pending().await;
        self.spawn_reauth_task().await;
        // Nudge the dispatcher so records cached while offline go out.
        self.send_to_dispatcher(Outgoing::Flush).await;
        info!("Session authenticated");
    }

    async fn fail(&self, reason: &str) {
        *self.state.write().await = AuthState::Failed;
        let discarded = {
            let mut pending = self.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        warn!(reason, discarded, "Authentication failed");
    }

    async fn replay_pending(self: &Arc<Self>) {
        let calls: Vec<QueuedCall> = {
            let mut pending = self.pending.lock().await;
            pending.drain(..).collect()
        };
        if calls.is_empty() {
            return;
        }
        info!(count = calls.len(), "Replaying activity queued before authentication");
        for call in calls {
            self.replay_call(call).await;
        }
    }

    async fn spawn_reauth_task(self: &Arc<Self>) {
        let (enabled, interval) = {
            let config = self.config.read().await;
            (
                config.reauth_before_expiry,
                Duration::from_millis(config.reauth_interval_ms),
            )
        };
        if !enabled {
            return;
        }

        let mut slot = self.reauth_task.lock().await;
        if slot.is_some() {
            return;
        }

        let session = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if session.auth_state().await != AuthState::Authenticated {
                    break;
                }
                match session.transport.reauthenticate().await {
                    Ok(()) => debug!("Proactively re-authenticated ahead of expiry"),
                    Err(err) => warn!(error = %err, "Proactive re-authentication failed"),
                }
            }
        }));
    }
}

fn load_super_meta(store: &Store) -> MetaMap {
    let Ok(Some(raw)) = store.kv_get(SUPER_META_KEY) else {
        return MetaMap::new();
    };
    serde_json::from_str::<serde_json::Value>(&raw)
        .ok()
        .and_then(|value| MetaMap::from_json_object(&value).ok())
        .unwrap_or_default()
}

fn load_running_events(store: &Store) -> HashMap<TimedKind, HashMap<String, i64>> {
    let mut timers = HashMap::new();
    let Ok(Some(raw)) = store.kv_get(RUNNING_EVENTS_KEY) else {
        return timers;
    };
    let Ok(serde_json::Value::Object(root)) = serde_json::from_str::<serde_json::Value>(&raw)
    else {
        return timers;
    };
    for (label, starts) in root {
        let Some(kind) = TimedKind::parse_label(&label) else {
            continue;
        };
        let Some(starts) = starts.as_object() else {
            continue;
        };
        let inner: HashMap<String, i64> = starts
            .iter()
            .filter_map(|(name, at)| at.as_i64().map(|at| (name.clone(), at)))
            .collect();
        if !inner.is_empty() {
            timers.insert(kind, inner);
        }
    }
    timers
}
