use tracing::warn;

use beacon_types::{AiProxy, Event, LogEntry, LogLevel, MetaMap, StringList, Telemetry};

use crate::dispatcher::Outgoing;
use crate::session::{CallExtras, CallPhase, QueuedCall, Session, TimedKind};

/// Score input: a number or a numeric string.
#[derive(Debug, Clone)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Score::Number(value)
    }
}

impl From<i64> for Score {
    fn from(value: i64) -> Self {
        Score::Number(value as f64)
    }
}

impl From<&str> for Score {
    fn from(value: &str) -> Self {
        Score::Text(value.to_string())
    }
}

impl From<String> for Score {
    fn from(value: String) -> Self {
        Score::Text(value)
    }
}

/// Normalize a score to a decimal string clamped into `[0, 100]`.
///
/// Non-numeric input is logged and becomes `"0"`.
pub fn normalize_score(score: &Score) -> String {
    let value = match score {
        Score::Number(n) => *n,
        Score::Text(t) => match t.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                warn!(input = %t, "Score is not numeric, using 0");
                0.0
            }
        },
    };

    let clamped = value.clamp(0.0, 100.0);
    if clamped.fract() == 0.0 {
        format!("{}", clamped as i64)
    } else {
        format!("{}", clamped)
    }
}

/// Public submission surface: one entry point per record kind, plus the
/// timed Start/Complete wrappers.
///
/// Every entry point is fire-and-forget: the returned bool means "accepted
/// for send", never "confirmed delivered".
impl Session {
    pub async fn submit_event(&self, name: &str, meta: MetaMap) -> bool {
        let environment = self.environment.read().await.clone();
        let meta = self.merged_meta(meta).await;
        let event = Event::new(&self.clock, name, environment).with_meta(meta);
        self.send_to_dispatcher(Outgoing::Event(event)).await
    }

    pub async fn submit_log(&self, level: LogLevel, text: &str, meta: MetaMap) -> bool {
        let meta = self.merged_meta(meta).await;
        let entry = LogEntry::new(&self.clock, level, text).with_meta(meta);
        self.send_to_dispatcher(Outgoing::Log(entry)).await
    }

    pub async fn log_debug(&self, text: &str, meta: MetaMap) -> bool {
        self.submit_log(LogLevel::Debug, text, meta).await
    }

    pub async fn log_info(&self, text: &str, meta: MetaMap) -> bool {
        self.submit_log(LogLevel::Info, text, meta).await
    }

    pub async fn log_warn(&self, text: &str, meta: MetaMap) -> bool {
        self.submit_log(LogLevel::Warn, text, meta).await
    }

    pub async fn log_error(&self, text: &str, meta: MetaMap) -> bool {
        self.submit_log(LogLevel::Error, text, meta).await
    }

    pub async fn submit_telemetry(&self, name: &str, meta: MetaMap) -> bool {
        let meta = self.merged_meta(meta).await;
        let sample = Telemetry::new(&self.clock, name).with_meta(meta);
        self.send_to_dispatcher(Outgoing::Telemetry(sample)).await
    }

    /// AI proxy calls bypass the durable cache entirely.
    pub async fn submit_ai_proxy(
        &self,
        prompt: &str,
        past_messages: StringList,
        provider: &str,
    ) -> bool {
        let call = AiProxy::new(&self.clock, prompt, past_messages, provider);
        self.send_to_dispatcher(Outgoing::AiProxy(call)).await
    }

    // --- timed wrappers ---

    pub async fn start_assessment(&self, name: &str, meta: MetaMap) -> bool {
        self.start_timed(TimedKind::Assessment, name, meta).await
    }

    pub async fn complete_assessment(
        &self,
        name: &str,
        score: Score,
        result_options: Option<&str>,
        meta: MetaMap,
    ) -> bool {
        let extras = CallExtras {
            score: Some(normalize_score(&score)),
            result_options: Some(result_options.unwrap_or_default().to_string()),
            ..Default::default()
        };
        self.complete_timed(TimedKind::Assessment, name, extras, meta)
            .await
    }

    pub async fn start_objective(&self, name: &str, meta: MetaMap) -> bool {
        self.start_timed(TimedKind::Objective, name, meta).await
    }

    pub async fn complete_objective(
        &self,
        name: &str,
        score: Score,
        result_options: Option<&str>,
        meta: MetaMap,
    ) -> bool {
        let extras = CallExtras {
            score: Some(normalize_score(&score)),
            result_options: Some(result_options.unwrap_or_default().to_string()),
            ..Default::default()
        };
        self.complete_timed(TimedKind::Objective, name, extras, meta)
            .await
    }

    pub async fn start_interaction(&self, name: &str, meta: MetaMap) -> bool {
        self.start_timed(TimedKind::Interaction, name, meta).await
    }

    pub async fn complete_interaction(
        &self,
        name: &str,
        interaction_type: &str,
        meta: MetaMap,
    ) -> bool {
        let extras = CallExtras {
            interaction_type: Some(interaction_type.to_string()),
            ..Default::default()
        };
        self.complete_timed(TimedKind::Interaction, name, extras, meta)
            .await
    }

    pub async fn start_level(&self, name: &str, meta: MetaMap) -> bool {
        self.start_timed(TimedKind::Level, name, meta).await
    }

    pub async fn complete_level(&self, name: &str, status: &str, meta: MetaMap) -> bool {
        let extras = CallExtras {
            status: Some(status.to_string()),
            ..Default::default()
        };
        self.complete_timed(TimedKind::Level, name, extras, meta)
            .await
    }

    pub async fn start_timed_event(&self, name: &str, meta: MetaMap) -> bool {
        self.start_timed(TimedKind::TimedEvent, name, meta).await
    }

    pub async fn complete_timed_event(&self, name: &str, meta: MetaMap) -> bool {
        self.complete_timed(TimedKind::TimedEvent, name, CallExtras::default(), meta)
            .await
    }

    // --- internals ---

    async fn start_timed(&self, kind: TimedKind, name: &str, meta: MetaMap) -> bool {
        let at_millis = self.clock.now().millis;
        if kind.queues_before_auth() && !self.is_authenticated().await {
            self.pending.lock().await.push_back(QueuedCall {
                phase: CallPhase::Start,
                kind,
                name: name.to_string(),
                meta,
                extras: CallExtras::default(),
                at_millis,
            });
            return true;
        }
        self.record_start(kind, name, at_millis).await;
        true
    }

    async fn complete_timed(
        &self,
        kind: TimedKind,
        name: &str,
        extras: CallExtras,
        meta: MetaMap,
    ) -> bool {
        let at_millis = self.clock.now().millis;
        if kind.queues_before_auth() && !self.is_authenticated().await {
            self.pending.lock().await.push_back(QueuedCall {
                phase: CallPhase::Complete,
                kind,
                name: name.to_string(),
                meta,
                extras,
                at_millis,
            });
            return true;
        }
        let event = self.build_completion(kind, name, extras, meta, at_millis).await;
        self.send_to_dispatcher(Outgoing::Event(event)).await
    }

    /// Merge the super-metadata map under the call's own metadata.
    async fn merged_meta(&self, meta: MetaMap) -> MetaMap {
        let stamped = self.super_meta.read().await.clone();
        if stamped.is_empty() {
            return meta;
        }
        let mut merged = stamped;
        for (key, value) in meta.iter() {
            merged.set(key, value);
        }
        merged
    }

    pub(crate) async fn record_start(&self, kind: TimedKind, name: &str, at_millis: i64) {
        self.timers
            .lock()
            .await
            .entry(kind)
            .or_default()
            .insert(name.to_string(), at_millis);
        self.persist_running_events().await;
    }

    /// Consume-once lookup: a second Complete without a new Start finds
    /// nothing.
    async fn consume_start(&self, kind: TimedKind, name: &str) -> Option<i64> {
        let consumed = self.timers.lock().await.get_mut(&kind)?.remove(name);
        if consumed.is_some() {
            self.persist_running_events().await;
        }
        consumed
    }

    pub(crate) async fn build_completion(
        &self,
        kind: TimedKind,
        name: &str,
        extras: CallExtras,
        meta: MetaMap,
        at_millis: i64,
    ) -> Event {
        let mut meta = self.merged_meta(meta).await;
        let duration = match self.consume_start(kind, name).await {
            Some(start) => ((at_millis - start).max(0) / 1000).to_string(),
            None => "0".to_string(),
        };

        meta.set("type", kind.label());
        meta.set("verb", "completed");
        if let Some(field) = kind.name_field() {
            meta.set(field, name);
        }
        meta.set("duration", duration);
        if let Some(score) = extras.score {
            meta.set("score", score);
        }
        if let Some(result_options) = extras.result_options {
            meta.set("result_options", result_options);
        }
        if let Some(status) = extras.status {
            meta.set("status", status);
        }
        if let Some(interaction_type) = extras.interaction_type {
            meta.set("interaction_type", interaction_type);
        }

        let event_name = match kind {
            TimedKind::TimedEvent => name,
            _ => kind.label(),
        };
        let environment = self.environment.read().await.clone();
        Event::new(&self.clock, event_name, environment).with_meta(meta)
    }

    pub(crate) async fn replay_call(&self, call: QueuedCall) {
        match call.phase {
            CallPhase::Start => {
                self.record_start(call.kind, &call.name, call.at_millis).await;
            }
            CallPhase::Complete => {
                let event = self
                    .build_completion(call.kind, &call.name, call.extras, call.meta, call.at_millis)
                    .await;
                self.send_to_dispatcher(Outgoing::Event(event)).await;
            }
        }
    }
}
