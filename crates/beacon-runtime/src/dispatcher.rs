use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use beacon_store::OutboxRecord;
use beacon_transport::{PostMode, PostOutcome};
use beacon_types::{AiProxy, Batch, Event, LogEntry, TakeCount, Telemetry, WireModel};
use beacon_wire::{DumpCategory, Endpoint, dump};

use crate::session::Session;

/// Depth of the submission channel; try_send beyond this rejects the
/// record rather than blocking the caller.
const QUEUE_DEPTH: usize = 256;

/// Message handed from the submission entry points to the worker.
#[derive(Debug)]
pub enum Outgoing {
    Event(Event),
    Log(LogEntry),
    Telemetry(Telemetry),
    /// Fire-immediately; bypasses the durable cache.
    AiProxy(AiProxy),
    /// Flush every kind now (sent on authentication).
    Flush,
    /// Drain and stop.
    Shutdown,
}

/// Cached record kinds the worker batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PendingKind {
    Event,
    Log,
    Telemetry,
}

impl PendingKind {
    const ALL: [PendingKind; 3] = [PendingKind::Event, PendingKind::Log, PendingKind::Telemetry];

    fn kind_name(&self) -> &'static str {
        match self {
            PendingKind::Event => <Event as Endpoint>::KIND,
            PendingKind::Log => <LogEntry as Endpoint>::KIND,
            PendingKind::Telemetry => <Telemetry as Endpoint>::KIND,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            PendingKind::Event => <Event as Endpoint>::PATH,
            PendingKind::Log => <LogEntry as Endpoint>::PATH,
            PendingKind::Telemetry => <Telemetry as Endpoint>::PATH,
        }
    }
}

/// Background send worker fed by a bounded channel.
///
/// Replaces unawaited fire-and-forget sends with explicit backpressure and
/// shutdown draining: submissions enqueue and return, the worker owns all
/// batching, straggler, and prune decisions.
pub struct Dispatcher;

impl Dispatcher {
    pub async fn start(session: Arc<Session>) -> DispatcherHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        session.attach_sender(tx.clone()).await;
        let worker = Worker::new(session).await;
        let join = tokio::spawn(worker.run(rx));
        DispatcherHandle { tx, join }
    }
}

/// Owner handle for the worker task.
pub struct DispatcherHandle {
    tx: mpsc::Sender<Outgoing>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Request a flush of everything currently cached.
    pub async fn flush(&self) {
        let _ = self.tx.send(Outgoing::Flush).await;
    }

    /// Drain the queue and stop the worker.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Outgoing::Shutdown).await;
        if let Err(err) = self.join.await {
            warn!(error = %err, "Dispatcher worker ended abnormally");
        }
    }
}

struct Worker {
    session: Arc<Session>,
    queues: HashMap<PendingKind, Batch<OutboxRecord>>,
}

impl Worker {
    /// Build the worker, recovering cached-but-unsent records from the
    /// durable outbox.
    async fn new(session: Arc<Session>) -> Self {
        let config = session.config_snapshot().await;
        let mut queues = HashMap::new();
        {
            let store = session.store.lock().await;
            for kind in PendingKind::ALL {
                let mut batch = Batch::new();
                if config.durable_cache {
                    match store.outbox_pending(kind.kind_name(), config.max_cached) {
                        Ok(records) => {
                            if !records.is_empty() {
                                debug!(
                                    kind = kind.kind_name(),
                                    count = records.len(),
                                    "Recovered cached records"
                                );
                            }
                            for record in records {
                                batch.push(record);
                            }
                        }
                        Err(err) => {
                            warn!(kind = kind.kind_name(), error = %err, "Outbox recovery failed");
                        }
                    }
                }
                queues.insert(kind, batch);
            }
        }
        Self { session, queues }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Outgoing>) {
        let straggler = Duration::from_millis(
            self.session.config_snapshot().await.straggler_timeout_ms,
        );
        let tick = Duration::from_millis((straggler.as_millis() as u64 / 4).clamp(50, 5_000));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Outgoing::Event(event)) => {
                        let record = to_record(&event, &event.base, PendingKind::Event);
                        self.enqueue(PendingKind::Event, record).await;
                    }
                    Some(Outgoing::Log(entry)) => {
                        let record = to_record(&entry, &entry.base, PendingKind::Log);
                        self.enqueue(PendingKind::Log, record).await;
                    }
                    Some(Outgoing::Telemetry(sample)) => {
                        let record = to_record(&sample, &sample.base, PendingKind::Telemetry);
                        self.enqueue(PendingKind::Telemetry, record).await;
                    }
                    Some(Outgoing::AiProxy(call)) => self.fire_ai_proxy(call).await,
                    Some(Outgoing::Flush) => self.flush_all().await,
                    Some(Outgoing::Shutdown) | None => {
                        self.flush_all().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush_due(straggler).await,
            }
        }
    }

    async fn enqueue(&mut self, kind: PendingKind, record: OutboxRecord) {
        let config = self.session.config_snapshot().await;

        if config.durable_cache {
            let store = self.session.store.lock().await;
            if let Err(err) =
                store.outbox_push(&record.id, kind.kind_name(), &record.body, record.created_ms)
            {
                warn!(kind = kind.kind_name(), error = %err, "Durable cache write failed");
            }
            let cutoff = record.created_ms - config.prune_age_hours as i64 * 3_600_000;
            if let Err(err) = store.outbox_prune(kind.kind_name(), cutoff, config.max_cached) {
                warn!(kind = kind.kind_name(), error = %err, "Outbox prune failed");
            }
        }

        let Some(batch) = self.queues.get_mut(&kind) else {
            return;
        };
        batch.push(record);

        if batch.count() >= config.batch_size_for(kind.kind_name()) {
            self.flush_kind(kind).await;
        }
    }

    /// Flush kinds that have a full batch or a straggler past its timeout.
    async fn flush_due(&mut self, straggler: Duration) {
        let now = self.session.clock().now().millis;
        let config = self.session.config_snapshot().await;

        for kind in PendingKind::ALL {
            let due = {
                let Some(batch) = self.queues.get(&kind) else {
                    continue;
                };
                let Some(oldest) = batch.iter_live().next() else {
                    continue;
                };
                batch.count() >= config.batch_size_for(kind.kind_name())
                    || now - oldest.created_ms >= straggler.as_millis() as i64
            };
            if due {
                self.flush_kind(kind).await;
            }
        }
    }

    async fn flush_all(&mut self) {
        for kind in PendingKind::ALL {
            self.flush_kind(kind).await;
        }
    }

    /// Send one kind's cached records in insertion order, batch by batch.
    async fn flush_kind(&mut self, kind: PendingKind) {
        if !self.session.is_authenticated().await {
            return;
        }
        let config = self.session.config_snapshot().await;
        let size = config.batch_size_for(kind.kind_name()).max(1);
        let batch_wait = Duration::from_millis(config.batch_wait_ms);

        loop {
            let claimed: Vec<OutboxRecord> = {
                let Some(batch) = self.queues.get_mut(&kind) else {
                    return;
                };
                batch
                    .take(TakeCount::Some(size))
                    .into_iter()
                    .cloned()
                    .collect()
            };
            if claimed.is_empty() {
                return;
            }

            let bodies: Vec<Value> = claimed.iter().map(|record| record.body.clone()).collect();
            let outcome = self
                .session
                .transport
                .post_raw(kind.path(), &bodies, PostMode::Batch)
                .await;

            let Some(batch) = self.queues.get_mut(&kind) else {
                return;
            };
            match outcome {
                Ok(PostOutcome::Delivered) => {
                    if config.durable_cache && !config.retain_after_sent {
                        let ids: Vec<String> =
                            claimed.iter().map(|record| record.id.clone()).collect();
                        let store = self.session.store.lock().await;
                        if let Err(err) = store.outbox_delete(&ids) {
                            warn!(kind = kind.kind_name(), error = %err, "Outbox delete failed");
                        }
                    }
                    batch.discard_taken();
                    batch.flush_deleted();
                    debug!(kind = kind.kind_name(), count = claimed.len(), "Batch delivered");
                }
                Ok(PostOutcome::Reauthenticated) => {
                    // Session renewed but delivery unconfirmed; retry on the
                    // next cycle.
                    batch.release_taken();
                    return;
                }
                Err(err) => {
                    warn!(kind = kind.kind_name(), error = %err, "Batch send failed");
                    batch.release_taken();
                    return;
                }
            }

            let remaining = self
                .queues
                .get(&kind)
                .map(|batch| batch.count())
                .unwrap_or(0);
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(batch_wait).await;
        }
    }

    /// AI proxy calls go straight out; outcomes are observable only in the
    /// log.
    async fn fire_ai_proxy(&self, call: AiProxy) {
        match self.session.transport.post(&[call], PostMode::Batch).await {
            Ok(PostOutcome::Delivered) => debug!("AI proxy call delivered"),
            Ok(PostOutcome::Reauthenticated) => {
                warn!("AI proxy call rejected, dropped after re-authentication")
            }
            Err(err) => warn!(error = %err, "AI proxy call failed"),
        }
    }
}

fn to_record<T: WireModel>(item: &T, base: &beacon_types::Record, kind: PendingKind) -> OutboxRecord {
    OutboxRecord {
        id: base.id.to_string(),
        kind: kind.kind_name().to_string(),
        body: dump(item, DumpCategory::ForBackend),
        created_ms: base.precise_timestamp,
    }
}
