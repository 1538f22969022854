//! The enrichment queue: one item at a time, paced, never halted by failures.
//!
//! Items are drained in FIFO order by a single background task. Before each
//! provider call the task sleeps for the pacing interval, which keeps a
//! rate-limited provider from seeing bursts. A failed call leaves the item
//! without a record and the task moves on. Ids that already have a record are
//! skipped without a provider call or a pacing delay.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::config::DEFAULT_PACING;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::{EnrichmentRecord, EnrichmentRequest, Outcome, WorkId, WorkItem};
use crate::provider::EnrichmentProvider;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_outcome, start_enrichment_span};

use super::state::{QueueSnapshot, QueueState};

/// Configuration for the enrichment queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Sleep before every provider call.
    pub pacing: Duration,
    /// Upper bound on a single provider call. `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Events buffered per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            call_timeout: None,
            event_capacity: 256,
        }
    }
}

/// Paced, sequential enrichment queue.
///
/// Cheap to clone; clones share the same state and drain task. Methods that
/// may start draining spawn onto the current tokio runtime and must be called
/// from within one.
pub struct EnrichmentQueue<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for EnrichmentQueue<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P> {
    provider: P,
    config: QueueConfig,
    state: Mutex<QueueState>,
    events: broadcast::Sender<Event>,
    idle: watch::Sender<bool>,
}

impl<P: EnrichmentProvider + 'static> EnrichmentQueue<P> {
    pub fn new(provider: P, config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                state: Mutex::new(QueueState::default()),
                events,
                idle,
            }),
        }
    }

    /// Append items to the pending sequence and start draining.
    ///
    /// Items whose id already has a record are dropped. Returns how many
    /// items were accepted.
    pub fn enqueue_all<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let accepted = {
            let mut state = self.inner.lock();
            let mut accepted = 0;
            for item in items {
                if state.completed.contains_key(&item.id) {
                    debug!(id = %item.id, "already enriched, not enqueuing");
                    continue;
                }
                let id = item.id;
                state.pending.push_back(item);
                self.inner.emit(&mut state, EventKind::ItemQueued { id });
                accepted += 1;
            }
            accepted
        };

        metrics::items_enqueued().add(accepted as u64, &[]);
        debug!(accepted, "items enqueued");
        self.start_draining();
        accepted
    }

    /// Start the drain task unless it is already running or there is
    /// nothing to do. Returns whether a new task was started.
    pub fn start_draining(&self) -> bool {
        {
            let mut state = self.inner.lock();
            if state.draining {
                debug!("drain already active");
                return false;
            }
            if state.pending.is_empty() {
                return false;
            }
            state.draining = true;
            self.inner.idle.send_replace(false);
        }

        tokio::spawn(Arc::clone(&self.inner).drain());
        true
    }

    /// Resolve once pending is empty and nothing is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl<P> EnrichmentQueue<P> {
    /// Subscribe to queue events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub fn is_in_flight(&self, id: WorkId) -> bool {
        self.inner.lock().in_flight.contains(&id)
    }

    /// Ids currently being processed; zero or one.
    pub fn in_flight(&self) -> Vec<WorkId> {
        self.inner.lock().in_flight.iter().copied().collect()
    }

    /// The completed record for `id`, if any.
    pub fn record(&self, id: WorkId) -> Option<EnrichmentRecord> {
        self.inner.lock().completed.get(&id).cloned()
    }

    /// Why the last attempt for `id` failed, if it did.
    pub fn failure(&self, id: WorkId) -> Option<String> {
        self.inner.lock().failures.get(&id).cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.lock().snapshot()
    }
}

impl<P> Inner<P> {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, state: &mut QueueState, kind: EventKind) {
        // No subscribers is fine.
        let _ = self.events.send(state.event(kind));
    }
}

impl<P: EnrichmentProvider + 'static> Inner<P> {
    async fn drain(self: Arc<Self>) {
        debug!("drain started");
        loop {
            if let Some(item) = self.dequeue() {
                self.process(item).await;
            }
            if !self.continue_draining() {
                break;
            }
        }
    }

    /// Pop the next item that still needs work and mark it in flight.
    fn dequeue(&self) -> Option<WorkItem> {
        let mut state = self.lock();
        while let Some(item) = state.pending.pop_front() {
            if state.completed.contains_key(&item.id) {
                debug!(id = %item.id, "already enriched, skipping");
                let span = start_enrichment_span(self.provider.name(), item.id, &item.name);
                note_outcome(&span, &Outcome::Skipped);
                self.emit(&mut state, EventKind::ItemSkipped { id: item.id });
                continue;
            }
            state.in_flight.insert(item.id);
            self.emit(&mut state, EventKind::ItemStarted { id: item.id });
            return Some(item);
        }
        None
    }

    /// Release the draining flag after a step, then re-claim it if more work
    /// is pending. Both happen under one lock so no second task can start in
    /// between.
    fn continue_draining(&self) -> bool {
        let mut state = self.lock();
        state.draining = false;

        if !state.pending.is_empty() {
            state.draining = true;
            return true;
        }

        let completed = state.completed.len();
        let failed = state.failures.len();
        self.emit(&mut state, EventKind::QueueIdle { completed, failed });
        self.idle.send_replace(true);
        info!(completed, failed, "enrichment queue drained");
        false
    }

    async fn process(self: &Arc<Self>, item: WorkItem) {
        let span = start_enrichment_span(self.provider.name(), item.id, &item.name);

        let outcome = async {
            tokio::time::sleep(self.config.pacing).await;

            let started = Instant::now();
            let result = self.call_isolated(item.request()).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            metrics::provider_duration_ms().record(
                duration_ms as f64,
                &[KeyValue::new("provider", self.provider.name().to_string())],
            );
            self.finish(&item, result, duration_ms)
        }
        .instrument(span.clone())
        .await;

        note_outcome(&span, &outcome);
    }

    /// Run the provider call on its own task so a panic surfaces as a
    /// failed item instead of killing the drain loop.
    async fn call_isolated(
        self: &Arc<Self>,
        request: EnrichmentRequest,
    ) -> Result<EnrichmentRecord> {
        let inner = Arc::clone(self);
        let call = async move { inner.call_provider(&request).await };
        match tokio::spawn(call.in_current_span()).await {
            Ok(result) => result,
            Err(e) => Err(Error::Provider(format!("provider call aborted: {e}"))),
        }
    }

    async fn call_provider(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.enrich(request))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.provider.enrich(request).await,
        }
    }

    /// Store the result and clear the in-flight marker.
    fn finish(
        &self,
        item: &WorkItem,
        result: Result<EnrichmentRecord>,
        duration_ms: u64,
    ) -> Outcome {
        let mut state = self.lock();
        state.in_flight.remove(&item.id);

        match result {
            Ok(record) => {
                // First record for an id wins.
                let stored = state.completed.entry(item.id).or_insert(record).clone();
                state.completion_order.push(item.id);
                state.failures.remove(&item.id);
                info!(id = %item.id, name = %item.name, duration_ms, "item enriched");
                self.emit(
                    &mut state,
                    EventKind::ItemEnriched {
                        id: item.id,
                        record: stored.clone(),
                        duration_ms,
                    },
                );
                Outcome::Enriched(stored)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    id = %item.id,
                    name = %item.name,
                    error = %reason,
                    "enrichment failed, item left without a record"
                );
                state.failures.insert(item.id, reason.clone());
                self.emit(
                    &mut state,
                    EventKind::ItemFailed {
                        id: item.id,
                        reason: reason.clone(),
                        duration_ms,
                    },
                );
                Outcome::Failed { reason }
            }
        }
    }
}

fn note_outcome(span: &tracing::Span, outcome: &Outcome) {
    metrics::items_processed().add(1, &[KeyValue::new("outcome", outcome.label())]);
    record_outcome(span, outcome);
}
