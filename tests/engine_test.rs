//! Integration tests for the enrichment queue.
//!
//! All tests run on tokio's paused clock; pacing and provider latency are
//! simulated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use addon_gallery::engine::{EnrichmentQueue, QueueConfig};
use addon_gallery::error::{Error, Result};
use addon_gallery::event::EventKind;
use addon_gallery::model::*;
use addon_gallery::provider::{EnrichmentProvider, FallbackProvider, fallback_record};
use async_trait::async_trait;
use tokio::time::Instant;

const PACING: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

/// Provider keyed by item name. Records every call with its start time.
#[derive(Default)]
struct FakeProvider {
    failing: Vec<String>,
    panicking: Vec<String>,
    records: HashMap<String, EnrichmentRecord>,
    latency: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeProvider {
    fn new() -> Self {
        Self::default()
    }

    fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    fn panicking(mut self, name: &str) -> Self {
        self.panicking.push(name.to_string());
        self
    }

    fn record(mut self, name: &str, record: EnrichmentRecord) -> Self {
        self.records.insert(name.to_string(), record);
        self
    }

    fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn called(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl EnrichmentProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        self.calls
            .lock()
            .unwrap()
            .push((request.name.clone(), Instant::now()));
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&request.name) {
            panic!("{} crashed the provider", request.name);
        }
        if self.failing.contains(&request.name) {
            return Err(Error::Provider(format!("{} is unavailable", request.name)));
        }
        Ok(self
            .records
            .get(&request.name)
            .cloned()
            .unwrap_or_else(|| record_for(&request.name)))
    }
}

fn record_for(name: &str) -> EnrichmentRecord {
    EnrichmentRecord {
        summary: format!("summary of {name}"),
        use_cases: vec!["Monitoring".to_string()],
        complexity: Complexity::Medium,
        business_value: format!("value of {name}"),
    }
}

fn item(id: u64) -> WorkItem {
    WorkItem::new(id, format!("addon-{id}"))
        .description("An add-on")
        .tags(["python"])
        .language("Python")
}

/// Paused-clock elapsed time, allowing for millisecond timer rounding.
fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

fn queue_with(provider: Arc<FakeProvider>) -> EnrichmentQueue<Arc<FakeProvider>> {
    EnrichmentQueue::new(
        provider,
        QueueConfig {
            pacing: PACING,
            ..QueueConfig::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Ordering and single flight
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn records_complete_in_fifo_order() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    let accepted = queue.enqueue_all((1..=5).map(item));
    assert_eq!(accepted, 5);
    queue.wait_idle().await;

    let snapshot = queue.snapshot();
    let expected: Vec<WorkId> = (1..=5).map(WorkId).collect();
    assert_eq!(snapshot.completion_order, expected);
    assert_eq!(
        provider.called(),
        (1..=5).map(|i| format!("addon-{i}")).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn at_most_one_item_in_flight() {
    let provider = Arc::new(FakeProvider::new().latency(Duration::from_millis(700)));
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all((1..=4).map(item));

    let mut saw_in_flight = false;
    for _ in 0..200 {
        let in_flight = queue.in_flight();
        assert!(in_flight.len() <= 1, "in flight: {in_flight:?}");
        saw_in_flight |= !in_flight.is_empty();
        if queue.snapshot().is_idle() && !queue.is_draining() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(saw_in_flight);
    assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(queue.snapshot().completed.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn in_flight_marker_is_visible_during_the_call() {
    let provider = Arc::new(FakeProvider::new().latency(Duration::from_secs(5)));
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1), item(2)]);

    // Pacing has elapsed, the provider call for item 1 is pending.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(queue.is_in_flight(WorkId(1)));
    assert!(!queue.is_in_flight(WorkId(2)));
    assert_eq!(queue.pending_len(), 1);
    assert!(queue.record(WorkId(1)).is_none());

    queue.wait_idle().await;
    assert!(!queue.is_in_flight(WorkId(1)));
    assert!(queue.record(WorkId(1)).is_some());
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn same_id_enqueued_twice_is_processed_once() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    // Before completion: both copies are accepted, the second is skipped.
    assert_eq!(queue.enqueue_all([item(1)]), 1);
    assert_eq!(queue.enqueue_all([item(1)]), 1);
    queue.wait_idle().await;

    // After completion: rejected at enqueue time.
    assert_eq!(queue.enqueue_all([item(1)]), 0);
    queue.wait_idle().await;

    assert_eq!(provider.called(), vec!["addon-1".to_string()]);
    assert_eq!(queue.snapshot().completed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn skipped_items_do_not_consume_pacing() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));
    let mut events = queue.subscribe();

    let start = Instant::now();
    queue.enqueue_all([item(1), item(1), item(2)]);
    queue.wait_idle().await;

    // Two provider calls, two pacing delays.
    assert_elapsed(start, 2 * PACING);
    assert_eq!(provider.called().len(), 2);

    let mut skipped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EventKind::ItemSkipped { id } = event.kind {
            skipped.push(id);
        }
    }
    assert_eq!(skipped, vec![WorkId(1)]);
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn provider_calls_are_paced() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    let start = Instant::now();
    queue.enqueue_all((1..=3).map(item));
    queue.wait_idle().await;

    let times = provider.call_times();
    assert_eq!(times.len(), 3);
    assert!(times[0] - start >= PACING);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= PACING);
    }
}

#[tokio::test(start_paused = true)]
async fn pacing_elapses_even_for_instant_providers() {
    let provider = Arc::new(FakeProvider::new());
    let queue = EnrichmentQueue::new(
        Arc::clone(&provider),
        QueueConfig {
            pacing: Duration::from_millis(250),
            ..QueueConfig::default()
        },
    );

    let start = Instant::now();
    queue.enqueue_all((1..=4).map(item));
    queue.wait_idle().await;

    assert_elapsed(start, Duration::from_secs(1));
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failure_does_not_halt_the_queue() {
    let provider = Arc::new(FakeProvider::new().failing("addon-1"));
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1), item(2)]);
    queue.wait_idle().await;

    assert!(queue.record(WorkId(1)).is_none());
    assert!(queue.record(WorkId(2)).is_some());

    let reason = queue.failure(WorkId(1)).expect("failure recorded");
    assert!(reason.contains("addon-1 is unavailable"), "reason: {reason}");
    assert!(queue.failure(WorkId(2)).is_none());
}

#[tokio::test(start_paused = true)]
async fn provider_panic_fails_only_that_item() {
    let provider = Arc::new(FakeProvider::new().panicking("addon-1"));
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1), item(2)]);
    tokio::time::timeout(Duration::from_secs(60), queue.wait_idle())
        .await
        .expect("queue stalled after a provider panic");

    assert!(queue.record(WorkId(1)).is_none());
    assert!(queue.failure(WorkId(1)).unwrap().contains("aborted"));
    assert!(!queue.is_in_flight(WorkId(1)));
    assert_eq!(queue.record(WorkId(2)), Some(record_for("addon-2")));
    assert!(!queue.is_draining());

    // The queue still accepts and drains new work.
    queue.enqueue_all([item(3)]);
    queue.wait_idle().await;
    assert!(queue.record(WorkId(3)).is_some());
}

#[tokio::test(start_paused = true)]
async fn failed_item_is_not_requeued() {
    let provider = Arc::new(FakeProvider::new().failing("addon-1"));
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1)]);
    queue.wait_idle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(provider.called(), vec!["addon-1".to_string()]);
    assert!(queue.snapshot().pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_provider_call_times_out() {
    let provider = Arc::new(FakeProvider::new().latency(Duration::from_secs(3600)));
    let queue = EnrichmentQueue::new(
        Arc::clone(&provider),
        QueueConfig {
            pacing: PACING,
            call_timeout: Some(Duration::from_secs(2)),
            ..QueueConfig::default()
        },
    );

    let start = Instant::now();
    queue.enqueue_all([item(1), item(2)]);
    queue.wait_idle().await;

    assert_elapsed(start, 2 * (PACING + Duration::from_secs(2)));
    assert!(queue.failure(WorkId(1)).unwrap().contains("timed out"));
    assert!(queue.failure(WorkId(2)).is_some());
    assert!(queue.in_flight().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fallback_provider_hides_failures_from_the_queue() {
    let inner = Arc::new(FakeProvider::new().failing("addon-1"));
    let queue = EnrichmentQueue::new(
        FallbackProvider::new(Arc::clone(&inner)),
        QueueConfig {
            pacing: PACING,
            ..QueueConfig::default()
        },
    );

    queue.enqueue_all([item(1)]);
    queue.wait_idle().await;

    let expected = fallback_record(&item(1).request());
    assert_eq!(queue.record(WorkId(1)), Some(expected));
    assert!(queue.failure(WorkId(1)).is_none());
}

// ---------------------------------------------------------------------------
// Re-entrancy
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn start_draining_while_active_is_a_no_op() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    let start = Instant::now();
    queue.enqueue_all([item(1), item(2)]);
    assert!(queue.is_draining());
    assert!(!queue.start_draining());
    assert!(!queue.clone().start_draining());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!queue.start_draining());

    queue.wait_idle().await;
    assert_elapsed(start, 2 * PACING);
    assert_eq!(provider.called().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn start_draining_on_empty_queue_does_nothing() {
    let queue = queue_with(Arc::new(FakeProvider::new()));

    assert!(!queue.start_draining());
    assert!(!queue.is_draining());
    queue.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn enqueue_while_draining_extends_the_same_pass() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1)]);
    tokio::time::sleep(Duration::from_millis(500)).await;
    queue.enqueue_all([item(2)]);
    queue.wait_idle().await;

    assert_eq!(queue.snapshot().completion_order, vec![WorkId(1), WorkId(2)]);
}

#[tokio::test(start_paused = true)]
async fn enqueue_after_idle_starts_a_new_pass() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1)]);
    queue.wait_idle().await;
    assert!(!queue.is_draining());

    queue.enqueue_all([item(2)]);
    assert!(queue.is_draining());
    queue.wait_idle().await;

    assert!(queue.record(WorkId(2)).is_some());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn events_follow_the_item_lifecycle() {
    let provider = Arc::new(FakeProvider::new());
    let queue = queue_with(Arc::clone(&provider));
    let mut events = queue.subscribe();

    queue.enqueue_all([item(7)]);

    let mut received = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        let idle = matches!(event.kind, EventKind::QueueIdle { .. });
        received.push(event);
        if idle {
            break;
        }
    }

    for pair in received.windows(2) {
        assert!(pair[1].seq > pair[0].seq);
    }

    let kinds: Vec<&EventKind> = received.iter().map(|e| &e.kind).collect();
    assert_eq!(kinds.len(), 4);
    assert_eq!(kinds[0], &EventKind::ItemQueued { id: WorkId(7) });
    assert_eq!(kinds[1], &EventKind::ItemStarted { id: WorkId(7) });
    assert!(matches!(kinds[2], EventKind::ItemEnriched { id, .. } if *id == WorkId(7)));
    assert_eq!(
        kinds[3],
        &EventKind::QueueIdle {
            completed: 1,
            failed: 0
        }
    );
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn one_success_one_failure_end_state() {
    let s1 = EnrichmentRecord {
        summary: "S1".to_string(),
        use_cases: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        complexity: Complexity::Low,
        business_value: "V1".to_string(),
    };
    let provider = Arc::new(
        FakeProvider::new()
            .record("addon-1", s1.clone())
            .failing("addon-2"),
    );
    let queue = queue_with(Arc::clone(&provider));

    queue.enqueue_all([item(1), item(2)]);
    queue.wait_idle().await;

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.completed.len(), 1);
    assert_eq!(snapshot.completed.get(&WorkId(1)), Some(&s1));
    assert!(snapshot.in_flight.is_empty());
    assert!(snapshot.pending.is_empty());
    assert!(!snapshot.draining);

    assert!(queue.record(WorkId(2)).is_none());
    assert!(!queue.is_in_flight(WorkId(2)));
    assert!(snapshot.failures.contains_key(&WorkId(2)));
}
