//! Structured events emitted by the enrichment queue.
//!
//! Consumers subscribe to the event stream to update a display as records
//! arrive. Events are the queue's voice; the per-item `tracing` spans carry
//! the details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EnrichmentRecord, WorkId};

/// A structured event emitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ItemQueued {
        id: WorkId,
    },
    /// Dequeued but already enriched; the provider was not called.
    ItemSkipped {
        id: WorkId,
    },
    ItemStarted {
        id: WorkId,
    },
    ItemEnriched {
        id: WorkId,
        record: EnrichmentRecord,
        duration_ms: u64,
    },
    ItemFailed {
        id: WorkId,
        reason: String,
        duration_ms: u64,
    },
    /// Pending is empty and nothing is in flight.
    QueueIdle {
        completed: usize,
        failed: usize,
    },
}

impl EventKind {
    /// The item this event concerns, if any.
    pub fn work_id(&self) -> Option<WorkId> {
        match self {
            EventKind::ItemQueued { id }
            | EventKind::ItemSkipped { id }
            | EventKind::ItemStarted { id }
            | EventKind::ItemEnriched { id, .. }
            | EventKind::ItemFailed { id, .. } => Some(*id),
            EventKind::QueueIdle { .. } => None,
        }
    }
}
