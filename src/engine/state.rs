//! Queue state shared between the drain task and readers.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventKind};
use crate::model::{EnrichmentRecord, WorkId, WorkItem};

/// Everything the queue knows. Guarded by one mutex that is never held
/// across an await.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// FIFO of items not yet dequeued.
    pub pending: VecDeque<WorkItem>,
    /// Zero or one id.
    pub in_flight: HashSet<WorkId>,
    pub completed: HashMap<WorkId, EnrichmentRecord>,
    /// Ids completed, in the order their records were stored.
    pub completion_order: Vec<WorkId>,
    /// Last failure reason per id. Cleared if the id later succeeds.
    pub failures: HashMap<WorkId, String>,
    /// Re-entrancy guard for the drain task.
    pub draining: bool,
    next_seq: u64,
}

impl QueueState {
    /// Stamp an event with the next sequence number.
    pub fn event(&mut self, kind: EventKind) -> Event {
        self.next_seq += 1;
        Event {
            seq: self.next_seq,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let mut in_flight: Vec<WorkId> = self.in_flight.iter().copied().collect();
        in_flight.sort();

        QueueSnapshot {
            pending: self.pending.iter().map(|item| item.id).collect(),
            in_flight,
            completed: self
                .completed
                .iter()
                .map(|(id, record)| (*id, record.clone()))
                .collect(),
            completion_order: self.completion_order.clone(),
            failures: self
                .failures
                .iter()
                .map(|(id, reason)| (*id, reason.clone()))
                .collect(),
            draining: self.draining,
        }
    }
}

/// Point-in-time copy of the queue, for display and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: Vec<WorkId>,
    pub in_flight: Vec<WorkId>,
    pub completed: BTreeMap<WorkId, EnrichmentRecord>,
    pub completion_order: Vec<WorkId>,
    pub failures: BTreeMap<WorkId, String>,
    pub draining: bool,
}

impl QueueSnapshot {
    /// Nothing pending, nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}
