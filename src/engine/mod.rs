//! Enrichment engine: the paced single-worker queue and its state.

pub mod queue;
pub mod state;

pub use queue::{EnrichmentQueue, QueueConfig};
pub use state::QueueSnapshot;
