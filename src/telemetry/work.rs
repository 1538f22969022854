//! Enrichment span helpers.
//!
//! One span per dequeued item, covering the pacing delay and the provider
//! call.

use tracing::Span;

use crate::model::{Outcome, WorkId};

/// Start a span for enriching one item.
///
/// The `enrich.outcome` field is declared empty and filled by
/// [`record_outcome`].
pub fn start_enrichment_span(provider: &str, id: WorkId, name: &str) -> Span {
    tracing::info_span!(
        "enrich.item",
        "enrich.provider" = provider,
        "enrich.id" = %id,
        "enrich.name" = name,
        "enrich.outcome" = tracing::field::Empty,
    )
}

/// Record the item's outcome on its span and emit an event scoped to it.
pub fn record_outcome(span: &Span, outcome: &Outcome) {
    span.record("enrich.outcome", outcome.label());
    span.in_scope(|| {
        tracing::info!(outcome = outcome.label(), "item_processed");
    });
}
