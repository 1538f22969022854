//! Metric instrument factories for addon-gallery.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"addon-gallery"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for addon-gallery instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("addon-gallery")
}

/// Counter: items appended to the enrichment queue.
pub fn items_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("gallery.enrich.enqueued")
        .with_description("Number of items appended to the enrichment queue")
        .build()
}

/// Counter: dequeued items by result.
/// Labels: `outcome` ("enriched" | "failed" | "skipped").
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("gallery.enrich.processed")
        .with_description("Number of dequeued items by outcome")
        .build()
}

/// Histogram: provider call duration in milliseconds, excluding pacing.
/// Labels: `provider`.
pub fn provider_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("gallery.enrich.provider_duration_ms")
        .with_description("Enrichment provider call duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: catalog fetches.
/// Labels: `source`, `result` ("ok" | "fallback").
pub fn catalog_fetches() -> Counter<u64> {
    meter()
        .u64_counter("gallery.catalog.fetches")
        .with_description("Number of catalog fetches")
        .build()
}
