//! Spans for calls to a generative model.
//!
//! Field names follow the OpenTelemetry GenAI conventions where one exists
//! (`gen_ai.*`); the add-on name and response size are our own.

use tracing::Span;

/// Span around one `generate_content` call for the named add-on.
///
/// Response fields start empty; fill them with [`record_response`] once the
/// model answers.
pub fn start_generate_span(model: &str, provider: &str, addon: &str) -> Span {
    tracing::info_span!(
        "gen_ai.generate_content",
        "gen_ai.operation.name" = "generate_content",
        "gen_ai.request.model" = model,
        "gen_ai.provider.name" = provider,
        "gallery.addon" = addon,
        "gen_ai.response.chars" = tracing::field::Empty,
        "gen_ai.response.parsed" = tracing::field::Empty,
    )
}

/// Record the raw response size and whether it parsed into a record.
pub fn record_response(span: &Span, chars: usize, parsed: bool) {
    span.record("gen_ai.response.chars", chars as u64);
    span.record("gen_ai.response.parsed", parsed);
}
