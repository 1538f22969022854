//! Tests for prompt construction, response parsing and the fallback provider.

use async_trait::async_trait;

use addon_gallery::error::{Error, Result};
use addon_gallery::llm::{build_prompt, parse_analysis};
use addon_gallery::model::{Complexity, EnrichmentRecord, EnrichmentRequest, WorkItem};
use addon_gallery::provider::{
    EnrichmentProvider, FALLBACK_BUSINESS_VALUE, FALLBACK_SUMMARY, FALLBACK_USE_CASES,
    FallbackProvider, fallback_record,
};

fn request(description: Option<&str>) -> EnrichmentRequest {
    let mut item = WorkItem::new(7u64, "seeq-plot-curve")
        .tags(["visualization", "python"])
        .language("Python");
    if let Some(d) = description {
        item = item.description(d);
    }
    item.request()
}

struct FailingProvider;

#[async_trait]
impl EnrichmentProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn enrich(&self, _request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        Err(Error::Provider("quota exceeded".to_string()))
    }
}

struct FixedProvider;

#[async_trait]
impl EnrichmentProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn enrich(&self, _request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        Ok(EnrichmentRecord {
            summary: "Curve fitting for Seeq.".to_string(),
            use_cases: vec!["Calibration".to_string()],
            complexity: Complexity::Low,
            business_value: "Fewer spreadsheets.".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

#[test]
fn prompt_includes_item_attributes() {
    let prompt = build_prompt(&request(Some("Fit curves to tabular data.")));
    assert!(prompt.contains("Repository: seeq-plot-curve"));
    assert!(prompt.contains("Description: Fit curves to tabular data."));
    assert!(prompt.contains("Language: Python"));
    assert!(prompt.contains("Topics: visualization, python"));
}

#[test]
fn prompt_defaults_missing_attributes() {
    let prompt = build_prompt(&WorkItem::new(1u64, "bare").request());
    assert!(prompt.contains("Description: No description provided."));
    assert!(prompt.contains("Language: Unknown"));
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_plain_json() {
    let record = parse_analysis(
        r#"{"aiSummary": "Plots curves.", "useCases": ["A", "B"], "technicalComplexity": "High", "businessValue": "Saves time."}"#,
    )
    .unwrap();
    assert_eq!(record.summary, "Plots curves.");
    assert_eq!(record.use_cases, vec!["A", "B"]);
    assert_eq!(record.complexity, Complexity::High);
    assert_eq!(record.business_value, "Saves time.");
}

#[test]
fn parses_fenced_json_with_surrounding_prose() {
    let text = "Here is the analysis:\n```json\n{\"aiSummary\": \"S\", \"useCases\": [\"U\"], \
                \"technicalComplexity\": \"low\", \"businessValue\": \"V\"}\n```\nHope it helps.";
    let record = parse_analysis(text).unwrap();
    assert_eq!(record.complexity, Complexity::Low);
    assert_eq!(record.use_cases, vec!["U"]);
}

#[test]
fn keeps_at_most_three_use_cases() {
    let record = parse_analysis(
        r#"{"aiSummary": "S", "useCases": ["1", "2", " ", "3", "4"], "technicalComplexity": "Medium", "businessValue": "V"}"#,
    )
    .unwrap();
    assert_eq!(record.use_cases, vec!["1", "2", "3"]);
}

#[test]
fn rejects_incomplete_responses() {
    let cases = [
        "no json here",
        "{not json}",
        r#"{"useCases": ["U"], "technicalComplexity": "Low", "businessValue": "V"}"#,
        r#"{"aiSummary": "  ", "useCases": ["U"], "technicalComplexity": "Low", "businessValue": "V"}"#,
        r#"{"aiSummary": "S", "useCases": [], "technicalComplexity": "Low", "businessValue": "V"}"#,
        r#"{"aiSummary": "S", "useCases": ["U"], "technicalComplexity": "Extreme", "businessValue": "V"}"#,
        r#"{"aiSummary": "S", "useCases": ["U"], "technicalComplexity": "Low"}"#,
    ];
    for text in cases {
        let err = parse_analysis(text).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)), "{text}: {err}");
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

#[test]
fn fallback_record_uses_description_as_summary() {
    let record = fallback_record(&request(Some("  Fit curves.  ")));
    assert_eq!(record.summary, "Fit curves.");
    assert_eq!(record.complexity, Complexity::Medium);
    assert_eq!(record.use_cases, FALLBACK_USE_CASES.to_vec());
    assert_eq!(record.business_value, FALLBACK_BUSINESS_VALUE);
}

#[test]
fn fallback_record_without_description_uses_stock_summary() {
    assert_eq!(fallback_record(&request(None)).summary, FALLBACK_SUMMARY);
    assert_eq!(fallback_record(&request(Some(""))).summary, FALLBACK_SUMMARY);
}

#[tokio::test]
async fn fallback_provider_replaces_errors() {
    let provider = FallbackProvider::new(FailingProvider);
    assert_eq!(provider.name(), "failing");

    let req = request(Some("Fit curves."));
    let record = provider.enrich(&req).await.unwrap();
    assert_eq!(record, fallback_record(&req));
}

#[tokio::test]
async fn fallback_provider_passes_successes_through() {
    let provider = FallbackProvider::new(FixedProvider);
    let record = provider.enrich(&request(None)).await.unwrap();
    assert_eq!(record.summary, "Curve fitting for Seeq.");
    assert_eq!(record.complexity, Complexity::Low);
}
