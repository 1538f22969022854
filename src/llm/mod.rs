//! Gemini-backed enrichment via rig-core.
//!
//! [`gemini_client`] builds a rig Gemini [`Client`] from a
//! [`SecretString`]-wrapped API key. [`GeminiProvider`] uses it to write the
//! gallery blurb for one add-on per call.
//!
//! # Example
//! ```no_run
//! use addon_gallery::llm::{GeminiProvider, gemini_client};
//! use secrecy::SecretString;
//!
//! let key = SecretString::from("AIza...");
//! let client = gemini_client(&key).expect("failed to create Gemini client");
//! let provider = GeminiProvider::new(client, "gemini-3-flash-preview");
//! ```
//!
//! [`Client`]: rig::providers::gemini::Client
//! [`SecretString`]: secrecy::SecretString

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{Instrument, Span, debug};

use crate::error::{Error, Result};
use crate::model::{Complexity, EnrichmentRecord, EnrichmentRequest};
use crate::provider::EnrichmentProvider;
use crate::telemetry::genai::{record_response, start_generate_span};

/// Use cases kept from a response; extra entries are dropped.
pub const MAX_USE_CASES: usize = 3;

const PREAMBLE: &str = "You are a Technical Product Manager at Seeq. \
You write short, accurate gallery listings for Seeq add-ons. \
Always answer with a single JSON object and nothing else.";

/// Create a Gemini client from a secret API key.
///
/// # Errors
/// Returns a config error if the underlying HTTP client cannot be constructed.
pub fn gemini_client(api_key: &SecretString) -> Result<rig::providers::gemini::Client> {
    rig::providers::gemini::Client::new(api_key.expose_secret())
        .map_err(|e| Error::Config(format!("failed to create Gemini client: {e}")))
}

/// Enrichment provider that asks a Gemini model for a gallery blurb.
///
/// Errors are returned as-is; wrap in [`crate::provider::FallbackProvider`]
/// to substitute a default record instead.
pub struct GeminiProvider {
    client: rig::providers::gemini::Client,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: rig::providers::gemini::Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EnrichmentProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        let span = start_generate_span(&self.model, self.name(), &request.name);
        let prompt = build_prompt(request);

        async {
            let agent = self.client.agent(&self.model).preamble(PREAMBLE).build();
            let text = agent
                .prompt(prompt.as_str())
                .await
                .map_err(|e| Error::Provider(e.to_string()))?;
            debug!(chars = text.len(), "gemini responded");
            let parsed = parse_analysis(&text);
            record_response(&Span::current(), text.len(), parsed.is_ok());
            parsed
        }
        .instrument(span)
        .await
    }
}

/// Build the analysis prompt for one add-on.
pub fn build_prompt(request: &EnrichmentRequest) -> String {
    let description = request
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description provided.");
    let language = request.language.as_deref().unwrap_or("Unknown");

    format!(
        "Analyze the following Seeq software add-on/repository and provide a structured \
enhancement for the gallery listing.

Repository: {name}
Description: {description}
Language: {language}
Topics: {topics}

1. Write a concise, 1-sentence \"AI Summary\" that sells the value.
2. List {MAX_USE_CASES} potential \"Use Cases\" for an industrial engineer.
3. Estimate \"Technical Complexity\" (Low/Medium/High) based on the language and nature of the tool.
4. Write a short \"Business Value\" statement.

Respond with JSON of the form:
{{\"aiSummary\": string, \"useCases\": [string], \"technicalComplexity\": \"Low\" | \"Medium\" | \"High\", \"businessValue\": string}}",
        name = request.name,
        topics = request.tags.join(", "),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    ai_summary: Option<String>,
    use_cases: Option<Vec<String>>,
    technical_complexity: Option<String>,
    business_value: Option<String>,
}

/// Parse a model response into a record.
///
/// Tolerates markdown code fences and prose around the JSON object. Missing
/// or empty required fields are a [`Error::MalformedResponse`].
pub fn parse_analysis(text: &str) -> Result<EnrichmentRecord> {
    let json = extract_json_object(text)
        .ok_or_else(|| Error::MalformedResponse("no JSON object in response".to_string()))?;
    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {e}")))?;

    let summary = required_text(raw.ai_summary, "aiSummary")?;
    let business_value = required_text(raw.business_value, "businessValue")?;

    let use_cases: Vec<String> = raw
        .use_cases
        .unwrap_or_default()
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .take(MAX_USE_CASES)
        .collect();
    if use_cases.is_empty() {
        return Err(Error::MalformedResponse("missing useCases".to_string()));
    }

    let complexity: Complexity = required_text(raw.technical_complexity, "technicalComplexity")?
        .parse()
        .map_err(Error::MalformedResponse)?;

    Ok(EnrichmentRecord {
        summary,
        use_cases,
        complexity,
        business_value,
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MalformedResponse(format!("missing {field}")))
}

/// The outermost `{ ... }` span of `text`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
