//! Enrichment provider boundary.
//!
//! A provider turns an item's descriptive attributes into an
//! [`EnrichmentRecord`]. The queue treats every provider the same way; it
//! cannot tell a real record from a substituted one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::model::{Complexity, EnrichmentRecord, EnrichmentRequest};

/// Summary used when neither the provider nor the item has anything better.
pub const FALLBACK_SUMMARY: &str = "An essential tool for the Seeq ecosystem.";
pub const FALLBACK_USE_CASES: [&str; 3] = ["Data Analysis", "Process Improvement", "Automation"];
pub const FALLBACK_BUSINESS_VALUE: &str =
    "Improves operational efficiency through better data handling.";

#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Short provider name for logs and spans.
    fn name(&self) -> &str;

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord>;
}

#[async_trait]
impl<P: EnrichmentProvider + ?Sized> EnrichmentProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        (**self).enrich(request).await
    }
}

/// The deterministic record substituted for a failed enrichment.
pub fn fallback_record(request: &EnrichmentRequest) -> EnrichmentRecord {
    let summary = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(FALLBACK_SUMMARY)
        .to_string();

    EnrichmentRecord {
        summary,
        use_cases: FALLBACK_USE_CASES.iter().map(|s| s.to_string()).collect(),
        complexity: Complexity::Medium,
        business_value: FALLBACK_BUSINESS_VALUE.to_string(),
    }
}

/// Wraps a provider so that failures become [`fallback_record`]s.
///
/// With this in front of a provider the queue never observes a failure.
pub struct FallbackProvider<P> {
    inner: P,
}

impl<P> FallbackProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

#[async_trait]
impl<P: EnrichmentProvider> EnrichmentProvider for FallbackProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentRecord> {
        match self.inner.enrich(request).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(
                    provider = self.inner.name(),
                    item = %request.name,
                    error = %e,
                    "enrichment failed, substituting fallback record"
                );
                Ok(fallback_record(request))
            }
        }
    }
}
