//! Core data model.
//!
//! A work item is one catalog entry waiting for an AI-written summary. An
//! enrichment record is what the provider produced for it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A catalog entry awaiting enrichment. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier; the repository id.
    pub id: WorkId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Primary language, when the source reports one.
    pub language: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<WorkId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            tags: Vec::new(),
            language: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// The descriptive attributes handed to an enrichment provider.
    pub fn request(&self) -> EnrichmentRequest {
        EnrichmentRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            language: self.language.clone(),
        }
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub u64);

impl From<u64> for WorkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Provider request / response
// ---------------------------------------------------------------------------

/// What an enrichment provider sees of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
}

/// Structured enrichment for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    /// One-sentence pitch.
    pub summary: String,
    pub use_cases: Vec<String>,
    pub complexity: Complexity,
    pub business_value: String,
}

// ---------------------------------------------------------------------------
// Complexity
// ---------------------------------------------------------------------------

/// Estimated technical complexity of an add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            other => Err(format!("unknown complexity: {other}")),
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Complexity::Low => "Low",
            Complexity::Medium => "Medium",
            Complexity::High => "High",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What the queue did with one dequeued item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Provider returned a record; it is now in the completed map.
    Enriched(EnrichmentRecord),
    /// Provider failed. No record is stored for the item.
    Failed { reason: String },
    /// A record already existed, so the provider was not called.
    Skipped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Enriched(_) => "enriched",
            Outcome::Failed { .. } => "failed",
            Outcome::Skipped => "skipped",
        }
    }
}
