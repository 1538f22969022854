//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on malformed values.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Organization whose repositories make up the community catalog.
pub const DEFAULT_ORG: &str = "seeq12";

/// Gemini model used when `GEMINI_MODEL` is unset.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Delay inserted before every provider call when `ENRICH_PACING_MS` is unset.
pub const DEFAULT_PACING: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct Config {
    /// Needed only by commands that talk to Gemini; see [`Config::require_gemini_key`].
    pub gemini_api_key: Option<SecretString>,
    pub github_token: Option<SecretString>,
    pub org: String,
    pub gemini_model: String,
    pub pacing: Duration,
    pub call_timeout: Option<Duration>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gemini_api_key: optional_var("GEMINI_API_KEY").map(SecretString::from),
            github_token: optional_var("GITHUB_TOKEN").map(SecretString::from),
            org: optional_var("GALLERY_ORG").unwrap_or_else(|| DEFAULT_ORG.to_string()),
            gemini_model: optional_var("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            pacing: parse_var::<u64>("ENRICH_PACING_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PACING),
            call_timeout: parse_var::<u64>("ENRICH_TIMEOUT_SECS")?.map(Duration::from_secs),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The Gemini API key, or a config error naming the missing variable.
    pub fn require_gemini_key(&self) -> Result<&SecretString> {
        self.gemini_api_key.as_ref().ok_or_else(|| {
            Error::Config("required environment variable GEMINI_API_KEY is not set".to_string())
        })
    }
}

/// Unset and empty are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}
