//! GitHub catalog: an organization's public repositories.
//!
//! A failed or rejected listing request falls back to a small built-in
//! sample so the gallery is never empty.

use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::readme::{RAW_CONTENT_BASE, extract_readme_image, fallback_image, readme_url};
use super::{CatalogSource, License, Owner, Repo, finalize};
use crate::config::secrets::bearer;
use crate::error::{Error, Result};
use crate::telemetry::metrics;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("addon-gallery/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// GitHub's maximum page size; one page is enough for the gallery.
const PER_PAGE: u32 = 100;

pub struct GithubCatalog {
    client: Client,
    org: String,
    token: Option<SecretString>,
    api_base: String,
    raw_base: String,
}

impl GithubCatalog {
    pub fn new(org: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            org: org.into(),
            token: None,
            api_base: GITHUB_API_BASE.to_string(),
            raw_base: RAW_CONTENT_BASE.to_string(),
        })
    }

    /// Authenticate API requests; raises GitHub's rate limit.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_raw_base(mut self, base: impl Into<String>) -> Self {
        self.raw_base = base.into();
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn repos_url(&self) -> String {
        format!(
            "{}/users/{}/repos?per_page={PER_PAGE}&sort=updated",
            self.api_base.trim_end_matches('/'),
            self.org
        )
    }

    async fn fetch_remote(&self) -> Result<Vec<Repo>> {
        let mut request = self
            .client
            .get(self.repos_url())
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, bearer(token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!(
                "GitHub listing for {} returned {status}",
                self.org
            )));
        }
        Ok(response.json::<Vec<Repo>>().await?)
    }

    /// First image in the repo's readme, if the readme exists and has one.
    pub async fn readme_image(&self, repo: &Repo) -> Result<Option<String>> {
        let response = self
            .client
            .get(readme_url(&self.raw_base, repo))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let text = response.text().await?;
        Ok(extract_readme_image(&text, &repo.full_name, repo.branch()))
    }

    /// Set `image_url` on every repo that lacks one: the readme image when
    /// there is one, otherwise a stock image. Fetch errors are logged and
    /// fall through to the stock image.
    pub async fn attach_images(&self, repos: &mut [Repo]) {
        for repo in repos.iter_mut().filter(|r| r.image_url.is_none()) {
            let scraped = match self.readme_image(repo).await {
                Ok(image) => image,
                Err(e) => {
                    debug!(repo = %repo.full_name, error = %e, "readme fetch failed");
                    None
                }
            };
            let image = scraped.unwrap_or_else(|| fallback_image(repo).to_string());
            repo.image_url = Some(image);
        }
    }
}

#[async_trait]
impl CatalogSource for GithubCatalog {
    fn name(&self) -> &str {
        "github"
    }

    async fn fetch(&self) -> Result<Vec<Repo>> {
        let repos = match self.fetch_remote().await {
            Ok(repos) => {
                info!(org = %self.org, count = repos.len(), "fetched repositories");
                metrics::catalog_fetches().add(
                    1,
                    &[KeyValue::new("source", "github"), KeyValue::new("result", "ok")],
                );
                repos
            }
            Err(e) => {
                warn!(org = %self.org, error = %e, "repository listing failed, using sample catalog");
                metrics::catalog_fetches().add(
                    1,
                    &[
                        KeyValue::new("source", "github"),
                        KeyValue::new("result", "fallback"),
                    ],
                );
                sample_repos()
            }
        };
        Ok(finalize(repos))
    }
}

/// Built-in catalog used when GitHub cannot be reached.
pub fn sample_repos() -> Vec<Repo> {
    vec![Repo {
        id: 1,
        name: "seeq-python".to_string(),
        full_name: "seeq12/seeq-python".to_string(),
        html_url: "https://github.com/seeq12/seeq-python".to_string(),
        description: Some("The official Python SDK for Seeq Server.".to_string()),
        homepage: None,
        language: Some("Python".to_string()),
        topics: vec!["sdk".to_string(), "data-science".to_string()],
        stargazers_count: 45,
        forks_count: 20,
        has_pages: false,
        archived: false,
        default_branch: Some("master".to_string()),
        updated_at: "2023-10-25T00:00:00Z".parse().ok(),
        owner: Owner {
            login: "seeq12".to_string(),
            avatar_url: String::new(),
        },
        license: Some(License {
            name: "Apache License 2.0".to_string(),
            spdx_id: Some("Apache-2.0".to_string()),
        }),
        image_url: None,
    }]
}
