//! Catalog sources: where the list of add-ons comes from.
//!
//! A [`Repo`] is the subset of GitHub's repository JSON the gallery uses.
//! Sources return repos; [`Repo::work_item`] projects one onto the queue's
//! [`WorkItem`].

pub mod file;
pub mod github;
pub mod readme;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::WorkItem;

pub use file::FileCatalog;
pub use github::GithubCatalog;

// ---------------------------------------------------------------------------
// Repo
// ---------------------------------------------------------------------------

/// One add-on listing, shaped like a GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub has_pages: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub license: Option<License>,
    /// Display image, filled by readme scraping or the stock fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(default)]
    pub spdx_id: Option<String>,
}

impl Repo {
    /// The queue's view of this repo.
    pub fn work_item(&self) -> WorkItem {
        WorkItem {
            id: self.id.into(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.topics.clone(),
            language: self.language.clone(),
        }
    }

    /// Branch used for raw-content URLs.
    pub fn branch(&self) -> &str {
        self.default_branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or("master")
    }

    /// Case-insensitive match on name, description, or any topic.
    /// An empty term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
            || self.topics.iter().any(|t| t.to_lowercase().contains(&term))
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short source name for logs and metrics.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Repo>>;
}

/// Fill in derived fields and order newest first.
///
/// A repo that publishes pages but has no homepage gets the standard pages
/// URL as its homepage.
pub fn finalize(mut repos: Vec<Repo>) -> Vec<Repo> {
    for repo in &mut repos {
        if repo.homepage.as_deref().is_some_and(|h| h.trim().is_empty()) {
            repo.homepage = None;
        }
        if repo.has_pages && repo.homepage.is_none() && !repo.owner.login.is_empty() {
            repo.homepage = Some(format!(
                "https://{}.github.io/{}/",
                repo.owner.login, repo.name
            ));
        }
    }
    sort_repos(&mut repos, SortOrder::Updated);
    repos
}

// ---------------------------------------------------------------------------
// Listing helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently updated first; repos without a timestamp last.
    #[default]
    Updated,
    /// Most stars first.
    Stars,
    /// Name, ascending, case-insensitive.
    Name,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "updated" => Ok(SortOrder::Updated),
            "stars" => Ok(SortOrder::Stars),
            "name" => Ok(SortOrder::Name),
            other => Err(format!("unknown sort order: {other} (updated|stars|name)")),
        }
    }
}

/// Stable sort of `repos` in place.
pub fn sort_repos(repos: &mut [Repo], order: SortOrder) {
    match order {
        SortOrder::Updated => repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortOrder::Stars => repos.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count)),
        SortOrder::Name => repos.sort_by_key(|r| r.name.to_lowercase()),
    }
}

/// Repos matching `term`, in their original order.
pub fn search(repos: &[Repo], term: &str) -> Vec<Repo> {
    repos.iter().filter(|r| r.matches(term)).cloned().collect()
}
