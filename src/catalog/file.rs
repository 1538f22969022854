//! Offline catalog loaded from a TOML file.
//!
//! ```toml
//! [[repo]]
//! id = 42
//! name = "seeq-plot-curve"
//! description = "Fit curves to tabular data."
//! topics = ["visualization"]
//! language = "Python"
//! updated_at = "2024-01-02T00:00:00Z"
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{CatalogSource, Repo, finalize};
use crate::error::{Error, Result};

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "repo")]
    repos: Vec<Repo>,
}

pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse catalog TOML. Ids must be unique.
pub fn parse_catalog(content: &str) -> Result<Vec<Repo>> {
    let file: CatalogFile = toml::from_str(content)?;

    let mut seen = std::collections::HashSet::new();
    for repo in &file.repos {
        if !seen.insert(repo.id) {
            return Err(Error::Config(format!(
                "duplicate repo id {} ({})",
                repo.id, repo.name
            )));
        }
    }
    Ok(file.repos)
}

#[async_trait]
impl CatalogSource for FileCatalog {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<Repo>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!("cannot read catalog {}: {e}", self.path.display()))
        })?;
        let repos = parse_catalog(&content)?;
        info!(path = %self.path.display(), count = repos.len(), "loaded catalog file");
        Ok(finalize(repos))
    }
}
