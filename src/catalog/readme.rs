//! Display images: the first picture in a repo's readme, or a stock image
//! chosen from the repo's topics.

use std::sync::OnceLock;

use regex::Regex;

use super::Repo;

/// Base URL for raw file contents.
pub const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";

/// Stock images, keyed by theme.
pub mod stock {
    pub const PYTHON: &str = "https://images.unsplash.com/photo-1526374965328-7f61d4dc18c5?auto=format&fit=crop&w=800&q=80";
    pub const CHARTS: &str = "https://images.unsplash.com/photo-1551288049-bebda4e38f71?auto=format&fit=crop&w=800&q=80";
    pub const INDUSTRIAL: &str = "https://images.unsplash.com/photo-1581091226825-a6a2a5aee158?auto=format&fit=crop&w=800&q=80";
    pub const CONNECTOR: &str = "https://images.unsplash.com/photo-1451187580459-43490279c0fa?auto=format&fit=crop&w=800&q=80";
    pub const DOCS: &str = "https://images.unsplash.com/photo-1555066931-4365d14bab8c?auto=format&fit=crop&w=800&q=80";
    pub const DEFAULT: &str = "https://images.unsplash.com/photo-1518770660439-4636190af475?auto=format&fit=crop&w=800&q=80";
}

static MARKDOWN_IMAGE: OnceLock<Regex> = OnceLock::new();
static HTML_IMAGE: OnceLock<Regex> = OnceLock::new();

fn markdown_image() -> &'static Regex {
    MARKDOWN_IMAGE.get_or_init(|| {
        Regex::new(r"!\[[^\]\n]*\]\(([^)\n]*)\)").expect("markdown image pattern is valid")
    })
}

fn html_image() -> &'static Regex {
    HTML_IMAGE.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("html image pattern is valid")
    })
}

/// Raw URL of the repo's `README.md` on its default branch.
pub fn readme_url(raw_base: &str, repo: &Repo) -> String {
    format!(
        "{}/{}/{}/README.md",
        raw_base.trim_end_matches('/'),
        repo.full_name,
        repo.branch()
    )
}

/// First image referenced by a readme, as an absolute URL.
///
/// Markdown `![alt](url)` syntax wins over HTML `<img src>`, regardless of
/// position. Relative paths resolve against the repo's raw content.
pub fn extract_readme_image(text: &str, full_name: &str, branch: &str) -> Option<String> {
    let markdown = markdown_image()
        .captures(text)
        .and_then(|c| c.get(1))
        // `![alt](url "title")`: drop the title.
        .and_then(|m| m.as_str().split_whitespace().next())
        .map(|url| url.trim_matches(|c| c == '<' || c == '>'))
        .filter(|url| !url.is_empty());

    let url = match markdown {
        Some(url) => url,
        None => html_image()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|url| !url.is_empty())?,
    };

    Some(resolve_relative_url(url, full_name, branch))
}

/// Absolute `http(s)` URLs pass through; anything else is a path in the repo.
pub fn resolve_relative_url(url: &str, full_name: &str, branch: &str) -> String {
    if url.starts_with("http") {
        return url.to_string();
    }
    let path = url
        .strip_prefix("./")
        .or_else(|| url.strip_prefix('/'))
        .unwrap_or(url);
    format!("{RAW_CONTENT_BASE}/{full_name}/{branch}/{path}")
}

/// Stock image for a repo without a readme image.
///
/// Rules are checked in order: docs, python, cloud/connector, charts,
/// industrial, then the default.
pub fn fallback_image(repo: &Repo) -> &'static str {
    let topics = repo.topics.join(" ").to_lowercase();
    let language = repo.language.as_deref().unwrap_or_default().to_lowercase();
    let name = repo.name.to_lowercase();

    if name.contains("documentation") || topics.contains("docs") {
        stock::DOCS
    } else if topics.contains("python") || language.contains("python") || topics.contains("spy") {
        stock::PYTHON
    } else if topics.contains("azure") || topics.contains("cloud") || name.contains("connector") {
        stock::CONNECTOR
    } else if topics.contains("visualization") || name.contains("plot") || name.contains("chart")
    {
        stock::CHARTS
    } else if topics.contains("industrial") || topics.contains("asset") {
        stock::INDUSTRIAL
    } else {
        stock::DEFAULT
    }
}
