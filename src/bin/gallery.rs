//! gallery CLI: list the add-on catalog and enrich it with AI summaries.

use std::collections::HashMap;
use std::path::PathBuf;

use addon_gallery::catalog::{
    CatalogSource, FileCatalog, GithubCatalog, Repo, SortOrder, search, sort_repos,
};
use addon_gallery::config::Config;
use addon_gallery::engine::{EnrichmentQueue, QueueConfig};
use addon_gallery::event::{Event, EventKind};
use addon_gallery::llm::{GeminiProvider, gemini_client};
use addon_gallery::model::WorkId;
use addon_gallery::provider::{EnrichmentProvider, FallbackProvider};
use addon_gallery::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gallery", about = "Seeq add-on gallery catalog and AI enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog entries
    Catalog {
        #[command(flatten)]
        source: SourceArgs,
        /// Sort order: updated, stars or name
        #[arg(long, default_value = "updated")]
        sort: SortOrder,
        /// Resolve a display image for each entry from its readme
        #[arg(long)]
        images: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Enrich catalog entries with AI summaries, one at a time
    Enrich {
        #[command(flatten)]
        source: SourceArgs,
        /// Enrich at most this many entries
        #[arg(long)]
        limit: Option<usize>,
        /// Leave failed entries without a record instead of a default one
        #[arg(long)]
        no_fallback: bool,
        /// Print the final queue snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Read the catalog from a TOML file instead of GitHub
    #[arg(long)]
    file: Option<PathBuf>,
    /// Only entries whose name, description or topics contain this text
    #[arg(long)]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "addon-gallery".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Catalog {
            source,
            sort,
            images,
            json,
        } => cmd_catalog(&config, &source, sort, images, json).await,
        Command::Enrich {
            source,
            limit,
            no_fallback,
            json,
        } => cmd_enrich(&config, &source, limit, no_fallback, json).await,
    }
}

fn github_catalog(config: &Config) -> anyhow::Result<GithubCatalog> {
    let mut catalog = GithubCatalog::new(&config.org)?;
    if let Some(ref token) = config.github_token {
        catalog = catalog.with_token(SecretString::from(token.expose_secret().to_owned()));
    }
    Ok(catalog)
}

async fn load_catalog(config: &Config, args: &SourceArgs) -> anyhow::Result<Vec<Repo>> {
    let repos = match args.file {
        Some(ref path) => FileCatalog::new(path).fetch().await?,
        None => github_catalog(config)?.fetch().await?,
    };
    Ok(match args.search {
        Some(ref term) => search(&repos, term),
        None => repos,
    })
}

async fn cmd_catalog(
    config: &Config,
    source: &SourceArgs,
    sort: SortOrder,
    images: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut repos = load_catalog(config, source).await?;
    sort_repos(&mut repos, sort);
    if images {
        github_catalog(config)?.attach_images(&mut repos).await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }

    if repos.is_empty() {
        println!("No add-ons found.");
        return Ok(());
    }

    println!(
        "{:<10}  {:<36}  {:<12}  {:>5}  {:<10}  DESCRIPTION",
        "ID", "NAME", "LANGUAGE", "STARS", "UPDATED"
    );
    println!("{}", "-".repeat(110));
    for repo in &repos {
        let updated = repo
            .updated_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10}  {:<36}  {:<12}  {:>5}  {:<10}  {}",
            repo.id,
            truncate(&repo.name, 36),
            truncate(repo.language.as_deref().unwrap_or("-"), 12),
            repo.stargazers_count,
            updated,
            truncate(repo.description.as_deref().unwrap_or(""), 60),
        );
        if let Some(ref image) = repo.image_url {
            println!("{:<10}  image: {image}", "");
        }
    }
    println!("\n{} add-on(s)", repos.len());
    Ok(())
}

async fn cmd_enrich(
    config: &Config,
    source: &SourceArgs,
    limit: Option<usize>,
    no_fallback: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut repos = load_catalog(config, source).await?;
    if let Some(limit) = limit {
        repos.truncate(limit);
    }

    let gemini = GeminiProvider::new(
        gemini_client(config.require_gemini_key()?)?,
        &config.gemini_model,
    );
    let queue_config = QueueConfig {
        pacing: config.pacing,
        call_timeout: config.call_timeout,
        ..QueueConfig::default()
    };

    if no_fallback {
        run_enrichment(gemini, queue_config, &repos, json).await
    } else {
        run_enrichment(FallbackProvider::new(gemini), queue_config, &repos, json).await
    }
}

async fn run_enrichment<P: EnrichmentProvider + 'static>(
    provider: P,
    queue_config: QueueConfig,
    repos: &[Repo],
    json: bool,
) -> anyhow::Result<()> {
    let names: HashMap<WorkId, &str> = repos
        .iter()
        .map(|r| (WorkId(r.id), r.name.as_str()))
        .collect();

    let queue = EnrichmentQueue::new(provider, queue_config);
    let mut events = queue.subscribe();
    let accepted = queue.enqueue_all(repos.iter().map(Repo::work_item));
    info!(accepted, "enrichment started");

    while accepted > 0 {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !json {
                        print_event(&event, &names);
                    }
                    if matches!(event.kind, EventKind::QueueIdle { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping before the queue drained");
                break;
            }
        }
    }

    let snapshot = queue.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!(
            "\n{} enriched, {} failed, {} pending",
            snapshot.completed.len(),
            snapshot.failures.len(),
            snapshot.pending.len()
        );
    }
    Ok(())
}

fn print_event(event: &Event, names: &HashMap<WorkId, &str>) {
    let name = |id: &WorkId| names.get(id).copied().unwrap_or("?");

    match event.kind {
        EventKind::ItemStarted { ref id } => println!("... analyzing {}", name(id)),
        EventKind::ItemEnriched {
            ref id,
            ref record,
            duration_ms,
        } => {
            println!("{} ({}ms)", name(id), duration_ms);
            println!("  Summary:    {}", record.summary);
            println!("  Use cases:  {}", record.use_cases.join("; "));
            println!("  Complexity: {}", record.complexity);
            println!("  Value:      {}", record.business_value);
        }
        EventKind::ItemFailed { ref id, ref reason, .. } => {
            println!("{}: no summary ({reason})", name(id));
        }
        EventKind::ItemQueued { .. } | EventKind::ItemSkipped { .. } | EventKind::QueueIdle { .. } => {}
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
