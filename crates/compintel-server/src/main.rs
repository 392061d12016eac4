//! compintel server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, registers the configured seed competitors and serves the JSON API
//! under `/api`. The feed poller and the digest scheduler run in the
//! background until Ctrl-C.
//!
//! # One-shot ingestion
//!
//! ```
//! cargo run -p compintel-server -- --once
//! ```

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use compintel_api::AppState;
use compintel_core::{Error as CoreError, competitor::NewCompetitor, store::IntelStore};
use compintel_digest::{DigestService, LogMailer, MailerBackend, SmtpMailer, spawn_scheduler};
use compintel_ingest::{
  ClassifierBackend, HttpFeedSource, HttpScraper, KeywordClassifier, OllamaClassifier, Pipeline,
  PipelineConfig, spawn_poller,
};
use compintel_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{ClassifierKind, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Competitor intelligence tracker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Ingest every competitor once, print the summary and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COMPINTEL").separator("__"))
    .build()
    .context("failed to read config file")?;

  let cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  cfg.validate().context("invalid configuration")?;

  // Open SQLite store.
  let store_path = expand_tilde(&cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  seed_competitors(&store, &cfg).await?;

  // Ingestion pipeline.
  let pipeline_cfg = PipelineConfig::from(&cfg.pipeline);
  let classifier = match cfg.classifier.backend {
    ClassifierKind::Keyword => ClassifierBackend::Keyword(KeywordClassifier),
    ClassifierKind::Ollama => ClassifierBackend::Ollama(
      OllamaClassifier::new(
        &cfg.classifier.ollama_url,
        cfg.classifier.model.clone(),
        pipeline_cfg.classify_timeout,
      )
      .context("invalid classifier settings")?,
    ),
  };
  let pipeline = Arc::new(Pipeline::new(
    store.clone(),
    HttpFeedSource::new(pipeline_cfg.fetch_timeout).context("failed to build feed client")?,
    HttpScraper::new(pipeline_cfg.scrape_timeout).context("failed to build scraper")?,
    classifier,
    pipeline_cfg,
  ));

  if cli.once {
    let report = pipeline.run_all().await.context("ingestion failed")?;
    for run in &report.runs {
      println!("{}", run.message());
    }
    println!("{}", report.message());
    return Ok(());
  }

  // Digest service.
  let mailer = match &cfg.smtp {
    Some(smtp) => MailerBackend::Smtp(
      SmtpMailer::new(smtp, &cfg.digest.sender, &cfg.digest.recipient)
        .context("invalid SMTP settings")?,
    ),
    None => MailerBackend::Log(LogMailer::new(&cfg.digest.recipient)),
  };
  let digest = Arc::new(
    DigestService::start(store.clone(), mailer, cfg.digest.schedule())
      .await
      .context("failed to start digest service")?,
  );

  // Background tasks.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let poller = cfg
    .poll_interval()
    .map(|every| spawn_poller(pipeline.clone(), every, shutdown_rx.clone()));
  let scheduler = spawn_scheduler(digest.clone(), cfg.digest.check_interval(), shutdown_rx);

  let state = AppState { store, ingestor: pipeline, digest };
  let app = Router::new()
    .nest("/api", compintel_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("server error")?;

  if let Some(poller) = poller {
    poller.await.context("feed poller panicked")?;
  }
  scheduler.await.context("digest scheduler panicked")?;

  Ok(())
}

/// Register the configured seed competitors, skipping names already taken.
async fn seed_competitors(store: &SqliteStore, cfg: &ServerConfig) -> anyhow::Result<()> {
  for seed in &cfg.seed_competitors {
    let input = NewCompetitor::new(&seed.name, &seed.website, &seed.rss, &seed.description);
    match store.add_competitor(input).await.map_err(CoreError::from) {
      Ok(c) => tracing::info!(competitor = %c.name, "seeded competitor"),
      Err(CoreError::Conflict(_)) => tracing::debug!(competitor = %seed.name, "already registered"),
      Err(CoreError::Validation(reason)) => {
        tracing::warn!(competitor = %seed.name, %reason, "skipping invalid seed competitor");
      }
      Err(e) => return Err(e).with_context(|| format!("failed to seed {:?}", seed.name)),
    }
  }
  Ok(())
}

/// Resolve on Ctrl-C and tell the background tasks to stop.
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
  shutdown_on(tokio::signal::ctrl_c(), shutdown).await;
}

/// Wait for `signal`, then flip `shutdown`. If the signal cannot be listened
/// for, this never resolves and the server runs until killed.
async fn shutdown_on(
  signal: impl Future<Output = std::io::Result<()>>,
  shutdown: watch::Sender<bool>,
) {
  if let Err(e) = signal.await {
    tracing::warn!(error = %e, "failed to listen for Ctrl-C; graceful shutdown disabled");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
  shutdown.send_replace(true);
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn signal_flips_the_shutdown_flag() {
    let (tx, rx) = watch::channel(false);
    shutdown_on(async { Ok(()) }, tx).await;
    assert!(*rx.borrow());
  }

  #[tokio::test]
  async fn unavailable_signal_keeps_the_server_running() {
    let (tx, rx) = watch::channel(false);
    let failed = async { Err(std::io::Error::other("no signal handler")) };
    let waited = tokio::time::timeout(Duration::from_millis(50), shutdown_on(failed, tx)).await;
    assert!(waited.is_err());
    assert!(!*rx.borrow());
  }
}
