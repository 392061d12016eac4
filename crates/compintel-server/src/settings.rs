//! Server configuration, deserialised from `config.toml` layered with
//! `COMPINTEL_*` environment variables. Every field has a default, so an
//! absent file yields a working local setup.

use std::{path::PathBuf, time::Duration};

use compintel_core::schedule::{DayOfWeek, DigestSchedule, Frequency};
use compintel_digest::SmtpSettings;
use compintel_ingest::PipelineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// Minutes between background ingestion batches; 0 disables the poller.
  pub poll_interval_minutes: u64,
  pub pipeline:              PipelineSettings,
  pub classifier:            ClassifierSettings,
  pub digest:                DigestSettings,
  /// Absent means digests are logged instead of mailed.
  pub smtp:                  Option<SmtpSettings>,
  pub seed_competitors:      Vec<SeedCompetitor>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "0.0.0.0".to_string(),
      port:                  5000,
      store_path:            PathBuf::from("compintel.db"),
      poll_interval_minutes: 60,
      pipeline:              PipelineSettings::default(),
      classifier:            ClassifierSettings::default(),
      digest:                DigestSettings::default(),
      smtp:                  None,
      seed_competitors:      default_seeds(),
    }
  }
}

impl ServerConfig {
  /// Reject settings that would make every run fail.
  pub fn validate(&self) -> anyhow::Result<()> {
    let p = &self.pipeline;
    for (key, secs) in [
      ("fetch_timeout_secs", p.fetch_timeout_secs),
      ("scrape_timeout_secs", p.scrape_timeout_secs),
      ("classify_timeout_secs", p.classify_timeout_secs),
    ] {
      anyhow::ensure!(secs > 0, "pipeline.{key} must be at least 1");
    }
    Ok(())
  }

  pub fn poll_interval(&self) -> Option<Duration> {
    (self.poll_interval_minutes > 0).then(|| Duration::from_secs(self.poll_interval_minutes * 60))
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  pub concurrency:           usize,
  pub entry_limit:           usize,
  pub entry_workers:         usize,
  pub fetch_timeout_secs:    u64,
  pub scrape_timeout_secs:   u64,
  pub classify_timeout_secs: u64,
}

impl Default for PipelineSettings {
  fn default() -> Self { Self::from(&PipelineConfig::default()) }
}

impl From<&PipelineConfig> for PipelineSettings {
  fn from(c: &PipelineConfig) -> Self {
    Self {
      concurrency:           c.concurrency,
      entry_limit:           c.entry_limit,
      entry_workers:         c.entry_workers,
      fetch_timeout_secs:    c.fetch_timeout.as_secs(),
      scrape_timeout_secs:   c.scrape_timeout.as_secs(),
      classify_timeout_secs: c.classify_timeout.as_secs(),
    }
  }
}

impl From<&PipelineSettings> for PipelineConfig {
  fn from(s: &PipelineSettings) -> Self {
    Self {
      concurrency:      s.concurrency.max(1),
      entry_limit:      s.entry_limit,
      entry_workers:    s.entry_workers.max(1),
      fetch_timeout:    Duration::from_secs(s.fetch_timeout_secs),
      scrape_timeout:   Duration::from_secs(s.scrape_timeout_secs),
      classify_timeout: Duration::from_secs(s.classify_timeout_secs),
    }
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
  #[default]
  Keyword,
  Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
  pub backend:    ClassifierKind,
  pub ollama_url: String,
  pub model:      String,
}

impl Default for ClassifierSettings {
  fn default() -> Self {
    Self {
      backend:    ClassifierKind::Keyword,
      ollama_url: "http://localhost:11434".to_string(),
      model:      "gemma:2b".to_string(),
    }
  }
}

// ─── Digest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestSettings {
  pub recipient:              String,
  pub sender:                 String,
  /// Initial schedule, used only until one has been persisted.
  pub frequency:              Frequency,
  pub day_of_week:            DayOfWeek,
  pub check_interval_minutes: u64,
}

impl Default for DigestSettings {
  fn default() -> Self {
    Self {
      recipient:              "digest@localhost".to_string(),
      sender:                 "compintel@localhost".to_string(),
      frequency:              Frequency::default(),
      day_of_week:            DayOfWeek::default(),
      check_interval_minutes: 60,
    }
  }
}

impl DigestSettings {
  pub fn schedule(&self) -> DigestSchedule {
    DigestSchedule { frequency: self.frequency, day_of_week: self.day_of_week }
  }

  pub fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_minutes.max(1) * 60)
  }
}

// ─── Seeds ───────────────────────────────────────────────────────────────────

/// A competitor registered at startup unless it already exists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedCompetitor {
  pub name:        String,
  pub website:     String,
  pub rss:         String,
  #[serde(default)]
  pub description: String,
}

fn default_seeds() -> Vec<SeedCompetitor> {
  let seed = |name: &str, website: &str, rss: &str, description: &str| SeedCompetitor {
    name:        name.to_string(),
    website:     website.to_string(),
    rss:         rss.to_string(),
    description: description.to_string(),
  };
  vec![
    seed(
      "TechCrunch",
      "https://techcrunch.com",
      "http://feeds.feedburner.com/TechCrunch/",
      "Leading technology news and startup coverage.",
    ),
    seed(
      "The Verge",
      "https://www.theverge.com",
      "https://www.theverge.com/rss/index.xml",
      "Tech news, reviews, and culture.",
    ),
    seed(
      "VentureBeat AI",
      "https://venturebeat.com",
      "https://venturebeat.com/category/ai/feed/",
      "Transformative technology news for business leaders.",
    ),
  ]
}
