//! Per-competitor ingestion pipeline and the bounded batch runner.
//!
//! One run walks fetch → dedup check → scrape → classify → commit for each
//! candidate entry, then derives insights. Entries of a competitor are
//! processed a few at a time, and competitors of a batch are processed up to
//! [`PipelineConfig::concurrency`] at a time.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use compintel_core::{
  Error as CoreError, Result as CoreResult,
  competitor::Competitor,
  feed_item::{Annotation, CandidateEntry, NewFeedItem},
  store::IntelStore,
};
use futures::{FutureExt as _, StreamExt as _, stream};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
  Error,
  classify::{Classifier, MIN_CLASSIFIABLE_CHARS},
  derive::derive_for_competitor,
  scrape::PageScraper,
  source::FeedSource,
};


#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Competitors processed at once during a batch.
  pub concurrency:      usize,
  /// Newest entries considered per feed per run.
  pub entry_limit:      usize,
  /// Entries of one competitor processed at once.
  pub entry_workers:    usize,
  pub fetch_timeout:    Duration,
  pub scrape_timeout:   Duration,
  pub classify_timeout: Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      concurrency:      4,
      entry_limit:      5,
      entry_workers:    3,
      fetch_timeout:    Duration::from_secs(20),
      scrape_timeout:   Duration::from_secs(15),
      classify_timeout: Duration::from_secs(60),
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Outcome of ingesting one competitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
  pub competitor:        String,
  /// Entries taken from the feed after the entry limit.
  pub candidates:        usize,
  pub new_items:         usize,
  pub already_known:     usize,
  pub scrape_failures:   usize,
  pub classify_failures: usize,
  pub new_insights:      usize,
  /// Set when the run could not process the competitor at all.
  pub failure:           Option<String>,
}

impl RunReport {
  fn failed(competitor: &str, reason: String) -> Self {
    Self { competitor: competitor.to_owned(), failure: Some(reason), ..Default::default() }
  }

  pub fn degraded(&self) -> usize { self.scrape_failures + self.classify_failures }

  /// Count every finished entry, then surface the first failure if any.
  fn tally(&mut self, outcomes: Vec<CoreResult<EntryOutcome>>) -> CoreResult<()> {
    let mut failure = None;
    for outcome in outcomes {
      match outcome {
        Ok(EntryOutcome::Known | EntryOutcome::Raced) => self.already_known += 1,
        Ok(EntryOutcome::Committed { scrape_failed, classify_failed }) => {
          self.new_items += 1;
          self.scrape_failures += usize::from(scrape_failed);
          self.classify_failures += usize::from(classify_failed);
        }
        Err(e) => failure = failure.or(Some(e)),
      }
    }
    failure.map_or(Ok(()), Err)
  }

  pub fn message(&self) -> String {
    if let Some(reason) = &self.failure {
      return format!("Could not ingest {}: {reason}", self.competitor);
    }
    format!(
      "Processed {} items for {}: {} new, {} already known, {} degraded ({} scrape, {} \
       classification), {} new insights",
      self.candidates,
      self.competitor,
      self.new_items,
      self.already_known,
      self.degraded(),
      self.scrape_failures,
      self.classify_failures,
      self.new_insights,
    )
  }
}

/// Outcome of ingesting every registered competitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
  /// One report per competitor, ordered by name.
  pub runs: Vec<RunReport>,
}

impl BatchReport {
  pub fn new_items(&self) -> usize { self.runs.iter().map(|r| r.new_items).sum() }

  pub fn failures(&self) -> usize { self.runs.iter().filter(|r| r.failure.is_some()).count() }

  pub fn message(&self) -> String {
    format!(
      "Ingested {} competitors: {} new items, {} unavailable",
      self.runs.len(),
      self.new_items(),
      self.failures(),
    )
  }
}

enum EntryOutcome {
  /// Already stored before this run looked at it.
  Known,
  /// A concurrent run committed the same entry first.
  Raced,
  Committed { scrape_failed: bool, classify_failed: bool },
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<S, F, P, C> {
  store:      Arc<S>,
  source:     F,
  scraper:    P,
  classifier: C,
  config:     PipelineConfig,
}

impl<S, F, P, C> Pipeline<S, F, P, C>
where
  S: IntelStore,
  F: FeedSource,
  P: PageScraper,
  C: Classifier,
{
  pub fn new(store: Arc<S>, source: F, scraper: P, classifier: C, config: PipelineConfig) -> Self {
    Self { store, source, scraper, classifier, config }
  }

  /// Ingest a single competitor by name.
  pub async fn run_competitor(&self, name: &str) -> CoreResult<RunReport> {
    let competitor = self
      .store
      .get_competitor(name.to_owned())
      .await
      .map_err(Into::<CoreError>::into)?
      .ok_or_else(|| CoreError::NotFound(format!("competitor {name:?}")))?;
    self.run(&competitor).await
  }

  /// Ingest every registered competitor. A failure of one competitor is
  /// recorded in its report and never aborts the others.
  pub async fn run_all(&self) -> CoreResult<BatchReport> {
    let competitors = self.store.list_competitors().await.map_err(Into::<CoreError>::into)?;
    let futures: Vec<_> = competitors.iter().map(|c| self.run_contained(c).boxed()).collect();
    let mut runs: Vec<RunReport> = stream::iter(futures)
      .buffer_unordered(self.config.concurrency.max(1))
      .collect()
      .await;
    runs.sort_by(|a, b| a.competitor.cmp(&b.competitor));

    let batch = BatchReport { runs };
    tracing::info!(
      competitors = batch.runs.len(),
      new_items = batch.new_items(),
      failures = batch.failures(),
      "ingestion batch finished"
    );
    Ok(batch)
  }

  /// Re-run insight derivation for one competitor over its recent items.
  pub async fn derive_insights(&self, name: &str) -> CoreResult<usize> {
    let known = self.store.get_competitor(name.to_owned()).await.map_err(Into::<CoreError>::into)?;
    if known.is_none() {
      return Err(CoreError::NotFound(format!("competitor {name:?}")));
    }
    derive_for_competitor(
      self.store.as_ref(),
      &self.classifier,
      name,
      self.config.classify_timeout,
      Utc::now(),
    )
    .await
  }

  async fn run_contained(&self, competitor: &Competitor) -> RunReport {
    match self.run(competitor).await {
      Ok(report) => report,
      Err(e) => {
        tracing::error!(competitor = %competitor.name, error = %e, "ingestion run failed");
        RunReport::failed(&competitor.name, e.to_string())
      }
    }
  }

  async fn run(&self, competitor: &Competitor) -> CoreResult<RunReport> {
    let entries = match self.fetch(competitor).await {
      Ok(entries) => entries,
      Err(e) => {
        tracing::warn!(competitor = %competitor.name, error = %e, "skipping competitor");
        return Ok(RunReport::failed(&competitor.name, e.to_string()));
      }
    };

    let entries: Vec<CandidateEntry> = entries.into_iter().take(self.config.entry_limit).collect();
    let mut report = RunReport {
      competitor: competitor.name.clone(),
      candidates: entries.len(),
      ..Default::default()
    };

    let outcomes: Vec<CoreResult<EntryOutcome>> = stream::iter(entries)
      .map(|entry| self.process_entry(competitor, entry).boxed())
      .buffer_unordered(self.config.entry_workers.max(1))
      .collect()
      .await;

    if let Err(e) = report.tally(outcomes) {
      tracing::warn!(
        competitor = %competitor.name,
        new_items = report.new_items,
        already_known = report.already_known,
        scrape_failures = report.scrape_failures,
        classify_failures = report.classify_failures,
        error = %e,
        "run aborted; the new items counted were stored"
      );
      return Err(e);
    }

    if report.new_items > 0 {
      report.new_insights = derive_for_competitor(
        self.store.as_ref(),
        &self.classifier,
        &competitor.name,
        self.config.classify_timeout,
        Utc::now(),
      )
      .await?;
    }

    tracing::info!(competitor = %competitor.name, "{}", report.message());
    Ok(report)
  }

  async fn fetch(&self, competitor: &Competitor) -> CoreResult<Vec<CandidateEntry>> {
    let budget = self.config.fetch_timeout;
    let result = match tokio::time::timeout(budget, self.source.fetch(competitor)).await {
      Ok(result) => result,
      Err(_) => Err(Error::Timeout { stage: "fetch", budget }),
    };
    result.map_err(|e| CoreError::SourceUnavailable {
      competitor: competitor.name.clone(),
      reason:     e.to_string(),
    })
  }

  async fn process_entry(
    &self,
    competitor: &Competitor,
    entry: CandidateEntry,
  ) -> CoreResult<EntryOutcome> {
    let known = self
      .store
      .feed_item_exists(competitor.name.clone(), entry.link.clone())
      .await
      .map_err(Into::<CoreError>::into)?;
    if known {
      return Ok(EntryOutcome::Known);
    }

    let (text, scrape_failed) = match self.scrape(&entry.link).await {
      Ok(body) => (format!("{}\n\n{body}", entry.title), false),
      Err(e) => {
        tracing::warn!(competitor = %competitor.name, error = %e, "using title only");
        (entry.title.clone(), true)
      }
    };
    let (annotation, fallback) = self.annotate(&text, &competitor.name).await;
    // A failed scrape already accounts for a title-only fallback.
    let classify_failed = fallback && !scrape_failed;

    let item = NewFeedItem::new(&competitor.name, entry, annotation);
    match self.store.commit_feed_item(item).await.map_err(Into::<CoreError>::into)? {
      Some(item) => {
        tracing::debug!(
          competitor = %item.competitor,
          id = item.id,
          severity = %item.severity,
          "committed feed item"
        );
        Ok(EntryOutcome::Committed { scrape_failed, classify_failed })
      }
      None => Ok(EntryOutcome::Raced),
    }
  }

  async fn scrape(&self, url: &str) -> CoreResult<String> {
    let budget = self.config.scrape_timeout;
    let result = match tokio::time::timeout(budget, self.scraper.scrape(url)).await {
      Ok(result) => result,
      Err(_) => Err(Error::Timeout { stage: "scrape", budget }),
    };
    result.map_err(|e| CoreError::Scrape { url: url.to_owned(), reason: e.to_string() })
  }

  /// Annotate `text`, falling back to an `Error`-severity annotation when the
  /// text is too short to classify or the classifier fails. The flag reports
  /// whether the fallback was used.
  async fn annotate(&self, text: &str, competitor: &str) -> (Annotation, bool) {
    if text.chars().count() < MIN_CLASSIFIABLE_CHARS {
      tracing::debug!(competitor, "not enough text to classify");
      return (Annotation::fallback(text), true);
    }

    let budget = self.config.classify_timeout;
    let result = match tokio::time::timeout(budget, self.classifier.annotate(text, competitor)).await
    {
      Ok(result) => result,
      Err(_) => Err(Error::Timeout { stage: "classification", budget }),
    };
    match result {
      Ok(annotation) => (annotation, false),
      Err(e) => {
        let err = CoreError::ClassificationTimeout(e.to_string());
        tracing::warn!(competitor, error = %err, "using fallback annotation");
        (Annotation::fallback(text), true)
      }
    }
  }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

/// Object the HTTP layer and the poller drive ingestion through.
pub trait Ingestor: Send + Sync + 'static {
  fn ingest_competitor(
    &self,
    name: String,
  ) -> impl Future<Output = CoreResult<RunReport>> + Send + '_;

  fn ingest_all(&self) -> impl Future<Output = CoreResult<BatchReport>> + Send + '_;
}

impl<S, F, P, C> Ingestor for Pipeline<S, F, P, C>
where
  S: IntelStore,
  F: FeedSource,
  P: PageScraper,
  C: Classifier,
{
  async fn ingest_competitor(&self, name: String) -> CoreResult<RunReport> {
    self.run_competitor(&name).await
  }

  async fn ingest_all(&self) -> CoreResult<BatchReport> { self.run_all().await }
}

/// Run [`Ingestor::ingest_all`] every `every`, starting immediately, until
/// `shutdown` flips or its sender is dropped. A batch in flight when shutdown
/// arrives is abandoned.
pub fn spawn_poller<I: Ingestor>(
  ingestor: Arc<I>,
  every: Duration,
  mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(every_secs = every.as_secs(), "feed poller started");

    loop {
      tokio::select! {
        _ = shutdown.changed() => break,
        _ = ticker.tick() => {}
      }
      tokio::select! {
        _ = shutdown.changed() => {
          tracing::info!("abandoning ingestion batch for shutdown");
          break;
        }
        result = ingestor.ingest_all() => {
          if let Err(e) = result {
            tracing::error!(error = %e, "scheduled ingestion failed");
          }
        }
      }
    }

    tracing::info!("feed poller stopped");
  })
}
