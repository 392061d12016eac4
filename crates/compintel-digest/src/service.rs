//! The digest service and its background scheduler.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use compintel_core::{
  Error as CoreError, Result as CoreResult,
  digest::{DigestPayload, DigestWindow},
  kpi::{FeedKpis, InsightKpis},
  schedule::DigestSchedule,
  store::{FeedQuery, InsightQuery, IntelStore},
};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
  mailer::Mailer,
  render::{DigestRenderer, RenderedDigest},
};

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
  pub subject:  String,
  pub items:    usize,
  pub insights: usize,
  /// End of the delivered window; the next default window starts here.
  pub sent_at:  DateTime<Utc>,
}

impl DeliveryReport {
  pub fn message(&self) -> String {
    format!("Digest sent with {} items and {} insights", self.items, self.insights)
  }
}

pub struct DigestService<S, M> {
  store:    Arc<S>,
  mailer:   M,
  renderer: DigestRenderer,
  schedule: watch::Sender<DigestSchedule>,
}

impl<S: IntelStore, M: Mailer> DigestService<S, M> {
  /// Build the service, restoring the persisted schedule. `initial` is used
  /// (and persisted) only when no schedule was ever saved.
  pub async fn start(store: Arc<S>, mailer: M, initial: DigestSchedule) -> CoreResult<Self> {
    let schedule = match store.load_schedule().await.map_err(Into::<CoreError>::into)? {
      Some(saved) => saved,
      None => {
        store.save_schedule(initial).await.map_err(Into::<CoreError>::into)?;
        initial
      }
    };
    let renderer = DigestRenderer::new().map_err(CoreError::from)?;
    tracing::info!(
      frequency = %schedule.frequency,
      day_of_week = %schedule.day_of_week,
      "digest schedule loaded"
    );

    let (schedule, _) = watch::channel(schedule);
    Ok(Self { store, mailer, renderer, schedule })
  }

  // ─── Schedule ────────────────────────────────────────────────────────────

  pub fn schedule(&self) -> DigestSchedule { *self.schedule.borrow() }

  /// Replace the schedule. Invalid values leave the current one in place.
  pub async fn set_schedule(
    &self,
    frequency: &str,
    day_of_week: Option<&str>,
  ) -> CoreResult<DigestSchedule> {
    let schedule = DigestSchedule::parse(frequency, day_of_week)?;
    self.store.save_schedule(schedule).await.map_err(Into::<CoreError>::into)?;
    self.schedule.send_replace(schedule);
    tracing::info!(
      frequency = %schedule.frequency,
      day_of_week = %schedule.day_of_week,
      "digest schedule updated"
    );
    Ok(schedule)
  }

  // ─── Read models ─────────────────────────────────────────────────────────

  pub async fn feed_kpis(&self) -> CoreResult<FeedKpis> {
    self.store.feed_kpis(Utc::now()).await.map_err(Into::into)
  }

  pub async fn insight_kpis(&self) -> CoreResult<InsightKpis> {
    self.store.insight_kpis().await.map_err(Into::into)
  }

  /// Compile the digest for `window`, or for the default window (since the
  /// last digest, or the last seven days) when none is given.
  pub async fn compile(&self, window: Option<DigestWindow>) -> CoreResult<DigestPayload> {
    let window = match window {
      Some(window) => window,
      None => {
        let last = self.store.last_digest_at().await.map_err(Into::<CoreError>::into)?;
        DigestWindow::since_last(last, Utc::now())
      }
    };
    self.compile_window(window).await
  }

  async fn compile_window(&self, window: DigestWindow) -> CoreResult<DigestPayload> {
    let items = self
      .store
      .list_feed_items(&FeedQuery { since: Some(window.since), ..Default::default() })
      .await
      .map_err(Into::<CoreError>::into)?;
    let insights = self
      .store
      .list_insights(&InsightQuery { since: Some(window.since), ..Default::default() })
      .await
      .map_err(Into::<CoreError>::into)?;
    Ok(DigestPayload::compile(items, insights, window, window.until))
  }

  pub fn render(&self, payload: &DigestPayload) -> CoreResult<RenderedDigest> {
    Ok(self.renderer.render(payload)?)
  }

  // ─── Delivery ────────────────────────────────────────────────────────────

  /// Compile the default window and deliver it, even if it is empty.
  pub async fn send_now(&self) -> CoreResult<DeliveryReport> {
    let payload = self.compile(None).await?;
    self.deliver(payload).await
  }

  /// Deliver a digest if the schedule says one is due at `now`.
  ///
  /// `tolerance` is how early a check may run relative to the cadence; the
  /// scheduler passes half its check interval. A due but empty digest is not
  /// sent; the check still counts as the last digest so the next window
  /// starts at `now`.
  pub async fn run_due(
    &self,
    now: DateTime<Utc>,
    tolerance: Duration,
  ) -> CoreResult<Option<DeliveryReport>> {
    let last = self.store.last_digest_at().await.map_err(Into::<CoreError>::into)?;
    let tolerance = ChronoDuration::from_std(tolerance).unwrap_or(ChronoDuration::MAX);
    if !self.schedule().is_due(last, now, tolerance) {
      return Ok(None);
    }

    let payload = self.compile_window(DigestWindow::since_last(last, now)).await?;
    if payload.is_empty() {
      tracing::info!("digest due but nothing new to report");
      self
        .store
        .record_digest_sent(payload.window.until)
        .await
        .map_err(Into::<CoreError>::into)?;
      return Ok(None);
    }
    self.deliver(payload).await.map(Some)
  }

  async fn deliver(&self, payload: DigestPayload) -> CoreResult<DeliveryReport> {
    let rendered = self.render(&payload)?;
    self.mailer.deliver(&rendered).await?;

    let sent_at = payload.window.until;
    self.store.record_digest_sent(sent_at).await.map_err(Into::<CoreError>::into)?;
    Ok(DeliveryReport {
      subject: rendered.subject,
      items: payload.total_items,
      insights: payload.total_insights,
      sent_at,
    })
  }
}

/// Check every `every` whether a digest is due and send it, until `shutdown`
/// flips or its sender is dropped.
pub fn spawn_scheduler<S: IntelStore, M: Mailer>(
  service: Arc<DigestService<S, M>>,
  every: Duration,
  mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(every_secs = every.as_secs(), "digest scheduler started");

    loop {
      tokio::select! {
        _ = shutdown.changed() => break,
        _ = ticker.tick() => {}
      }
      match service.run_due(Utc::now(), every / 2).await {
        Ok(Some(report)) => tracing::info!("{}", report.message()),
        Ok(None) => tracing::debug!("no digest due"),
        Err(e) => tracing::error!(error = %e, "scheduled digest failed"),
      }
    }

    tracing::info!("digest scheduler stopped");
  })
}
