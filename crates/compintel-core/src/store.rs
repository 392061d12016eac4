//! The `IntelStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `compintel-store-sqlite`).
//! The pipeline, digest service and API depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  competitor::{Competitor, NewCompetitor},
  feed_item::{FeedItem, NewFeedItem, ReadStatus, Severity},
  insight::{Insight, InsightStatus, NewInsight},
  kpi::{FeedKpis, InsightKpis},
  schedule::DigestSchedule,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Ordering applied by [`IntelStore::list_feed_items`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrder {
  /// Most recently ingested first.
  #[default]
  Recent,
  /// Highest severity first, then most recent.
  Severity,
}

/// Parameters for [`IntelStore::list_feed_items`].
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
  pub competitor:   Option<String>,
  /// Only items at or above this severity.
  pub min_severity: Option<Severity>,
  pub status:       Option<ReadStatus>,
  /// Only items carrying this tag, compared case-insensitively.
  pub tag:          Option<String>,
  /// Only items ingested at or after this instant.
  pub since:        Option<DateTime<Utc>>,
  pub order:        FeedOrder,
  pub limit:        Option<usize>,
}

/// Parameters for [`IntelStore::list_insights`].
#[derive(Debug, Clone, Default)]
pub struct InsightQuery {
  pub competitor: Option<String>,
  pub status:     Option<InsightStatus>,
  /// Only insights created at or after this instant.
  pub since:      Option<DateTime<Utc>>,
}

/// What a competitor removal deleted along with the competitor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CascadeReport {
  pub feed_items: u64,
  pub insights:   u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a competitor intelligence store backend.
///
/// Feed items are written once and never content-mutated. Commits are
/// idempotent on (competitor, source URL); insights are idempotent on
/// (competitor, fingerprint). Each write is individually atomic.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait IntelStore: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Competitors ───────────────────────────────────────────────────────

  /// Register a competitor. Fails with a conflict if the name is taken and
  /// with a validation error if either URL is malformed.
  fn add_competitor(
    &self,
    input: NewCompetitor,
  ) -> impl Future<Output = Result<Competitor, Self::Error>> + Send + '_;

  fn get_competitor(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Competitor>, Self::Error>> + Send + '_;

  /// All competitors in registration order.
  fn list_competitors(
    &self,
  ) -> impl Future<Output = Result<Vec<Competitor>, Self::Error>> + Send + '_;

  /// Delete a competitor together with its feed items and insights.
  /// Fails with not-found if the name is unknown.
  fn remove_competitor(
    &self,
    name: String,
  ) -> impl Future<Output = Result<CascadeReport, Self::Error>> + Send + '_;

  // ── Feed items ────────────────────────────────────────────────────────

  /// Whether a feed item for (competitor, url) has already been committed.
  fn feed_item_exists(
    &self,
    competitor: String,
    source_url: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Commit a new feed item with `unread` status.
  ///
  /// Returns `None` (not an error) if an item with the same
  /// (competitor, source URL) already exists. The check-and-insert is atomic.
  fn commit_feed_item(
    &self,
    input: NewFeedItem,
  ) -> impl Future<Output = Result<Option<FeedItem>, Self::Error>> + Send + '_;

  fn get_feed_item(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<FeedItem>, Self::Error>> + Send + '_;

  fn list_feed_items<'a>(
    &'a self,
    query: &'a FeedQuery,
  ) -> impl Future<Output = Result<Vec<FeedItem>, Self::Error>> + Send + 'a;

  /// Toggle the read flag. Fails with not-found for an unknown id.
  fn set_read_status(
    &self,
    id: i64,
    status: ReadStatus,
  ) -> impl Future<Output = Result<FeedItem, Self::Error>> + Send + '_;

  // ── Insights ──────────────────────────────────────────────────────────

  /// Record a derived insight in `pending` status.
  ///
  /// Returns `None` if an insight with the same (competitor, fingerprint)
  /// already exists.
  fn record_insight(
    &self,
    input: NewInsight,
  ) -> impl Future<Output = Result<Option<Insight>, Self::Error>> + Send + '_;

  fn get_insight(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Insight>, Self::Error>> + Send + '_;

  /// Insights, most recently created first.
  fn list_insights<'a>(
    &'a self,
    query: &'a InsightQuery,
  ) -> impl Future<Output = Result<Vec<Insight>, Self::Error>> + Send + 'a;

  /// Move an insight between `pending` and `actioned`. Notes, when given,
  /// replace the current action notes; other fields are untouched.
  fn set_insight_status(
    &self,
    id: i64,
    status: InsightStatus,
    action_notes: Option<String>,
  ) -> impl Future<Output = Result<Insight, Self::Error>> + Send + '_;

  // ── Read models ───────────────────────────────────────────────────────

  fn feed_kpis(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<FeedKpis, Self::Error>> + Send + '_;

  fn insight_kpis(&self) -> impl Future<Output = Result<InsightKpis, Self::Error>> + Send + '_;

  // ── Digest settings ───────────────────────────────────────────────────

  /// The persisted schedule, if one was ever saved.
  fn load_schedule(
    &self,
  ) -> impl Future<Output = Result<Option<DigestSchedule>, Self::Error>> + Send + '_;

  fn save_schedule(
    &self,
    schedule: DigestSchedule,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn last_digest_at(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  fn record_digest_sent(
    &self,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
