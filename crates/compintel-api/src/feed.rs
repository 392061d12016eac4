//! Handlers for the dashboard feed and its KPIs.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/dashboard-feed` | Optional `competitor`, `min_severity`, `status`, `tag`, `limit` (20), `sort` (`recent` \| `severity`) |
//! | `GET`  | `/dashboard/kpis` | Unread, critical, last 24 hours |
//! | `PUT`  | `/feed/{id}/status` | Body: `{"status":"read"\|"unread"}` |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use compintel_core::{
  feed_item::{FeedItem, ReadStatus, Severity},
  kpi::FeedKpis,
  store::{FeedOrder, FeedQuery, IntelStore},
};
use compintel_digest::Mailer;
use compintel_ingest::Ingestor;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, store_error},
};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 500;

/// One row of the dashboard feed.
#[derive(Debug, Serialize)]
pub struct FeedEntry {
  pub id:         i64,
  pub competitor: String,
  pub time_ago:   String,
  pub title:      String,
  pub summary:    String,
  pub tags:       BTreeSet<String>,
  pub source_url: String,
  pub status:     ReadStatus,
  pub severity:   Severity,
}

impl FeedEntry {
  pub fn new(item: FeedItem, now: DateTime<Utc>) -> Self {
    Self {
      id:         item.id,
      competitor: item.competitor,
      time_ago:   time_ago(item.ingested_at, now),
      title:      item.title,
      summary:    item.summary,
      tags:       item.tags,
      source_url: item.source_url,
      status:     item.status,
      severity:   item.severity,
    }
  }
}

/// Relative rendering of `then` as seen from `now`, e.g. "5 minutes ago".
/// Anything older than four weeks is shown as a date.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let elapsed = now.signed_duration_since(then);
  let plural = |n: i64, unit: &str| {
    if n == 1 { format!("1 {unit} ago") } else { format!("{n} {unit}s ago") }
  };

  match elapsed.num_seconds() {
    s if s < 60 => "just now".to_owned(),
    s if s < 3_600 => plural(s / 60, "minute"),
    s if s < 86_400 => plural(s / 3_600, "hour"),
    s if s < 7 * 86_400 => plural(s / 86_400, "day"),
    s if s < 28 * 86_400 => plural(s / (7 * 86_400), "week"),
    _ => then.format("%Y-%m-%d").to_string(),
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub competitor:   Option<String>,
  pub min_severity: Option<String>,
  pub status:       Option<String>,
  pub tag:          Option<String>,
  pub limit:        Option<usize>,
  pub sort:         Option<String>,
}

impl ListParams {
  fn into_query(self) -> Result<FeedQuery, ApiError> {
    let min_severity = self
      .min_severity
      .map(|raw| {
        raw.parse::<Severity>().map_err(|_| {
          ApiError::Validation(format!(
            "invalid severity {raw:?}; expected Critical, Medium, Normal or Error"
          ))
        })
      })
      .transpose()?;
    let status = self.status.map(|raw| parse_read_status(&raw)).transpose()?;
    let order = match self.sort.as_deref() {
      None | Some("recent") => FeedOrder::Recent,
      Some("severity") => FeedOrder::Severity,
      Some(other) => {
        return Err(ApiError::Validation(format!(
          "invalid sort {other:?}; expected \"recent\" or \"severity\""
        )));
      }
    };

    Ok(FeedQuery {
      competitor: self.competitor.filter(|c| !c.trim().is_empty()),
      min_severity,
      status,
      tag: self.tag.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()),
      since: None,
      order,
      limit: Some(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
    })
  }
}

fn parse_read_status(raw: &str) -> Result<ReadStatus, ApiError> {
  raw.trim().parse().map_err(|_| {
    ApiError::Validation(format!("invalid read status {raw:?}; expected \"read\" or \"unread\""))
  })
}

/// `GET /dashboard-feed[?competitor=..][&min_severity=..][&status=..][&tag=..][&limit=..][&sort=..]`
pub async fn list<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<FeedEntry>>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let query = params.into_query()?;
  let items = state.store.list_feed_items(&query).await.map_err(store_error)?;
  let now = Utc::now();
  Ok(Json(items.into_iter().map(|i| FeedEntry::new(i, now)).collect()))
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

/// `GET /dashboard/kpis`
pub async fn kpis<S, I, M>(State(state): State<AppState<S, I, M>>) -> Result<Json<FeedKpis>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  Ok(Json(state.digest.feed_kpis().await?))
}

// ─── Read toggle ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  #[serde(default)]
  pub status: String,
}

/// `PUT /feed/{id}/status`, body: `{"status":"read"}`
pub async fn set_status<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Path(id): Path<i64>,
  Json(body): Json<StatusBody>,
) -> Result<Json<FeedEntry>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let status = parse_read_status(&body.status)?;
  let item = state.store.set_read_status(id, status).await.map_err(store_error)?;
  Ok(Json(FeedEntry::new(item, Utc::now())))
}
