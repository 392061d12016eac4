//! Handlers for `/insights` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/insights` | Optional `competitor`, `status`; returns insights plus KPIs |
//! | `PUT`  | `/insights/{id}/status` | Body: `{"status":"pending"\|"actioned", "action_notes"?}` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use compintel_core::{
  insight::{Insight, InsightStatus},
  kpi::InsightKpis,
  store::{InsightQuery, IntelStore},
};
use compintel_digest::Mailer;
use compintel_ingest::Ingestor;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, store_error},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub competitor: Option<String>,
  pub status:     Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InsightsPage {
  pub insights: Vec<Insight>,
  pub kpis:     InsightKpis,
}

/// `GET /insights[?competitor=..][&status=pending|actioned]`
///
/// The KPIs always cover every insight, regardless of the filters.
pub async fn list<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<InsightsPage>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let query = InsightQuery {
    competitor: params.competitor.filter(|c| !c.trim().is_empty()),
    status:     params.status.as_deref().map(InsightStatus::parse).transpose()?,
    since:      None,
  };
  let insights = state.store.list_insights(&query).await.map_err(store_error)?;
  let kpis = state.digest.insight_kpis().await?;
  Ok(Json(InsightsPage { insights, kpis }))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  #[serde(default)]
  pub status:       String,
  pub action_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdated {
  pub message: String,
  pub insight: Insight,
}

/// `PUT /insights/{id}/status`, body: `{"status":"actioned","action_notes":"..."}`
pub async fn set_status<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Path(id): Path<i64>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StatusUpdated>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let status = InsightStatus::parse(&body.status)?;
  let insight = state
    .store
    .set_insight_status(id, status, body.action_notes)
    .await
    .map_err(store_error)?;

  Ok(Json(StatusUpdated {
    message: format!("Insight {id} status updated to {status}."),
    insight,
  }))
}
