//! Handlers for competitor registry endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/competitors` | Registration order |
//! | `POST`   | `/add-competitor` | Body: [`CreateBody`]; 201, 409 on a taken name |
//! | `DELETE` | `/competitors/{name}` | Cascades to feed items and insights; 404 if unknown |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use compintel_core::{
  competitor::{Competitor, NewCompetitor},
  store::IntelStore,
};
use compintel_digest::Mailer;
use compintel_ingest::Ingestor;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  AppState,
  error::{ApiError, store_error},
};

#[derive(Debug, Serialize)]
pub struct CompetitorView {
  pub name:        String,
  pub website:     String,
  pub rss:         String,
  pub description: String,
}

impl From<Competitor> for CompetitorView {
  fn from(c: Competitor) -> Self {
    Self { name: c.name, website: c.website, rss: c.rss, description: c.description }
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /competitors`
pub async fn list<S, I, M>(
  State(state): State<AppState<S, I, M>>,
) -> Result<Json<Vec<CompetitorView>>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let competitors = state.store.list_competitors().await.map_err(store_error)?;
  Ok(Json(competitors.into_iter().map(CompetitorView::from).collect()))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `competitor_name` is the older spelling of `name`. When a client sends
/// both, a non-blank `name` wins.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub name:            String,
  #[serde(default)]
  pub competitor_name: String,
  #[serde(default)]
  pub rss_link:        String,
  #[serde(default)]
  pub webpage_link:    String,
  #[serde(default)]
  pub description:     String,
}

impl CreateBody {
  fn into_new_competitor(self) -> NewCompetitor {
    let name = if self.name.trim().is_empty() { self.competitor_name } else { self.name };
    NewCompetitor::new(name, self.webpage_link, self.rss_link, self.description)
  }
}

/// `POST /add-competitor`, body: `{"name", "rss_link", "webpage_link", "description"}`
pub async fn create<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let competitor = state
    .store
    .add_competitor(body.into_new_competitor()).await.map_err(store_error)?;
  tracing::info!(competitor = %competitor.name, "competitor added");

  let message = format!("Competitor \"{}\" successfully added.", competitor.name);
  Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

// ─── Remove ──────────────────────────────────────────────────────────────────

/// `DELETE /competitors/{name}`
pub async fn remove<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let removed = state.store.remove_competitor(name.clone()).await.map_err(store_error)?;
  tracing::info!(
    competitor = %name,
    feed_items = removed.feed_items,
    insights = removed.insights,
    "competitor removed"
  );

  let message = format!(
    "Competitor \"{name}\" deleted with {} feed items and {} insights.",
    removed.feed_items, removed.insights
  );
  Ok(Json(json!({ "message": message, "removed": removed })))
}
