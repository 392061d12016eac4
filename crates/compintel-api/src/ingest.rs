//! Handlers that trigger ingestion.
//!
//! Partial failures (unreachable feeds, failed scrapes, classifier errors) are
//! reported in the summary with a 200. Only an unknown competitor is an error.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/fetch-and-summarize` | Body: `{"competitor_name":"..."}`; 404 if unknown |
//! | `POST` | `/fetch-all` | Every registered competitor |

use axum::{Json, extract::State};
use compintel_core::store::IntelStore;
use compintel_digest::Mailer;
use compintel_ingest::{BatchReport, Ingestor, RunReport};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RunBody {
  #[serde(default)]
  pub competitor_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunOutcome<R> {
  pub message: String,
  pub report:  R,
}

/// `POST /fetch-and-summarize`, body: `{"competitor_name":"TechFlow"}`
pub async fn one<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Json(body): Json<RunBody>,
) -> Result<Json<RunOutcome<RunReport>>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let name = body
    .competitor_name
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty())
    .ok_or_else(|| ApiError::Validation("competitor_name is required".into()))?;

  let report = state.ingestor.ingest_competitor(name).await?;
  Ok(Json(RunOutcome { message: report.message(), report }))
}

/// `POST /fetch-all`
pub async fn all<S, I, M>(
  State(state): State<AppState<S, I, M>>,
) -> Result<Json<RunOutcome<BatchReport>>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let report = state.ingestor.ingest_all().await?;
  Ok(Json(RunOutcome { message: report.message(), report }))
}
