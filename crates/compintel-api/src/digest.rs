//! Handlers for digest delivery and the digest schedule.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/send-digest-now` | 502 `{error}` if the transport fails |
//! | `GET`  | `/digest/preview` | Compiled payload for the default window, not sent |
//! | `GET`  | `/schedule` | Current schedule |
//! | `POST` | `/update-schedule` | Body: `{"frequency":"Weekly","day_of_week":"Monday"}` |

use axum::{Json, extract::State};
use compintel_core::{digest::DigestPayload, schedule::DigestSchedule, store::IntelStore};
use compintel_digest::{DeliveryReport, Mailer};
use compintel_ingest::Ingestor;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct Sent {
  pub message: String,
  pub report:  DeliveryReport,
}

/// `POST /send-digest-now`
pub async fn send_now<S, I, M>(State(state): State<AppState<S, I, M>>) -> Result<Json<Sent>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let report = state.digest.send_now().await?;
  Ok(Json(Sent { message: report.message(), report }))
}

#[derive(Debug, Serialize)]
pub struct Preview {
  pub subject: String,
  pub payload: DigestPayload,
}

/// `GET /digest/preview`
pub async fn preview<S, I, M>(
  State(state): State<AppState<S, I, M>>,
) -> Result<Json<Preview>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let payload = state.digest.compile(None).await?;
  Ok(Json(Preview { subject: compintel_digest::render::subject(&payload), payload }))
}

// ─── Schedule ────────────────────────────────────────────────────────────────

/// `GET /schedule`
pub async fn schedule<S, I, M>(State(state): State<AppState<S, I, M>>) -> Json<DigestSchedule>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  Json(state.digest.schedule())
}

#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
  #[serde(default)]
  pub frequency:   String,
  #[serde(alias = "dayOfWeek")]
  pub day_of_week: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleUpdated {
  pub message:  String,
  pub schedule: DigestSchedule,
}

/// `POST /update-schedule`
pub async fn update_schedule<S, I, M>(
  State(state): State<AppState<S, I, M>>,
  Json(body): Json<ScheduleBody>,
) -> Result<Json<ScheduleUpdated>, ApiError>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  let schedule = state
    .digest
    .set_schedule(&body.frequency, body.day_of_week.as_deref())
    .await?;

  let message = if schedule.frequency.uses_day_of_week() {
    format!("Digest schedule set to {} on {}.", schedule.frequency, schedule.day_of_week)
  } else {
    format!("Digest schedule set to {}.", schedule.frequency)
  };
  Ok(Json(ScheduleUpdated { message, schedule }))
}
