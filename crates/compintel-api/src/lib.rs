//! JSON API for the competitor intelligence tracker.
//!
//! Exposes an axum [`Router`] backed by any
//! [`compintel_core::store::IntelStore`], an [`Ingestor`] and a
//! [`DigestService`]. Transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", compintel_api::api_router(state))
//! ```

pub mod competitors;
pub mod digest;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod insights;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use compintel_core::store::IntelStore;
use compintel_digest::{DigestService, Mailer};
use compintel_ingest::Ingestor;

pub use error::ApiError;


// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, I, M> {
  pub store:    Arc<S>,
  pub ingestor: Arc<I>,
  pub digest:   Arc<DigestService<S, M>>,
}

impl<S, I, M> Clone for AppState<S, I, M> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      ingestor: self.ingestor.clone(),
      digest:   self.digest.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, I, M>(state: AppState<S, I, M>) -> Router<()>
where
  S: IntelStore,
  I: Ingestor,
  M: Mailer,
{
  Router::new()
    // Competitors
    .route("/competitors", get(competitors::list::<S, I, M>))
    .route("/add-competitor", post(competitors::create::<S, I, M>))
    .route("/competitors/{name}", delete(competitors::remove::<S, I, M>))
    // Ingestion
    .route("/fetch-and-summarize", post(ingest::one::<S, I, M>))
    .route("/fetch-all", post(ingest::all::<S, I, M>))
    // Feed
    .route("/dashboard-feed", get(feed::list::<S, I, M>))
    .route("/dashboard/kpis", get(feed::kpis::<S, I, M>))
    .route("/feed/{id}/status", put(feed::set_status::<S, I, M>))
    // Insights
    .route("/insights", get(insights::list::<S, I, M>))
    .route("/insights/{id}/status", put(insights::set_status::<S, I, M>))
    // Digest
    .route("/send-digest-now", post(digest::send_now::<S, I, M>))
    .route("/digest/preview", get(digest::preview::<S, I, M>))
    .route("/schedule", get(digest::schedule::<S, I, M>))
    .route("/update-schedule", post(digest::update_schedule::<S, I, M>))
    .with_state(state)
}
