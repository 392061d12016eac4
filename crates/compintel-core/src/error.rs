//! Error taxonomy shared by every layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input the caller can fix.
  #[error("validation error: {0}")]
  Validation(String),

  /// A uniqueness constraint was violated.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// The competitor's feed could not be retrieved or parsed.
  #[error("feed for {competitor} unavailable: {reason}")]
  SourceUnavailable { competitor: String, reason: String },

  /// A linked page could not be retrieved or yielded no text.
  #[error("failed to scrape {url}: {reason}")]
  Scrape { url: String, reason: String },

  /// The classification capability failed or exceeded its budget.
  #[error("classification failed: {0}")]
  ClassificationTimeout(String),

  /// The digest could not be handed to the delivery transport.
  #[error("digest delivery failed: {0}")]
  Delivery(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
