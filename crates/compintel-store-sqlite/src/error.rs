//! Error type for `compintel-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] compintel_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value that does not map onto a domain type.
  #[error("cannot decode column value: {0}")]
  Decode(String),

  #[error("competitor {0:?} already exists")]
  CompetitorExists(String),

  #[error("competitor {0:?} not found")]
  CompetitorNotFound(String),

  #[error("feed item {0} not found")]
  FeedItemNotFound(i64),

  #[error("insight {0} not found")]
  InsightNotFound(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for compintel_core::Error {
  fn from(e: Error) -> Self {
    use compintel_core::Error as Core;
    match e {
      Error::Core(inner) => inner,
      Error::CompetitorExists(name) => {
        Core::Conflict(format!("competitor \"{name}\" already exists"))
      }
      Error::CompetitorNotFound(name) => {
        Core::NotFound(format!("competitor \"{name}\" not found"))
      }
      Error::FeedItemNotFound(id) => Core::NotFound(format!("feed item {id} not found")),
      Error::InsightNotFound(id) => Core::NotFound(format!("insight {id} not found")),
      other => Core::Storage(Box::new(other)),
    }
  }
}
