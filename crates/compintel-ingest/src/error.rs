//! Error type for `compintel-ingest`.
//!
//! These are stage-level failures. The pipeline turns them into the
//! contained variants of [`compintel_core::Error`] when it records them.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected HTTP status {status} from {url}")]
  Status { url: String, status: u16 },

  #[error("feed parse error: {0}")]
  FeedParse(#[from] feed_rs::parser::ParseFeedError),

  #[error("invalid URL: {0}")]
  Url(#[from] url::ParseError),

  #[error("invalid pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("unsupported content type {0:?}")]
  ContentType(String),

  #[error("no text could be extracted")]
  EmptyContent,

  #[error("{stage} timed out after {}ms", .budget.as_millis())]
  Timeout { stage: &'static str, budget: Duration },

  #[error("classifier error: {0}")]
  Classifier(String),

  #[error(transparent)]
  Core(#[from] compintel_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_reports_sub_second_budgets() {
    let err = Error::Timeout { stage: "scrape", budget: Duration::from_millis(250) };
    assert_eq!(err.to_string(), "scrape timed out after 250ms");
  }
}
