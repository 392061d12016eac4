//! Competitor — a tracked organisation and the locators of its public content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// A tracked competitor. The name is the identity key and is chosen by the
/// user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
  pub name:        String,
  pub website:     String,
  pub rss:         String,
  pub description: String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::IntelStore::add_competitor`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCompetitor {
  pub name:        String,
  pub website:     String,
  pub rss:         String,
  #[serde(default)]
  pub description: String,
}

impl NewCompetitor {
  pub fn new(
    name: impl Into<String>,
    website: impl Into<String>,
    rss: impl Into<String>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      name:        name.into(),
      website:     website.into(),
      rss:         rss.into(),
      description: description.into(),
    }
  }

  /// Trim the fields and check that the name is present and both locators
  /// are absolute `http(s)` URLs.
  pub fn validate(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("competitor name must not be empty".into()));
    }
    let website = validate_url("website", &self.website)?;
    let rss = validate_url("rss", &self.rss)?;
    Ok(Self {
      name,
      website,
      rss,
      description: self.description.trim().to_owned(),
    })
  }
}

/// Parse `raw` as an absolute `http`/`https` URL with a host.
pub fn validate_url(field: &str, raw: &str) -> Result<String> {
  let raw = raw.trim();
  let url = Url::parse(raw)
    .map_err(|e| Error::Validation(format!("{field} is not a valid URL ({e}): {raw:?}")))?;
  if !matches!(url.scheme(), "http" | "https") {
    return Err(Error::Validation(format!(
      "{field} must use http or https, got {:?}",
      url.scheme()
    )));
  }
  if url.host_str().is_none_or(str::is_empty) {
    return Err(Error::Validation(format!("{field} has no host: {raw:?}")));
  }
  Ok(url.to_string())
}
