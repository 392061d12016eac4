//! Insights: curated observations derived from one or more feed items.
//!
//! Category and priority are fixed when the insight is derived. The only
//! mutable state is the action status (`pending ↔ actioned`) and its notes.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Category ────────────────────────────────────────────────────────────────

/// Open set of insight categories. New categories may come from the
/// classification capability; the built-in ones are provided as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
  pub const TREND: &'static str = "Trend";
  pub const THREAT: &'static str = "Threat";
  pub const RECOMMENDATION: &'static str = "Recommendation";

  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

  pub fn trend() -> Self { Self::new(Self::TREND) }

  pub fn threat() -> Self { Self::new(Self::THREAT) }

  pub fn recommendation() -> Self { Self::new(Self::RECOMMENDATION) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Priority ────────────────────────────────────────────────────────────────

/// Declared lowest-first so the derived [`Ord`] sorts high priority last.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum Priority {
  #[serde(rename = "Medium Priority")]
  #[strum(serialize = "Medium Priority")]
  Medium,
  #[serde(rename = "High Priority")]
  #[strum(serialize = "High Priority")]
  High,
}

// ─── Status state machine ────────────────────────────────────────────────────

/// Action status of an insight. `Pending` is initial; `Actioned` may always
/// be reverted to `Pending`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InsightStatus {
  #[default]
  Pending,
  Actioned,
}

impl InsightStatus {
  /// Parse a caller-supplied status value. Anything other than `pending` or
  /// `actioned` is a [`Error::Validation`].
  pub fn parse(raw: &str) -> Result<Self> {
    match raw.trim() {
      "pending" => Ok(Self::Pending),
      "actioned" => Ok(Self::Actioned),
      other => Err(Error::Validation(format!(
        "invalid insight status {other:?}; expected \"pending\" or \"actioned\""
      ))),
    }
  }
}

impl FromStr for InsightStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

// ─── Insight ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
  pub id:              i64,
  pub competitor:      String,
  pub title:           String,
  pub summary:         String,
  pub category:        Category,
  pub priority:        Priority,
  pub status:          InsightStatus,
  pub action_notes:    Option<String>,
  /// Feed items this insight was derived from.
  pub source_item_ids: Vec<i64>,
  /// Link to the most relevant source article, if any.
  pub source_url:      Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::IntelStore::record_insight`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInsight {
  pub competitor:      String,
  pub title:           String,
  pub summary:         String,
  pub category:        Category,
  pub priority:        Priority,
  pub source_item_ids: Vec<i64>,
  pub source_url:      Option<String>,
  /// Derivation key; an insight is recorded at most once per
  /// (competitor, fingerprint).
  pub fingerprint:     String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_accepts_only_the_two_states() {
    assert_eq!(InsightStatus::parse("pending").unwrap(), InsightStatus::Pending);
    assert_eq!(InsightStatus::parse("actioned").unwrap(), InsightStatus::Actioned);
    assert!(matches!(InsightStatus::parse("done"), Err(Error::Validation(_))));
    assert!(matches!(
      InsightStatus::parse("actioned_note_added"),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn priority_uses_display_labels() {
    assert_eq!(Priority::High.to_string(), "High Priority");
    assert_eq!(
      serde_json::to_string(&Priority::Medium).unwrap(),
      "\"Medium Priority\""
    );
    assert_eq!("High Priority".parse::<Priority>().unwrap(), Priority::High);
    assert!(Priority::High > Priority::Medium);
  }

  #[test]
  fn category_serialises_as_plain_string() {
    let json = serde_json::to_string(&Category::new("Hiring")).unwrap();
    assert_eq!(json, "\"Hiring\"");
  }
}
