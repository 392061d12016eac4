//! Feed items — ingested articles annotated with a summary, severity and tags.
//!
//! A feed item is written once by the pipeline. Its content never changes
//! afterwards; only the read/unread flag may be toggled.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Severity ────────────────────────────────────────────────────────────────

/// Urgency of a feed item.
///
/// Variants are declared lowest-first so the derived [`Ord`] matches the
/// total order `Critical > Medium > Normal > Error`.
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
#[strum(ascii_case_insensitive)]
pub enum Severity {
  /// Classification failed; the summary is a fallback of the input text.
  Error,
  Normal,
  Medium,
  Critical,
}

impl Severity {
  /// Numeric rank used for filtering and sorting.
  pub fn rank(self) -> u8 {
    match self {
      Self::Critical => 3,
      Self::Medium => 2,
      Self::Normal => 1,
      Self::Error => 0,
    }
  }

  pub fn from_rank(rank: u8) -> Option<Self> {
    match rank {
      3 => Some(Self::Critical),
      2 => Some(Self::Medium),
      1 => Some(Self::Normal),
      0 => Some(Self::Error),
      _ => None,
    }
  }
}

// ─── Read status ─────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReadStatus {
  #[default]
  Unread,
  Read,
}

// ─── Candidate & annotation ──────────────────────────────────────────────────

/// A raw entry parsed from a feed, before scraping, classification and
/// commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
  pub title:        String,
  /// Absolute URL of the linked article.
  pub link:         String,
  pub published_at: Option<DateTime<Utc>>,
}

/// Output of the classification capability for a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
  pub summary:  String,
  pub severity: Severity,
  pub tags:     BTreeSet<String>,
}

impl Annotation {
  /// Fallback annotation used when the classification capability fails:
  /// `Error` severity, no tags and a truncated copy of the input text.
  pub fn fallback(input: &str) -> Self {
    let summary = truncate_chars(input.trim(), FALLBACK_SUMMARY_CHARS);
    Self {
      summary: if summary.is_empty() { "(no content)".to_owned() } else { summary },
      severity: Severity::Error,
      tags: BTreeSet::new(),
    }
  }
}

/// Length of the fallback summary written when classification fails.
pub const FALLBACK_SUMMARY_CHARS: usize = 250;

/// Truncate `s` to at most `max` characters, appending an ellipsis when
/// anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    None => s.to_owned(),
    Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
  }
}

// ─── FeedItem ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
  pub id:           i64,
  pub competitor:   String,
  pub source_url:   String,
  pub title:        String,
  pub summary:      String,
  pub tags:         BTreeSet<String>,
  pub severity:     Severity,
  pub status:       ReadStatus,
  /// Server-assigned; never changes after creation.
  pub ingested_at:  DateTime<Utc>,
  pub published_at: Option<DateTime<Utc>>,
}

/// Input to [`crate::store::IntelStore::commit_feed_item`].
#[derive(Debug, Clone)]
pub struct NewFeedItem {
  pub competitor:   String,
  pub source_url:   String,
  pub title:        String,
  pub summary:      String,
  pub tags:         BTreeSet<String>,
  pub severity:     Severity,
  pub published_at: Option<DateTime<Utc>>,
}

impl NewFeedItem {
  pub fn new(competitor: &str, entry: CandidateEntry, annotation: Annotation) -> Self {
    Self {
      competitor:   competitor.to_owned(),
      source_url:   entry.link,
      title:        entry.title,
      summary:      annotation.summary,
      tags:         annotation.tags,
      severity:     annotation.severity,
      published_at: entry.published_at,
    }
  }
}

/// Sort `items` by severity descending, then most recent first.
pub fn sort_by_severity(items: &mut [FeedItem]) {
  items.sort_by(|a, b| {
    b.severity
      .cmp(&a.severity)
      .then_with(|| b.ingested_at.cmp(&a.ingested_at))
  });
}
