//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that string comparison orders them correctly.
//! Tag sets and id lists are stored as compact JSON. Severity is stored as
//! its numeric rank so it can be filtered and sorted in SQL.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use compintel_core::{
  competitor::Competitor,
  feed_item::{FeedItem, ReadStatus, Severity},
  insight::{Category, Insight, InsightStatus, Priority},
};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Stable identity of a feed item: hex SHA-256 of the competitor name and
/// source URL separated by a NUL byte.
pub fn identity_key(competitor: &str, source_url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(competitor.as_bytes());
  hasher.update([0u8]);
  hasher.update(source_url.as_bytes());
  hex::encode(hasher.finalize())
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Current time truncated to the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_severity(s: Severity) -> i64 { i64::from(s.rank()) }

pub fn decode_severity(rank: i64) -> Result<Severity> {
  u8::try_from(rank)
    .ok()
    .and_then(Severity::from_rank)
    .ok_or_else(|| Error::Decode(format!("unknown severity rank: {rank}")))
}

pub fn decode_read_status(s: &str) -> Result<ReadStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown read status: {s:?}")))
}

pub fn decode_insight_status(s: &str) -> Result<InsightStatus> {
  InsightStatus::parse(s).map_err(|_| Error::Decode(format!("unknown insight status: {s:?}")))
}

pub fn decode_priority(s: &str) -> Result<Priority> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown priority: {s:?}")))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &BTreeSet<String>) -> Result<String> { Ok(serde_json::to_string(tags)?) }

pub fn decode_tags(s: &str) -> Result<BTreeSet<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_ids(ids: &[i64]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_ids(s: &str) -> Result<Vec<i64>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const COMPETITOR_COLUMNS: &str = "name, website, rss, description, created_at";

/// Raw values read directly from a `competitors` row.
pub struct RawCompetitor {
  pub name:        String,
  pub website:     String,
  pub rss:         String,
  pub description: String,
  pub created_at:  String,
}

impl RawCompetitor {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      name:        row.get(0)?,
      website:     row.get(1)?,
      rss:         row.get(2)?,
      description: row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_competitor(self) -> Result<Competitor> {
    Ok(Competitor {
      name:        self.name,
      website:     self.website,
      rss:         self.rss,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const FEED_ITEM_COLUMNS: &str = "id, competitor, source_url, title, summary, tags, severity, \
                                     status, ingested_at, published_at";

/// Raw values read directly from a `feed_items` row.
pub struct RawFeedItem {
  pub id:           i64,
  pub competitor:   String,
  pub source_url:   String,
  pub title:        String,
  pub summary:      String,
  pub tags:         String,
  pub severity:     i64,
  pub status:       String,
  pub ingested_at:  String,
  pub published_at: Option<String>,
}

impl RawFeedItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      competitor:   row.get(1)?,
      source_url:   row.get(2)?,
      title:        row.get(3)?,
      summary:      row.get(4)?,
      tags:         row.get(5)?,
      severity:     row.get(6)?,
      status:       row.get(7)?,
      ingested_at:  row.get(8)?,
      published_at: row.get(9)?,
    })
  }

  pub fn into_feed_item(self) -> Result<FeedItem> {
    Ok(FeedItem {
      id:           self.id,
      competitor:   self.competitor,
      source_url:   self.source_url,
      title:        self.title,
      summary:      self.summary,
      tags:         decode_tags(&self.tags)?,
      severity:     decode_severity(self.severity)?,
      status:       decode_read_status(&self.status)?,
      ingested_at:  decode_dt(&self.ingested_at)?,
      published_at: self.published_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const INSIGHT_COLUMNS: &str = "id, competitor, title, summary, category, priority, status, \
                                   action_notes, source_item_ids, source_url, created_at";

/// Raw values read directly from an `insights` row.
pub struct RawInsight {
  pub id:              i64,
  pub competitor:      String,
  pub title:           String,
  pub summary:         String,
  pub category:        String,
  pub priority:        String,
  pub status:          String,
  pub action_notes:    Option<String>,
  pub source_item_ids: String,
  pub source_url:      Option<String>,
  pub created_at:      String,
}

impl RawInsight {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      competitor:      row.get(1)?,
      title:           row.get(2)?,
      summary:         row.get(3)?,
      category:        row.get(4)?,
      priority:        row.get(5)?,
      status:          row.get(6)?,
      action_notes:    row.get(7)?,
      source_item_ids: row.get(8)?,
      source_url:      row.get(9)?,
      created_at:      row.get(10)?,
    })
  }

  pub fn into_insight(self) -> Result<Insight> {
    Ok(Insight {
      id:              self.id,
      competitor:      self.competitor,
      title:           self.title,
      summary:         self.summary,
      category:        Category::new(self.category),
      priority:        decode_priority(&self.priority)?,
      status:          decode_insight_status(&self.status)?,
      action_notes:    self.action_notes,
      source_item_ids: decode_ids(&self.source_item_ids)?,
      source_url:      self.source_url,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
