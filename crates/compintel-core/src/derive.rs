//! Deterministic rules that promote clusters of feed items into insights.
//!
//! Rules, evaluated per competitor over the items in [`DERIVATION_WINDOW`]:
//!
//! - every `Critical` item raises a `Threat` (high priority);
//! - a non-generic tag seen on at least [`TREND_MIN_RECURRENCE`] items raises
//!   a `Trend`, once per ISO week;
//! - a `Medium` item tagged pricing, launch or feature raises a
//!   `Recommendation` (medium priority).
//!
//! `Error`-severity items are ignored. Each rule produces a fingerprint so
//! that re-running derivation over the same items records nothing new.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::{
  feed_item::{FeedItem, Severity},
  insight::{Category, NewInsight, Priority},
};

/// How far back derivation looks for related items.
pub const DERIVATION_WINDOW: Duration = Duration::days(14);

/// Minimum number of distinct items sharing a tag before it counts as a
/// trend.
pub const TREND_MIN_RECURRENCE: usize = 3;

/// A trend seen on at least this many items is high priority.
pub const TREND_HIGH_PRIORITY_RECURRENCE: usize = 5;

/// Tags too broad to name a trend on their own.
pub const GENERIC_TAGS: &[&str] = &[
  "general", "product", "pricing", "update", "launch", "feature", "review", "analysis", "tech",
  "saas", "ai",
];

/// Tags that turn a medium item into a recommendation.
pub const ACTIONABLE_TAGS: &[&str] = &["pricing", "launch", "feature"];

pub fn is_generic_tag(tag: &str) -> bool { GENERIC_TAGS.contains(&tag) }

/// Apply the derivation rules to `items` of `competitor`.
///
/// Items outside [`DERIVATION_WINDOW`] of `now` or belonging to another
/// competitor are ignored.
pub fn derive_insights(competitor: &str, items: &[FeedItem], now: DateTime<Utc>) -> Vec<NewInsight> {
  let since = now - DERIVATION_WINDOW;
  let relevant: Vec<&FeedItem> = items
    .iter()
    .filter(|i| i.competitor == competitor)
    .filter(|i| i.ingested_at >= since)
    .filter(|i| i.severity != Severity::Error)
    .collect();

  let mut out = Vec::new();
  out.extend(relevant.iter().filter_map(|i| threat(i)));
  out.extend(trends(competitor, &relevant, now));
  out.extend(relevant.iter().filter_map(|i| recommendation(i)));
  out
}

fn threat(item: &FeedItem) -> Option<NewInsight> {
  (item.severity == Severity::Critical).then(|| NewInsight {
    competitor:      item.competitor.clone(),
    title:           item.title.clone(),
    summary:         item.summary.clone(),
    category:        Category::threat(),
    priority:        Priority::High,
    source_item_ids: vec![item.id],
    source_url:      Some(item.source_url.clone()),
    fingerprint:     format!("threat:{}", item.id),
  })
}

fn recommendation(item: &FeedItem) -> Option<NewInsight> {
  if item.severity != Severity::Medium {
    return None;
  }
  let tag = item
    .tags
    .iter()
    .map(|t| t.to_lowercase())
    .find(|t| ACTIONABLE_TAGS.contains(&t.as_str()))?;

  Some(NewInsight {
    competitor:      item.competitor.clone(),
    title:           format!("Review {}'s {tag} move: {}", item.competitor, item.title),
    summary:         item.summary.clone(),
    category:        Category::recommendation(),
    priority:        Priority::Medium,
    source_item_ids: vec![item.id],
    source_url:      Some(item.source_url.clone()),
    fingerprint:     format!("recommendation:{}", item.id),
  })
}

fn trends(competitor: &str, items: &[&FeedItem], now: DateTime<Utc>) -> Vec<NewInsight> {
  // tag → items carrying it; BTreeMap keeps output order stable.
  let mut by_tag: BTreeMap<String, Vec<&FeedItem>> = BTreeMap::new();
  for &item in items {
    let tags: BTreeSet<String> = item.tags.iter().map(|t| t.trim().to_lowercase()).collect();
    for tag in tags {
      if !tag.is_empty() && !is_generic_tag(&tag) {
        by_tag.entry(tag).or_default().push(item);
      }
    }
  }

  let week = now.iso_week();
  by_tag
    .into_iter()
    .filter(|(_, tagged)| tagged.len() >= TREND_MIN_RECURRENCE)
    .map(|(tag, mut tagged)| {
      tagged.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
      let priority = if tagged.len() >= TREND_HIGH_PRIORITY_RECURRENCE
        || tagged.iter().any(|i| i.severity == Severity::Critical)
      {
        Priority::High
      } else {
        Priority::Medium
      };
      let titles: Vec<&str> = tagged.iter().take(3).map(|i| i.title.as_str()).collect();
      NewInsight {
        competitor: competitor.to_owned(),
        title: format!("{competitor} is repeatedly active around \"{tag}\""),
        summary: format!(
          "{} recent items mention {tag}, including: {}.",
          tagged.len(),
          titles.join("; ")
        ),
        category: Category::trend(),
        priority,
        source_item_ids: tagged.iter().map(|i| i.id).collect(),
        source_url: tagged.first().map(|i| i.source_url.clone()),
        fingerprint: format!("trend:{tag}:{}-W{:02}", week.year(), week.week()),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::feed_item::ReadStatus;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap() }

  fn item(id: i64, severity: Severity, tags: &[&str]) -> FeedItem {
    FeedItem {
      id,
      competitor: "TechFlow".into(),
      source_url: format!("https://techflow.example/posts/{id}"),
      title: format!("Post {id}"),
      summary: format!("Summary {id}"),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      severity,
      status: ReadStatus::Unread,
      ingested_at: now() - Duration::hours(id),
      published_at: None,
    }
  }

  #[test]
  fn critical_item_raises_threat() {
    let items = vec![item(1, Severity::Critical, &["security"]), item(2, Severity::Normal, &[])];
    let out = derive_insights("TechFlow", &items, now());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].category, Category::threat());
    assert_eq!(out[0].priority, Priority::High);
    assert_eq!(out[0].fingerprint, "threat:1");
    assert_eq!(out[0].source_item_ids, vec![1]);
  }

  #[test]
  fn recurring_tag_raises_trend() {
    let items = vec![
      item(1, Severity::Normal, &["Hiring", "ai"]),
      item(2, Severity::Normal, &["hiring"]),
      item(3, Severity::Normal, &["hiring", "pricing"]),
      item(4, Severity::Normal, &["ai"]),
    ];
    let out = derive_insights("TechFlow", &items, now());
    assert_eq!(out.len(), 1, "{out:?}");
    let trend = &out[0];
    assert_eq!(trend.category, Category::trend());
    assert_eq!(trend.priority, Priority::Medium);
    assert_eq!(trend.source_item_ids, vec![1, 2, 3]);
    assert!(trend.fingerprint.starts_with("trend:hiring:2024-W10"));
  }

  #[test]
  fn generic_tags_never_trend() {
    let items: Vec<FeedItem> = (1..=6).map(|i| item(i, Severity::Normal, &["ai", "saas"])).collect();
    assert!(derive_insights("TechFlow", &items, now()).is_empty());
  }

  #[test]
  fn medium_actionable_item_raises_recommendation() {
    let items = vec![item(7, Severity::Medium, &["Pricing"])];
    let out = derive_insights("TechFlow", &items, now());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].category, Category::recommendation());
    assert_eq!(out[0].priority, Priority::Medium);
    assert!(out[0].title.contains("pricing"));
  }

  #[test]
  fn error_and_stale_items_are_ignored() {
    let mut stale = item(1, Severity::Critical, &[]);
    stale.ingested_at = now() - DERIVATION_WINDOW - Duration::hours(1);
    let errored = item(2, Severity::Error, &[]);
    let mut other = item(3, Severity::Critical, &[]);
    other.competitor = "Other".into();
    assert!(derive_insights("TechFlow", &[stale, errored, other], now()).is_empty());
  }
}
