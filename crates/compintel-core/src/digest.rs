//! Digest payload: a batch of recent findings grouped by competitor.
//!
//! Compilation is pure: the digest service loads the items and insights and
//! hands them to [`DigestPayload::compile`]. Delivery is someone else's job.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  feed_item::{FeedItem, sort_by_severity},
  insight::Insight,
};

/// Default look-back when no digest has been sent yet.
pub const DEFAULT_DIGEST_LOOKBACK: Duration = Duration::days(7);

/// Half-open time window `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestWindow {
  pub since: DateTime<Utc>,
  pub until: DateTime<Utc>,
}

impl DigestWindow {
  /// The window since the last digest, or the last seven days if none was
  /// ever sent (or the last one is in the future).
  ///
  /// `until` is cut to the microsecond precision timestamps are stored at, so
  /// nothing stamped after `now` can round down into this window.
  pub fn since_last(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
    let now = now.trunc_subsecs(6);
    let since = last_sent
      .filter(|at| *at < now)
      .unwrap_or(now - DEFAULT_DIGEST_LOOKBACK);
    Self { since, until: now }
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool { at >= self.since && at < self.until }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorDigest {
  pub competitor: String,
  /// Severity descending, then most recent first.
  pub items:      Vec<FeedItem>,
  /// Priority descending, then most recent first.
  pub insights:   Vec<Insight>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestPayload {
  pub generated_at:   DateTime<Utc>,
  pub window:         DigestWindow,
  pub competitors:    Vec<CompetitorDigest>,
  pub total_items:    usize,
  pub total_insights: usize,
}

impl DigestPayload {
  /// Select the items ingested and insights created within `window`, group
  /// them by competitor (alphabetically) and order each group.
  pub fn compile(
    items: impl IntoIterator<Item = FeedItem>,
    insights: impl IntoIterator<Item = Insight>,
    window: DigestWindow,
    generated_at: DateTime<Utc>,
  ) -> Self {
    let mut groups: BTreeMap<String, (Vec<FeedItem>, Vec<Insight>)> = BTreeMap::new();

    for item in items.into_iter().filter(|i| window.contains(i.ingested_at)) {
      groups.entry(item.competitor.clone()).or_default().0.push(item);
    }
    for insight in insights.into_iter().filter(|i| window.contains(i.created_at)) {
      groups.entry(insight.competitor.clone()).or_default().1.push(insight);
    }

    let competitors: Vec<CompetitorDigest> = groups
      .into_iter()
      .map(|(competitor, (mut items, mut insights))| {
        sort_by_severity(&mut items);
        insights.sort_by(|a, b| {
          b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
        });
        CompetitorDigest { competitor, items, insights }
      })
      .collect();

    let total_items = competitors.iter().map(|c| c.items.len()).sum();
    let total_insights = competitors.iter().map(|c| c.insights.len()).sum();

    Self { generated_at, window, competitors, total_items, total_insights }
  }

  pub fn is_empty(&self) -> bool { self.total_items == 0 && self.total_insights == 0 }
}
