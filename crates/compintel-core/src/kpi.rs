//! KPI read models. Always computed fresh; never stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  feed_item::{FeedItem, ReadStatus, Severity},
  insight::{Insight, InsightStatus, Priority},
};

/// Window used by [`FeedKpis::last_24_hours`].
pub const RECENT_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedKpis {
  pub unread_changes:   u64,
  pub critical_updates: u64,
  pub last_24_hours:    u64,
}

impl FeedKpis {
  pub fn compute<'a>(items: impl IntoIterator<Item = &'a FeedItem>, now: DateTime<Utc>) -> Self {
    let since = now - RECENT_WINDOW;
    items.into_iter().fold(Self::default(), |mut k, item| {
      k.unread_changes += u64::from(item.status == ReadStatus::Unread);
      k.critical_updates += u64::from(item.severity == Severity::Critical);
      k.last_24_hours += u64::from(item.ingested_at >= since);
      k
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsightKpis {
  pub pending_actions: u64,
  pub high_priority:   u64,
  pub total_insights:  u64,
}

impl InsightKpis {
  pub fn compute<'a>(insights: impl IntoIterator<Item = &'a Insight>) -> Self {
    insights.into_iter().fold(Self::default(), |mut k, i| {
      k.pending_actions += u64::from(i.status == InsightStatus::Pending);
      k.high_priority += u64::from(i.priority == Priority::High);
      k.total_insights += 1;
      k
    })
  }
}
