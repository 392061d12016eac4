//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use compintel_core::{
  competitor::NewCompetitor,
  feed_item::{NewFeedItem, ReadStatus, Severity},
  insight::{Category, InsightStatus, NewInsight, Priority},
  kpi::{FeedKpis, InsightKpis},
  schedule::{DayOfWeek, DigestSchedule, Frequency},
  store::{FeedOrder, FeedQuery, InsightQuery, IntelStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn competitor(name: &str) -> NewCompetitor {
  let host = name.to_lowercase();
  NewCompetitor::new(
    name,
    format!("https://{host}.example"),
    format!("https://{host}.example/feed.xml"),
    "",
  )
}

fn feed_item(competitor: &str, path: &str, severity: Severity, tags: &[&str]) -> NewFeedItem {
  NewFeedItem {
    competitor:   competitor.into(),
    source_url:   format!("https://{}.example/{path}", competitor.to_lowercase()),
    title:        format!("{competitor} {path}"),
    summary:      format!("Summary of {path}"),
    tags:         tags.iter().map(|t| t.to_string()).collect(),
    severity,
    published_at: None,
  }
}

fn insight(competitor: &str, fingerprint: &str, priority: Priority) -> NewInsight {
  NewInsight {
    competitor:      competitor.into(),
    title:           format!("insight {fingerprint}"),
    summary:         "something happened".into(),
    category:        Category::threat(),
    priority,
    source_item_ids: vec![],
    source_url:      None,
    fingerprint:     fingerprint.into(),
  }
}

// ─── Competitors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_competitor() {
  let s = store().await;
  let added = s.add_competitor(competitor("TechFlow")).await.unwrap();
  assert_eq!(added.name, "TechFlow");

  let fetched = s.get_competitor("TechFlow".into()).await.unwrap().unwrap();
  assert_eq!(fetched.rss, "https://techflow.example/feed.xml");
  assert!(s.get_competitor("Nobody".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_competitor_is_conflict() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let err = s.add_competitor(competitor("TechFlow")).await.unwrap_err();
  assert!(matches!(err, crate::Error::CompetitorExists(_)));
  assert!(matches!(compintel_core::Error::from(err), compintel_core::Error::Conflict(_)));
}

#[tokio::test]
async fn invalid_competitor_url_is_validation_error() {
  let s = store().await;
  let mut input = competitor("TechFlow");
  input.rss = "not a url".into();
  let err = s.add_competitor(input).await.unwrap_err();
  assert!(matches!(
    compintel_core::Error::from(err),
    compintel_core::Error::Validation(_)
  ));
  assert!(s.list_competitors().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_competitors_in_registration_order() {
  let s = store().await;
  for name in ["Zeta", "Alpha", "Mid"] {
    s.add_competitor(competitor(name)).await.unwrap();
  }
  let names: Vec<String> = s
    .list_competitors()
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.name)
    .collect();
  assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
}

#[tokio::test]
async fn remove_competitor_cascades_only_its_own_data() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  s.add_competitor(competitor("DataCore")).await.unwrap();

  s.commit_feed_item(feed_item("TechFlow", "a", Severity::Normal, &[])).await.unwrap();
  s.commit_feed_item(feed_item("TechFlow", "b", Severity::Critical, &[])).await.unwrap();
  s.commit_feed_item(feed_item("DataCore", "a", Severity::Normal, &[])).await.unwrap();
  s.record_insight(insight("TechFlow", "threat:1", Priority::High)).await.unwrap();
  s.record_insight(insight("DataCore", "threat:2", Priority::High)).await.unwrap();

  let report = s.remove_competitor("TechFlow".into()).await.unwrap();
  assert_eq!(report.feed_items, 2);
  assert_eq!(report.insights, 1);

  let remaining = s.list_feed_items(&FeedQuery::default()).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].competitor, "DataCore");
  let insights = s.list_insights(&InsightQuery::default()).await.unwrap();
  assert_eq!(insights.len(), 1);
  assert_eq!(insights[0].competitor, "DataCore");
}

#[tokio::test]
async fn remove_unknown_competitor_is_not_found() {
  let s = store().await;
  let err = s.remove_competitor("Ghost".into()).await.unwrap_err();
  assert!(matches!(err, crate::Error::CompetitorNotFound(_)));
}

// ─── Feed items ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_is_idempotent_per_competitor_and_url() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();

  let input = feed_item("TechFlow", "launch", Severity::Medium, &["launch"]);
  assert!(!s.feed_item_exists("TechFlow".into(), input.source_url.clone()).await.unwrap());

  let first = s.commit_feed_item(input.clone()).await.unwrap().unwrap();
  assert_eq!(first.status, ReadStatus::Unread);
  assert!(s.feed_item_exists("TechFlow".into(), input.source_url.clone()).await.unwrap());

  let mut again = input.clone();
  again.title = "A different title".into();
  assert!(s.commit_feed_item(again).await.unwrap().is_none());

  let all = s.list_feed_items(&FeedQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].title, first.title);
}

#[tokio::test]
async fn concurrent_commits_of_one_entry_store_it_once() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();

  let input = feed_item("TechFlow", "race", Severity::Normal, &[]);
  let (a, b, c) = tokio::join!(
    s.commit_feed_item(input.clone()),
    s.commit_feed_item(input.clone()),
    s.commit_feed_item(input),
  );
  let committed = [a.unwrap(), b.unwrap(), c.unwrap()].into_iter().flatten().count();
  assert_eq!(committed, 1);
  assert_eq!(s.list_feed_items(&FeedQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_url_under_two_competitors_is_two_items() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  s.add_competitor(competitor("DataCore")).await.unwrap();

  let mut a = feed_item("TechFlow", "shared", Severity::Normal, &[]);
  a.source_url = "https://news.example/shared".into();
  let mut b = a.clone();
  b.competitor = "DataCore".into();

  assert!(s.commit_feed_item(a).await.unwrap().is_some());
  assert!(s.commit_feed_item(b).await.unwrap().is_some());
}

#[tokio::test]
async fn commit_for_unknown_competitor_fails() {
  let s = store().await;
  let err = s
    .commit_feed_item(feed_item("Ghost", "a", Severity::Normal, &[]))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::CompetitorNotFound(_)));
}

#[tokio::test]
async fn committed_item_round_trips() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let mut input = feed_item("TechFlow", "p", Severity::Critical, &["security", "breach"]);
  input.published_at = Some(Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap());

  let committed = s.commit_feed_item(input).await.unwrap().unwrap();
  let fetched = s.get_feed_item(committed.id).await.unwrap().unwrap();
  assert_eq!(fetched, committed);
  assert_eq!(fetched.tags, BTreeSet::from(["breach".to_string(), "security".to_string()]));
}

#[tokio::test]
async fn list_feed_items_filters_and_orders() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  s.add_competitor(competitor("DataCore")).await.unwrap();

  let n = s.commit_feed_item(feed_item("TechFlow", "1", Severity::Normal, &[])).await.unwrap();
  let c = s.commit_feed_item(feed_item("TechFlow", "2", Severity::Critical, &[])).await.unwrap();
  let m = s.commit_feed_item(feed_item("TechFlow", "3", Severity::Medium, &[])).await.unwrap();
  s.commit_feed_item(feed_item("DataCore", "4", Severity::Critical, &[])).await.unwrap();
  let (n, c, m) = (n.unwrap(), c.unwrap(), m.unwrap());

  let recent = s
    .list_feed_items(&FeedQuery { competitor: Some("TechFlow".into()), ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<i64> = recent.iter().map(|i| i.id).collect();
  assert_eq!(ids, vec![m.id, c.id, n.id]);

  let by_severity = s
    .list_feed_items(&FeedQuery {
      competitor: Some("TechFlow".into()),
      order: FeedOrder::Severity,
      ..Default::default()
    })
    .await
    .unwrap();
  let ids: Vec<i64> = by_severity.iter().map(|i| i.id).collect();
  assert_eq!(ids, vec![c.id, m.id, n.id]);

  let serious = s
    .list_feed_items(&FeedQuery { min_severity: Some(Severity::Medium), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(serious.len(), 3);

  let limited = s
    .list_feed_items(&FeedQuery { limit: Some(2), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn list_feed_items_filters_by_tag() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let priced = s
    .commit_feed_item(feed_item("TechFlow", "1", Severity::Normal, &["pricing", "product"]))
    .await
    .unwrap()
    .unwrap();
  s.commit_feed_item(feed_item("TechFlow", "2", Severity::Critical, &["security"])).await.unwrap();
  s.commit_feed_item(feed_item("TechFlow", "3", Severity::Medium, &[])).await.unwrap();

  let tagged = s
    .list_feed_items(&FeedQuery { tag: Some("Pricing".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(tagged.len(), 1);
  assert_eq!(tagged[0].id, priced.id);

  let none = s
    .list_feed_items(&FeedQuery { tag: Some("pric".into()), ..Default::default() })
    .await
    .unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn read_status_toggles_both_ways() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let item = s
    .commit_feed_item(feed_item("TechFlow", "x", Severity::Normal, &[]))
    .await
    .unwrap()
    .unwrap();

  let read = s.set_read_status(item.id, ReadStatus::Read).await.unwrap();
  assert_eq!(read.status, ReadStatus::Read);
  assert_eq!(read.summary, item.summary);

  let unread_only = s
    .list_feed_items(&FeedQuery { status: Some(ReadStatus::Unread), ..Default::default() })
    .await
    .unwrap();
  assert!(unread_only.is_empty());

  let back = s.set_read_status(item.id, ReadStatus::Unread).await.unwrap();
  assert_eq!(back.status, ReadStatus::Unread);

  let err = s.set_read_status(9999, ReadStatus::Read).await.unwrap_err();
  assert!(matches!(err, crate::Error::FeedItemNotFound(9999)));
}

// ─── Insights ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insight_fingerprint_is_recorded_once() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();

  let first = s.record_insight(insight("TechFlow", "threat:7", Priority::High)).await.unwrap();
  assert_eq!(first.unwrap().status, InsightStatus::Pending);
  assert!(
    s.record_insight(insight("TechFlow", "threat:7", Priority::High))
      .await
      .unwrap()
      .is_none()
  );
  assert_eq!(s.insight_kpis().await.unwrap().total_insights, 1);
}

#[tokio::test]
async fn insight_status_is_reversible_and_keeps_notes() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let created = s
    .record_insight(insight("TechFlow", "threat:1", Priority::High))
    .await
    .unwrap()
    .unwrap();

  let actioned = s
    .set_insight_status(created.id, InsightStatus::Actioned, Some("briefed sales".into()))
    .await
    .unwrap();
  assert_eq!(actioned.status, InsightStatus::Actioned);
  assert_eq!(actioned.action_notes.as_deref(), Some("briefed sales"));
  assert_eq!(actioned.title, created.title);

  let pending = s
    .set_insight_status(created.id, InsightStatus::Pending, None)
    .await
    .unwrap();
  assert_eq!(pending.status, InsightStatus::Pending);
  assert_eq!(pending.action_notes.as_deref(), Some("briefed sales"));

  let err = s
    .set_insight_status(404, InsightStatus::Actioned, None)
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::InsightNotFound(404)));
}

#[tokio::test]
async fn list_insights_filters_by_status() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let a = s.record_insight(insight("TechFlow", "a", Priority::High)).await.unwrap().unwrap();
  s.record_insight(insight("TechFlow", "b", Priority::Medium)).await.unwrap();
  s.set_insight_status(a.id, InsightStatus::Actioned, None).await.unwrap();

  let pending = s
    .list_insights(&InsightQuery { status: Some(InsightStatus::Pending), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].title, "insight b");
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn kpis_reflect_current_state() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  let c = s
    .commit_feed_item(feed_item("TechFlow", "c", Severity::Critical, &[]))
    .await
    .unwrap()
    .unwrap();
  s.commit_feed_item(feed_item("TechFlow", "n", Severity::Normal, &[])).await.unwrap();
  s.set_read_status(c.id, ReadStatus::Read).await.unwrap();

  let feed = s.feed_kpis(Utc::now()).await.unwrap();
  assert_eq!(feed.unread_changes, 1);
  assert_eq!(feed.critical_updates, 1);
  assert_eq!(feed.last_24_hours, 2);

  let later = s.feed_kpis(Utc::now() + Duration::days(2)).await.unwrap();
  assert_eq!(later.last_24_hours, 0);

  let i1 = s.record_insight(insight("TechFlow", "1", Priority::High)).await.unwrap().unwrap();
  s.record_insight(insight("TechFlow", "2", Priority::Medium)).await.unwrap();
  s.record_insight(insight("TechFlow", "3", Priority::High)).await.unwrap();

  let kpis = s.insight_kpis().await.unwrap();
  assert_eq!((kpis.pending_actions, kpis.high_priority, kpis.total_insights), (3, 2, 3));

  s.set_insight_status(i1.id, InsightStatus::Actioned, None).await.unwrap();
  assert_eq!(s.insight_kpis().await.unwrap().pending_actions, 2);
}

#[tokio::test]
async fn kpi_queries_agree_with_in_memory_counts() {
  let s = store().await;
  s.add_competitor(competitor("TechFlow")).await.unwrap();
  s.add_competitor(competitor("DataCore")).await.unwrap();

  let mut committed = Vec::new();
  for (who, path, severity) in [
    ("TechFlow", "outage", Severity::Error),
    ("TechFlow", "breach", Severity::Critical),
    ("TechFlow", "pricing", Severity::Medium),
    ("DataCore", "hiring", Severity::Normal),
    ("DataCore", "recall", Severity::Critical),
  ] {
    let item = s.commit_feed_item(feed_item(who, path, severity, &[])).await.unwrap().unwrap();
    committed.push(item);
  }
  for id in [committed[1].id, committed[3].id] {
    s.set_read_status(id, ReadStatus::Read).await.unwrap();
  }

  let mut recorded = Vec::new();
  for (who, fingerprint, priority) in [
    ("TechFlow", "t:1", Priority::High),
    ("TechFlow", "t:2", Priority::Medium),
    ("DataCore", "t:3", Priority::High),
    ("DataCore", "t:4", Priority::Medium),
  ] {
    let row = s.record_insight(insight(who, fingerprint, priority)).await.unwrap().unwrap();
    recorded.push(row);
  }
  for id in [recorded[0].id, recorded[3].id] {
    s.set_insight_status(id, InsightStatus::Actioned, None).await.unwrap();
  }

  let items = s.list_feed_items(&FeedQuery::default()).await.unwrap();
  let insights = s.list_insights(&InsightQuery::default()).await.unwrap();
  assert_eq!(items.len(), 5);
  assert_eq!(insights.len(), 4);

  for now in [Utc::now(), Utc::now() + Duration::days(2)] {
    assert_eq!(s.feed_kpis(now).await.unwrap(), FeedKpis::compute(&items, now));
  }
  assert_eq!(s.insight_kpis().await.unwrap(), InsightKpis::compute(&insights));

  let feed = s.feed_kpis(Utc::now()).await.unwrap();
  assert_eq!((feed.unread_changes, feed.critical_updates, feed.last_24_hours), (3, 2, 5));
  let kpis = s.insight_kpis().await.unwrap();
  assert_eq!((kpis.pending_actions, kpis.high_priority, kpis.total_insights), (2, 2, 4));
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schedule_and_last_digest_persist() {
  let s = store().await;
  assert!(s.load_schedule().await.unwrap().is_none());
  assert!(s.last_digest_at().await.unwrap().is_none());

  let schedule = DigestSchedule { frequency: Frequency::BiWeekly, day_of_week: DayOfWeek::Friday };
  s.save_schedule(schedule).await.unwrap();
  s.save_schedule(DigestSchedule { frequency: Frequency::Daily, ..schedule }).await.unwrap();
  let loaded = s.load_schedule().await.unwrap().unwrap();
  assert_eq!(loaded.frequency, Frequency::Daily);
  assert_eq!(loaded.day_of_week, DayOfWeek::Friday);

  let at = Utc::now();
  s.record_digest_sent(at).await.unwrap();
  let stored = s.last_digest_at().await.unwrap().unwrap();
  assert_eq!(stored.timestamp_micros(), at.timestamp_micros());
}
