//! [`SqliteStore`] — the SQLite implementation of [`IntelStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use compintel_core::{
  competitor::{Competitor, NewCompetitor},
  feed_item::{FeedItem, NewFeedItem, ReadStatus},
  insight::{Insight, InsightStatus, NewInsight},
  kpi::{FeedKpis, InsightKpis, RECENT_WINDOW},
  schedule::DigestSchedule,
  store::{CascadeReport, FeedOrder, FeedQuery, InsightQuery, IntelStore},
};

use crate::{
  encode::{
    decode_dt, encode_dt, encode_ids, encode_severity, encode_tags, identity_key, now,
    RawCompetitor, RawFeedItem, RawInsight, COMPETITOR_COLUMNS, FEED_ITEM_COLUMNS,
    INSIGHT_COLUMNS,
  },
  schema::{LAST_DIGEST_KEY, SCHEDULE_KEY, SCHEMA},
  Error, Result,
};

/// Outcome of a guarded insert run inside a single connection call.
///
/// The timestamp is taken inside the call. Calls run one at a time on the
/// connection thread, so a row stamped before a read's cut-off is already
/// visible to that read.
enum Insert {
  Inserted { id: i64, at: DateTime<Utc> },
  Duplicate,
  UnknownCompetitor,
}

fn competitor_known(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM competitors WHERE name = ?1", rusqlite::params![name], |_| {
        Ok(())
      })
      .optional()?
      .is_some(),
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A competitor intelligence store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_setting(&self, key: &'static str) -> Result<Option<String>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                rusqlite::params![key],
                |r| r.get(0),
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn put_setting(&self, key: &'static str, value: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── IntelStore impl ─────────────────────────────────────────────────────────

impl IntelStore for SqliteStore {
  type Error = Error;

  // ── Competitors ───────────────────────────────────────────────────────────

  async fn add_competitor(&self, input: NewCompetitor) -> Result<Competitor> {
    let input = input.validate()?;
    let competitor = Competitor {
      name:        input.name,
      website:     input.website,
      rss:         input.rss,
      description: input.description,
      created_at:  now(),
    };

    let name        = competitor.name.clone();
    let website     = competitor.website.clone();
    let rss         = competitor.rss.clone();
    let description = competitor.description.clone();
    let at_str      = encode_dt(competitor.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO competitors (name, website, rss, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(name) DO NOTHING",
          rusqlite::params![name, website, rss, description, at_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    if !inserted {
      return Err(Error::CompetitorExists(competitor.name));
    }
    Ok(competitor)
  }

  async fn get_competitor(&self, name: String) -> Result<Option<Competitor>> {
    let raw: Option<RawCompetitor> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COMPETITOR_COLUMNS} FROM competitors WHERE name = ?1"),
              rusqlite::params![name],
              RawCompetitor::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCompetitor::into_competitor).transpose()
  }

  async fn list_competitors(&self) -> Result<Vec<Competitor>> {
    let raws: Vec<RawCompetitor> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {COMPETITOR_COLUMNS} FROM competitors ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawCompetitor::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCompetitor::into_competitor).collect()
  }

  async fn remove_competitor(&self, name: String) -> Result<CascadeReport> {
    let key = name.clone();
    let report: Option<CascadeReport> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let feed_items: i64 = tx.query_row(
          "SELECT COUNT(*) FROM feed_items WHERE competitor = ?1",
          rusqlite::params![key],
          |r| r.get(0),
        )?;
        let insights: i64 = tx.query_row(
          "SELECT COUNT(*) FROM insights WHERE competitor = ?1",
          rusqlite::params![key],
          |r| r.get(0),
        )?;
        // Feed items and insights go with it via ON DELETE CASCADE.
        let n = tx.execute("DELETE FROM competitors WHERE name = ?1", rusqlite::params![key])?;
        if n == 0 {
          return Ok(None);
        }
        tx.commit()?;
        Ok(Some(CascadeReport {
          feed_items: feed_items as u64,
          insights:   insights as u64,
        }))
      })
      .await?;

    report.ok_or(Error::CompetitorNotFound(name))
  }

  // ── Feed items ────────────────────────────────────────────────────────────

  async fn feed_item_exists(&self, competitor: String, source_url: String) -> Result<bool> {
    let key = identity_key(&competitor, &source_url);
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT 1 FROM feed_items WHERE identity_key = ?1",
                rusqlite::params![key],
                |_| Ok(()),
              )
              .optional()?
              .is_some(),
          )
        })
        .await?,
    )
  }

  async fn commit_feed_item(&self, input: NewFeedItem) -> Result<Option<FeedItem>> {
    let competitor   = input.competitor.clone();
    let key          = identity_key(&input.competitor, &input.source_url);
    let source_url   = input.source_url.clone();
    let title        = input.title.clone();
    let summary      = input.summary.clone();
    let tags_str     = encode_tags(&input.tags)?;
    let severity     = encode_severity(input.severity);
    let published_at = input.published_at.map(encode_dt);

    let outcome = self
      .conn
      .call(move |conn| {
        if !competitor_known(conn, &competitor)? {
          return Ok(Insert::UnknownCompetitor);
        }
        let at = now();
        let n = conn.execute(
          "INSERT INTO feed_items (
             competitor, identity_key, source_url, title, summary,
             tags, severity, status, ingested_at, published_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'unread', ?8, ?9)
           ON CONFLICT(identity_key) DO NOTHING",
          rusqlite::params![
            competitor,
            key,
            source_url,
            title,
            summary,
            tags_str,
            severity,
            encode_dt(at),
            published_at,
          ],
        )?;
        Ok(if n == 0 {
          Insert::Duplicate
        } else {
          Insert::Inserted { id: conn.last_insert_rowid(), at }
        })
      })
      .await?;

    match outcome {
      Insert::UnknownCompetitor => Err(Error::CompetitorNotFound(input.competitor)),
      Insert::Duplicate => Ok(None),
      Insert::Inserted { id, at: ingested_at } => Ok(Some(FeedItem {
        id,
        competitor: input.competitor,
        source_url: input.source_url,
        title: input.title,
        summary: input.summary,
        tags: input.tags,
        severity: input.severity,
        status: ReadStatus::Unread,
        ingested_at,
        published_at: input.published_at,
      })),
    }
  }

  async fn get_feed_item(&self, id: i64) -> Result<Option<FeedItem>> {
    let raw: Option<RawFeedItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FEED_ITEM_COLUMNS} FROM feed_items WHERE id = ?1"),
              rusqlite::params![id],
              RawFeedItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeedItem::into_feed_item).transpose()
  }

  async fn list_feed_items(&self, query: &FeedQuery) -> Result<Vec<FeedItem>> {
    let competitor   = query.competitor.clone();
    let min_severity = query.min_severity.map(encode_severity);
    let status       = query.status.map(|s| s.as_ref().to_owned());
    let tag          = query.tag.clone();
    let since        = query.since.map(encode_dt);
    let limit        = query.limit.map_or(-1, |l| l as i64);
    let order_by     = match query.order {
      FeedOrder::Recent => "ingested_at DESC, id DESC",
      FeedOrder::Severity => "severity DESC, ingested_at DESC, id DESC",
    };

    let raws: Vec<RawFeedItem> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {FEED_ITEM_COLUMNS} FROM feed_items
           WHERE (?1 IS NULL OR competitor = ?1)
             AND (?2 IS NULL OR severity >= ?2)
             AND (?3 IS NULL OR status = ?3)
             AND (?4 IS NULL OR ingested_at >= ?4)
             AND (?6 IS NULL OR EXISTS (
               SELECT 1 FROM json_each(feed_items.tags) WHERE value = ?6 COLLATE NOCASE
             ))
           ORDER BY {order_by}
           LIMIT ?5"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![competitor, min_severity, status, since, limit, tag],
            RawFeedItem::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFeedItem::into_feed_item).collect()
  }

  async fn set_read_status(&self, id: i64, status: ReadStatus) -> Result<FeedItem> {
    let status_str = status.as_ref().to_owned();

    let raw: Option<RawFeedItem> = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE feed_items SET status = ?2 WHERE id = ?1",
          rusqlite::params![id, status_str],
        )?;
        if n == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {FEED_ITEM_COLUMNS} FROM feed_items WHERE id = ?1"),
          rusqlite::params![id],
          RawFeedItem::from_row,
        )?))
      })
      .await?;

    raw.ok_or(Error::FeedItemNotFound(id))?.into_feed_item()
  }

  // ── Insights ──────────────────────────────────────────────────────────────

  async fn record_insight(&self, input: NewInsight) -> Result<Option<Insight>> {
    let competitor  = input.competitor.clone();
    let fingerprint = input.fingerprint.clone();
    let title       = input.title.clone();
    let summary     = input.summary.clone();
    let category    = input.category.as_str().to_owned();
    let priority    = input.priority.as_ref().to_owned();
    let ids_str     = encode_ids(&input.source_item_ids)?;
    let source_url  = input.source_url.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        if !competitor_known(conn, &competitor)? {
          return Ok(Insert::UnknownCompetitor);
        }
        let at = now();
        let n = conn.execute(
          "INSERT INTO insights (
             competitor, fingerprint, title, summary, category, priority,
             status, source_item_ids, source_url, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9)
           ON CONFLICT(competitor, fingerprint) DO NOTHING",
          rusqlite::params![
            competitor,
            fingerprint,
            title,
            summary,
            category,
            priority,
            ids_str,
            source_url,
            encode_dt(at),
          ],
        )?;
        Ok(if n == 0 {
          Insert::Duplicate
        } else {
          Insert::Inserted { id: conn.last_insert_rowid(), at }
        })
      })
      .await?;

    match outcome {
      Insert::UnknownCompetitor => Err(Error::CompetitorNotFound(input.competitor)),
      Insert::Duplicate => Ok(None),
      Insert::Inserted { id, at: created_at } => Ok(Some(Insight {
        id,
        competitor: input.competitor,
        title: input.title,
        summary: input.summary,
        category: input.category,
        priority: input.priority,
        status: InsightStatus::Pending,
        action_notes: None,
        source_item_ids: input.source_item_ids,
        source_url: input.source_url,
        created_at,
      })),
    }
  }

  async fn get_insight(&self, id: i64) -> Result<Option<Insight>> {
    let raw: Option<RawInsight> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {INSIGHT_COLUMNS} FROM insights WHERE id = ?1"),
              rusqlite::params![id],
              RawInsight::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawInsight::into_insight).transpose()
  }

  async fn list_insights(&self, query: &InsightQuery) -> Result<Vec<Insight>> {
    let competitor = query.competitor.clone();
    let status     = query.status.map(|s| s.as_ref().to_owned());
    let since      = query.since.map(encode_dt);

    let raws: Vec<RawInsight> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INSIGHT_COLUMNS} FROM insights
           WHERE (?1 IS NULL OR competitor = ?1)
             AND (?2 IS NULL OR status = ?2)
             AND (?3 IS NULL OR created_at >= ?3)
           ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![competitor, status, since], RawInsight::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInsight::into_insight).collect()
  }

  async fn set_insight_status(
    &self,
    id:           i64,
    status:       InsightStatus,
    action_notes: Option<String>,
  ) -> Result<Insight> {
    let status_str = status.as_ref().to_owned();

    let raw: Option<RawInsight> = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE insights
           SET status = ?2, action_notes = COALESCE(?3, action_notes)
           WHERE id = ?1",
          rusqlite::params![id, status_str, action_notes],
        )?;
        if n == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {INSIGHT_COLUMNS} FROM insights WHERE id = ?1"),
          rusqlite::params![id],
          RawInsight::from_row,
        )?))
      })
      .await?;

    raw.ok_or(Error::InsightNotFound(id))?.into_insight()
  }

  // ── Read models ───────────────────────────────────────────────────────────

  async fn feed_kpis(&self, now: DateTime<Utc>) -> Result<FeedKpis> {
    let since = encode_dt(now - RECENT_WINDOW);

    let (unread, critical, recent): (i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(SUM(status = 'unread'), 0),
                  COALESCE(SUM(severity = 3), 0),
                  COALESCE(SUM(ingested_at >= ?1), 0)
           FROM feed_items",
          rusqlite::params![since],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?)
      })
      .await?;

    Ok(FeedKpis {
      unread_changes:   unread as u64,
      critical_updates: critical as u64,
      last_24_hours:    recent as u64,
    })
  }

  async fn insight_kpis(&self) -> Result<InsightKpis> {
    let (pending, high, total): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(SUM(status = 'pending'), 0),
                  COALESCE(SUM(priority = 'High Priority'), 0),
                  COUNT(*)
           FROM insights",
          [],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?)
      })
      .await?;

    Ok(InsightKpis {
      pending_actions: pending as u64,
      high_priority:   high as u64,
      total_insights:  total as u64,
    })
  }

  // ── Digest settings ───────────────────────────────────────────────────────

  async fn load_schedule(&self) -> Result<Option<DigestSchedule>> {
    self
      .get_setting(SCHEDULE_KEY)
      .await?
      .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
      .transpose()
  }

  async fn save_schedule(&self, schedule: DigestSchedule) -> Result<()> {
    self.put_setting(SCHEDULE_KEY, serde_json::to_string(&schedule)?).await
  }

  async fn last_digest_at(&self) -> Result<Option<DateTime<Utc>>> {
    self
      .get_setting(LAST_DIGEST_KEY)
      .await?
      .map(|raw| decode_dt(&raw))
      .transpose()
  }

  async fn record_digest_sent(&self, at: DateTime<Utc>) -> Result<()> {
    self.put_setting(LAST_DIGEST_KEY, encode_dt(at)).await
  }
}
