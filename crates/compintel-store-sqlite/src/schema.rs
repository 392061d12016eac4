//! SQL schema for the SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS competitors (
    name        TEXT PRIMARY KEY,
    website     TEXT NOT NULL,
    rss         TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

-- Content columns are never updated; only `status` changes after insert.
-- AUTOINCREMENT keeps ids monotonic even across deletions.
CREATE TABLE IF NOT EXISTS feed_items (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    competitor   TEXT NOT NULL REFERENCES competitors(name) ON DELETE CASCADE,
    identity_key TEXT NOT NULL UNIQUE,  -- sha256(competitor || 0x00 || source_url)
    source_url   TEXT NOT NULL,
    title        TEXT NOT NULL,
    summary      TEXT NOT NULL,
    tags         TEXT NOT NULL DEFAULT '[]',
    severity     INTEGER NOT NULL,      -- 3 critical, 2 medium, 1 normal, 0 error
    status       TEXT NOT NULL DEFAULT 'unread' CHECK (status IN ('unread', 'read')),
    ingested_at  TEXT NOT NULL,         -- RFC 3339 UTC, fixed width
    published_at TEXT
);

CREATE TABLE IF NOT EXISTS insights (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    competitor      TEXT NOT NULL REFERENCES competitors(name) ON DELETE CASCADE,
    fingerprint     TEXT NOT NULL,
    title           TEXT NOT NULL,
    summary         TEXT NOT NULL,
    category        TEXT NOT NULL,
    priority        TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'actioned')),
    action_notes    TEXT,
    source_item_ids TEXT NOT NULL DEFAULT '[]',
    source_url      TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (competitor, fingerprint)
);

-- Process-wide key/value settings (digest schedule, last digest time).
CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS feed_items_competitor_idx ON feed_items(competitor);
CREATE INDEX IF NOT EXISTS feed_items_ingested_idx   ON feed_items(ingested_at);
CREATE INDEX IF NOT EXISTS insights_competitor_idx   ON insights(competitor);

PRAGMA user_version = 1;
";

/// `settings` key holding the JSON-encoded digest schedule.
pub const SCHEDULE_KEY: &str = "digest_schedule";

/// `settings` key holding the RFC 3339 time of the last digest.
pub const LAST_DIGEST_KEY: &str = "last_digest_at";
