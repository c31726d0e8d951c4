//! SQL schema for the Trailguard SQLite store.
//!
//! Executed once at connection startup. Timestamps are fixed-width RFC 3339
//! strings (nanosecond precision, `Z` suffix), so text comparison and
//! `ORDER BY` agree with chronological order.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per visit. A blockchain ID may have many returned visits but at
-- most one live one (see tourists_one_live_idx).
CREATE TABLE IF NOT EXISTS tracked_tourists (
    visit_id            TEXT PRIMARY KEY,
    blockchain_id       TEXT NOT NULL,
    phone_number        TEXT NOT NULL,
    tourist_info        TEXT NOT NULL DEFAULT '{}',
    status              TEXT NOT NULL,   -- 'active' | 'suspicious' | 'emergency' | 'returned'
    current_latitude    REAL NOT NULL,
    current_longitude   REAL NOT NULL,
    current_accuracy    REAL,
    current_speed       REAL,
    current_heading     REAL,
    current_recorded_at TEXT NOT NULL,
    issued_at           TEXT NOT NULL,
    returned_at         TEXT,
    last_updated        TEXT NOT NULL,
    version             INTEGER NOT NULL DEFAULT 0,
    CHECK ((status = 'returned') = (returned_at IS NOT NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS tourists_one_live_idx
    ON tracked_tourists(blockchain_id) WHERE status != 'returned';
CREATE INDEX IF NOT EXISTS tourists_blockchain_idx
    ON tracked_tourists(blockchain_id, issued_at);
CREATE INDEX IF NOT EXISTS tourists_location_idx
    ON tracked_tourists(current_latitude, current_longitude);

-- Strictly append-only apart from retention pruning.
CREATE TABLE IF NOT EXISTS location_history (
    entry_id      TEXT PRIMARY KEY,
    visit_id      TEXT NOT NULL REFERENCES tracked_tourists(visit_id),
    blockchain_id TEXT NOT NULL,
    latitude      REAL NOT NULL,
    longitude     REAL NOT NULL,
    accuracy      REAL,
    speed         REAL,
    heading       REAL,
    altitude      REAL,
    source        TEXT NOT NULL DEFAULT 'gps',
    recorded_at   TEXT NOT NULL,
    received_at   TEXT NOT NULL,
    out_of_order  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS history_tourist_idx
    ON location_history(blockchain_id, recorded_at DESC, entry_id DESC);
CREATE INDEX IF NOT EXISTS history_recorded_idx
    ON location_history(recorded_at);

CREATE TABLE IF NOT EXISTS tracking_alerts (
    alert_id      TEXT PRIMARY KEY,
    visit_id      TEXT NOT NULL REFERENCES tracked_tourists(visit_id),
    blockchain_id TEXT NOT NULL,
    kind          TEXT NOT NULL,
    message       TEXT NOT NULL,
    raised_at     TEXT NOT NULL,
    resolved      INTEGER NOT NULL DEFAULT 0,
    resolved_by   TEXT,
    resolved_at   TEXT,
    CHECK (resolved = (resolved_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS alerts_visit_idx ON tracking_alerts(visit_id, raised_at);
CREATE INDEX IF NOT EXISTS alerts_feed_idx ON tracking_alerts(raised_at, resolved);

PRAGMA user_version = 2;
";
