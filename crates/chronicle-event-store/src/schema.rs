//! Event store database schema.

/// SQL to create the version and event tables.
///
/// `aggregate_versions` holds one row per aggregate and is the target of the
/// compare-and-set on append. `events` is the log itself; its
/// `(type_tag, saved_at)` index backs type-indexed scans.
pub const CREATE_EVENTS_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS aggregate_versions (
    aggregate_id    TEXT PRIMARY KEY,
    version         BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    aggregate_id    TEXT NOT NULL,
    version         BIGINT NOT NULL,
    type_tag        INTEGER NOT NULL,
    payload         JSONB NOT NULL,
    saved_at        BIGINT NOT NULL,
    PRIMARY KEY (aggregate_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_by_type
    ON events (type_tag, saved_at);
";
