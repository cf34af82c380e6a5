/// Current layout of a stored payload record.
pub const SCHEMA_VERSION: i64 = 1;

/// Schema for the offline store and progress tables.
pub const SCHEMA: &str = r#"
-- Offline content, one record per identifier (stores serialized JSON)
CREATE TABLE IF NOT EXISTS offline_items (
    entity_type TEXT NOT NULL,
    identifier TEXT NOT NULL,
    kind TEXT NOT NULL,
    topic TEXT,
    origin TEXT NOT NULL CHECK (origin IN ('seed', 'fetched')),
    schema_version INTEGER NOT NULL,
    data BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, identifier)
);

CREATE INDEX IF NOT EXISTS idx_offline_items_kind_topic
    ON offline_items(entity_type, kind, topic);

CREATE INDEX IF NOT EXISTS idx_offline_items_created
    ON offline_items(created_at);

-- Progress documents (streak state and recorded days)
CREATE TABLE IF NOT EXISTS progress (
    profile TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
