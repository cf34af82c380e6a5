//! Offline store trait and SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use super::traits::Content;
use crate::db::schema::SCHEMA_VERSION;
use crate::db::Database;
use crate::remote::ErrorKind;

/// How an offline item came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  /// Written by first-run seeding
  Seed,
  /// Written after a successful network fetch
  Fetched,
}

impl Origin {
  fn as_str(&self) -> &'static str {
    match self {
      Origin::Seed => "seed",
      Origin::Fetched => "fetched",
    }
  }

  fn parse(s: &str) -> Option<Self> {
    match s {
      "seed" => Some(Origin::Seed),
      "fetched" => Some(Origin::Fetched),
      _ => None,
    }
  }
}

/// A durable payload record. Replaced whole by identifier, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineItem<T> {
  pub identifier: String,
  /// Normalized kind of content; lookups never cross kinds
  pub kind: String,
  /// Normalized topic used for keyed lookup
  pub topic: Option<String>,
  pub payload: T,
  pub created_at: DateTime<Utc>,
  pub origin: Origin,
}

impl<T> OfflineItem<T> {
  pub fn fetched(
    identifier: impl Into<String>,
    kind: impl Into<String>,
    topic: Option<String>,
    payload: T,
  ) -> Self {
    Self {
      identifier: identifier.into(),
      kind: kind.into(),
      topic,
      payload,
      created_at: Utc::now(),
      origin: Origin::Fetched,
    }
  }

  pub fn seed(
    identifier: impl Into<String>,
    kind: impl Into<String>,
    topic: Option<String>,
    payload: T,
  ) -> Self {
    Self {
      origin: Origin::Seed,
      ..Self::fetched(identifier, kind, topic, payload)
    }
  }

  pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
    self.created_at = created_at;
    self
  }
}

/// Trait for offline storage backends.
///
/// Reading methods skip records that cannot be decoded, or whose payload is
/// not well-formed, instead of failing.
#[async_trait]
pub trait OfflineStorage: Send + Sync + 'static {
  /// Insert items whose identifiers are not yet present. Returns how many were written.
  async fn seed_defaults<T: Content>(&self, items: &[OfflineItem<T>]) -> Result<usize>;

  /// Insert or replace the record for `item.identifier`.
  async fn save<T: Content>(&self, item: &OfflineItem<T>) -> Result<()>;

  /// Get a single item by identifier.
  async fn get<T: Content>(&self, identifier: &str) -> Result<Option<OfflineItem<T>>>;

  /// Every readable item of this content type, oldest first.
  async fn all<T: Content>(&self) -> Result<Vec<OfflineItem<T>>>;

  /// Uniformly random readable item of `kind`.
  async fn random_pick<T: Content>(&self, kind: &str) -> Result<Option<OfflineItem<T>>>;

  /// Uniformly random readable item of `kind` stored under `topic`.
  async fn random_pick_matching<T: Content>(
    &self,
    kind: &str,
    topic: &str,
  ) -> Result<Option<OfflineItem<T>>>;

  /// Delete fetched items created before `now - days`. Returns how many went.
  async fn prune_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<usize>;

  /// Delete everything, seeded defaults included.
  async fn wipe(&self) -> Result<usize>;
}

/// SQLite-based offline storage.
pub struct SqliteStorage {
  db: Database,
}

/// Columns as read from a row, before decoding.
struct RawRecord {
  identifier: String,
  kind: String,
  topic: Option<String>,
  origin: String,
  schema_version: i64,
  data: Vec<u8>,
  created_at: i64,
}

const SELECT_COLUMNS: &str =
  "SELECT identifier, kind, topic, origin, schema_version, data, created_at FROM offline_items";

impl SqliteStorage {
  /// Open storage at the default location.
  pub async fn open_default() -> Result<Self> {
    let path = Database::default_path()?;
    Self::open(&path).await
  }

  /// Open storage at `path`, creating it if needed.
  pub async fn open(path: &Path) -> Result<Self> {
    let db = Database::open(path).await?;
    Ok(Self { db })
  }

  pub fn path(&self) -> &Path {
    self.db.path()
  }

  /// Number of records for this content type, readable or not.
  pub async fn len<T: Content>(&self) -> Result<usize> {
    self
      .db
      .interact(|conn| {
        let count: i64 = conn
          .query_row(
            "SELECT COUNT(*) FROM offline_items WHERE entity_type = ?",
            params![T::entity_type()],
            |row| row.get(0),
          )
          .map_err(|e| eyre!("Failed to count offline items: {}", e))?;
        Ok(count as usize)
      })
      .await
  }

  /// Load a progress document.
  pub async fn load_progress<P>(&self, profile: &str) -> Result<Option<P>>
  where
    P: DeserializeOwned + Send + 'static,
  {
    let profile = profile.to_string();
    self
      .db
      .interact(move |conn| {
        let data: Option<String> = conn
          .query_row(
            "SELECT data FROM progress WHERE profile = ?",
            params![profile],
            |row| row.get(0),
          )
          .optional()
          .map_err(|e| eyre!("Failed to read progress: {}", e))?;

        match data {
          Some(json) => {
            let progress = serde_json::from_str(&json)
              .map_err(|e| eyre!("Failed to parse progress for '{}': {}", profile, e))?;
            Ok(Some(progress))
          }
          None => Ok(None),
        }
      })
      .await
  }

  /// Store a progress document, replacing any previous one.
  pub async fn save_progress<P: Serialize>(&self, profile: &str, progress: &P) -> Result<()> {
    let json =
      serde_json::to_string(progress).map_err(|e| eyre!("Failed to serialize progress: {}", e))?;
    let profile = profile.to_string();
    self
      .db
      .interact(move |conn| {
        conn
          .execute(
            "INSERT OR REPLACE INTO progress (profile, data, updated_at)
             VALUES (?, ?, datetime('now'))",
            params![profile, json],
          )
          .map_err(|e| eyre!("Failed to store progress: {}", e))?;
        Ok(())
      })
      .await
  }

  /// Readable items of this content type, optionally narrowed by kind and topic.
  async fn load_where<T: Content>(
    &self,
    kind: Option<&str>,
    topic: Option<&str>,
  ) -> Result<Vec<OfflineItem<T>>> {
    let kind = kind.map(str::to_string);
    let topic = topic.map(str::to_string);

    self
      .db
      .interact(move |conn| {
        let mut sql = format!("{} WHERE entity_type = ?1", SELECT_COLUMNS);
        if kind.is_some() {
          sql.push_str(" AND kind = ?2");
        }
        if topic.is_some() {
          sql.push_str(" AND topic = ?3");
        }
        sql.push_str(" ORDER BY created_at");

        let mut stmt = conn
          .prepare(&sql)
          .map_err(|e| eyre!("Failed to prepare offline query: {}", e))?;

        let rows: Vec<rusqlite::Result<RawRecord>> = match (&kind, &topic) {
          (Some(k), Some(t)) => stmt.query_map(params![T::entity_type(), k, t], read_raw),
          (Some(k), None) => stmt.query_map(params![T::entity_type(), k], read_raw),
          (None, _) => stmt.query_map(params![T::entity_type()], read_raw),
        }
        .map_err(|e| eyre!("Failed to query offline items: {}", e))?
        .collect();

        Ok(rows.into_iter().filter_map(decode_logged).collect())
      })
      .await
  }
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    identifier: row.get(0)?,
    kind: row.get(1)?,
    topic: row.get(2)?,
    origin: row.get(3)?,
    schema_version: row.get(4)?,
    data: row.get(5)?,
    created_at: row.get(6)?,
  })
}

/// Decode a record, or log it as corrupt and drop it.
fn decode_logged<T: Content>(row: rusqlite::Result<RawRecord>) -> Option<OfflineItem<T>> {
  let raw = match row {
    Ok(raw) => raw,
    Err(e) => {
      warn!(kind = ?ErrorKind::StoreCorruption, error = %e, "skipping unreadable offline row");
      return None;
    }
  };
  let identifier = raw.identifier.clone();
  match decode(raw) {
    Ok(item) => Some(item),
    Err(reason) => {
      warn!(kind = ?ErrorKind::StoreCorruption, %identifier, %reason, "skipping corrupt offline record");
      None
    }
  }
}

fn decode<T: Content>(raw: RawRecord) -> std::result::Result<OfflineItem<T>, String> {
  if raw.schema_version != SCHEMA_VERSION {
    return Err(format!("unsupported schema version {}", raw.schema_version));
  }
  let origin = Origin::parse(&raw.origin).ok_or_else(|| format!("unknown origin '{}'", raw.origin))?;
  let created_at = DateTime::from_timestamp_millis(raw.created_at)
    .ok_or_else(|| format!("invalid timestamp {}", raw.created_at))?;
  let payload: T = serde_json::from_slice(&raw.data).map_err(|e| e.to_string())?;
  if !payload.is_well_formed() {
    return Err("payload is not well-formed".to_string());
  }

  Ok(OfflineItem {
    identifier: raw.identifier,
    kind: raw.kind,
    topic: raw.topic,
    payload,
    created_at,
    origin,
  })
}

fn write_item<T: Content>(conn: &Connection, verb: &str, item: &OfflineItem<T>) -> Result<usize> {
  let data =
    serde_json::to_vec(&item.payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;
  let sql = format!(
    "{} INTO offline_items (entity_type, identifier, kind, topic, origin, schema_version, data, created_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    verb
  );
  conn
    .execute(
      &sql,
      params![
        T::entity_type(),
        item.identifier,
        item.kind,
        item.topic,
        item.origin.as_str(),
        SCHEMA_VERSION,
        data,
        item.created_at.timestamp_millis()
      ],
    )
    .map_err(|e| eyre!("Failed to store offline item {}: {}", item.identifier, e))
}

fn pick<T>(mut items: Vec<T>) -> Option<T> {
  if items.is_empty() {
    return None;
  }
  let idx = rand::rng().random_range(0..items.len());
  Some(items.swap_remove(idx))
}

#[async_trait]
impl OfflineStorage for SqliteStorage {
  async fn seed_defaults<T: Content>(&self, items: &[OfflineItem<T>]) -> Result<usize> {
    let items = items.to_vec();
    self
      .db
      .interact(move |conn| {
        let mut written = 0;
        for item in &items {
          written += write_item(conn, "INSERT OR IGNORE", item)?;
        }
        debug!(written, offered = items.len(), "seed_defaults: done");
        Ok(written)
      })
      .await
  }

  async fn save<T: Content>(&self, item: &OfflineItem<T>) -> Result<()> {
    let item = item.clone();
    self
      .db
      .interact(move |conn| write_item(conn, "INSERT OR REPLACE", &item).map(|_| ()))
      .await
  }

  async fn get<T: Content>(&self, identifier: &str) -> Result<Option<OfflineItem<T>>> {
    let identifier = identifier.to_string();
    let row = self
      .db
      .interact(move |conn| {
        conn
          .query_row(
            &format!("{} WHERE entity_type = ? AND identifier = ?", SELECT_COLUMNS),
            params![T::entity_type(), identifier],
            read_raw,
          )
          .optional()
          .map_err(|e| eyre!("Failed to read offline item {}: {}", identifier, e))
      })
      .await?;

    Ok(row.and_then(|raw| decode_logged(Ok(raw))))
  }

  async fn all<T: Content>(&self) -> Result<Vec<OfflineItem<T>>> {
    self.load_where(None, None).await
  }

  async fn random_pick<T: Content>(&self, kind: &str) -> Result<Option<OfflineItem<T>>> {
    Ok(pick(self.load_where(Some(kind), None).await?))
  }

  async fn random_pick_matching<T: Content>(
    &self,
    kind: &str,
    topic: &str,
  ) -> Result<Option<OfflineItem<T>>> {
    Ok(pick(self.load_where(Some(kind), Some(topic)).await?))
  }

  async fn prune_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now - Duration::days(i64::from(days));
    self
      .db
      .interact(move |conn| {
        let removed = conn
          .execute(
            "DELETE FROM offline_items WHERE origin = 'fetched' AND created_at < ?",
            params![cutoff.timestamp_millis()],
          )
          .map_err(|e| eyre!("Failed to prune offline items: {}", e))?;
        debug!(removed, days, "prune_older_than: done");
        Ok(removed)
      })
      .await
  }

  async fn wipe(&self) -> Result<usize> {
    self
      .db
      .interact(|conn| {
        conn
          .execute("DELETE FROM offline_items", [])
          .map_err(|e| eyre!("Failed to wipe offline store: {}", e))
      })
      .await
  }
}
