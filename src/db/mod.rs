pub mod schema;

use color_eyre::{eyre::eyre, Result};
use deadpool_sqlite::{Config, Hook, HookError, Pool, Runtime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Upper bound on open connections to one database file
const MAX_CONNECTIONS: usize = 8;

/// Pooled SQLite database.
///
/// Every call runs on a pooled connection inside the pool's blocking executor,
/// so independent writes use separate connections and only contend inside
/// SQLite itself.
pub struct Database {
  pool: Pool,
  path: PathBuf,
}

impl Database {
  /// Open or create the database at `path` and run migrations.
  pub async fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)
          .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
      }
    }

    let pool = Config::new(path)
      .builder(Runtime::Tokio1)
      .map_err(|e| eyre!("Failed to create pool builder: {}", e))?
      .max_size(MAX_CONNECTIONS)
      .post_create(setup_hook())
      .build()
      .map_err(|e| eyre!("Failed to build connection pool: {}", e))?;

    let db = Self {
      pool,
      path: path.to_path_buf(),
    };

    db.interact(|conn| {
      conn
        .execute_batch(schema::SCHEMA)
        .map_err(|e| eyre!("Failed to run migrations: {}", e))
    })
    .await?;

    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("steadyfetch").join("offline.db"))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Run `f` with a pooled connection, off the async workers.
  ///
  /// The closure runs to completion even if the returned future is dropped.
  pub async fn interact<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let conn = self
      .pool
      .get()
      .await
      .map_err(|e| eyre!("Failed to get connection from pool: {}", e))?;

    conn
      .interact(move |conn| f(conn))
      .await
      .map_err(|e| eyre!("Database task failed: {}", e))?
  }
}

/// Per-connection setup: busy timeout before WAL so the switch waits on locks.
fn setup_connection(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute_batch(
    "PRAGMA busy_timeout=5000; \
     PRAGMA journal_mode=WAL; \
     PRAGMA synchronous=NORMAL;",
  )
}

fn setup_hook() -> Hook {
  Hook::async_fn(|conn, _metrics| {
    Box::pin(async move {
      conn
        .interact(|conn| setup_connection(conn))
        .await
        .map_err(|e| HookError::Message(format!("interact failed: {e}").into()))?
        .map_err(|e| HookError::Message(format!("connection setup failed: {e}").into()))
    })
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::{Duration, Instant};
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_open_creates_parent_and_schema() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("offline.db");
    let db = Database::open(&path).await.unwrap();
    assert!(path.exists());

    let tables: i64 = db
      .interact(|conn| {
        conn
          .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('offline_items', 'progress')",
            [],
            |row| row.get(0),
          )
          .map_err(|e| eyre!("{}", e))
      })
      .await
      .unwrap();
    assert_eq!(tables, 2);
  }

  #[tokio::test]
  async fn test_connections_use_wal() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("offline.db")).await.unwrap();

    let mode: String = db
      .interact(|conn| {
        conn
          .query_row("PRAGMA journal_mode", [], |row| row.get(0))
          .map_err(|e| eyre!("{}", e))
      })
      .await
      .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
  }

  #[tokio::test]
  async fn test_closure_error_propagates() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("offline.db")).await.unwrap();

    let err = db
      .interact(|conn| {
        conn
          .execute("INSERT INTO no_such_table VALUES (1)", [])
          .map_err(|e| eyre!("insert failed: {}", e))
      })
      .await
      .unwrap_err();
    assert!(err.to_string().contains("insert failed"));

    // The pool is still usable afterwards
    let one: i64 = db
      .interact(|conn| {
        conn
          .query_row("SELECT 1", [], |row| row.get(0))
          .map_err(|e| eyre!("{}", e))
      })
      .await
      .unwrap();
    assert_eq!(one, 1);
  }

  #[tokio::test]
  async fn test_interactions_run_side_by_side() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("offline.db")).await.unwrap();
    let arrived = Arc::new(AtomicU32::new(0));

    // Each closure waits until the other has started; a single shared
    // connection would make the first one give up.
    let rendezvous = || {
      let arrived = Arc::clone(&arrived);
      db.interact(move |_conn| {
        arrived.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(5);
        while arrived.load(Ordering::SeqCst) < 2 {
          if Instant::now() > deadline {
            return Err(eyre!("peer never started"));
          }
          std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
      })
    };

    let (a, b) = tokio::join!(rendezvous(), rendezvous());
    a.unwrap();
    b.unwrap();
  }
}
