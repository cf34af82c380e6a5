//! Application wiring: config in, ready-to-use resolver and progress store out.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::{
  default_json_table, Content, FallbackResolver, FetchResult, OfflineItem, OfflineStorage,
  RecencyCache, SqliteStorage, SyntheticTable,
};
use crate::config::Config;
use crate::progress::{ProgressTracker, StreakState};
use crate::remote::{normalize, FetchRequest, HttpRemote, RemoteSource};

/// Bundle compiled into the binary, seeded on every start.
const BUILTIN_BUNDLE: &str = include_str!("../assets/offline_bundle.yaml");

/// Progress profile used by the CLI
const DEFAULT_PROFILE: &str = "default";

pub type Resolver = FallbackResolver<Value, dyn RemoteSource<Value>, SqliteStorage>;

/// One entry of a seed bundle file.
#[derive(Debug, Deserialize)]
struct BundleEntry {
  identifier: Option<String>,
  kind: String,
  topic: Option<String>,
  payload: Value,
}

/// Parse a YAML seed bundle. Entries without an identifier get one derived
/// from their payload; entries that are not well-formed are skipped.
pub fn parse_bundle(contents: &str) -> Result<Vec<OfflineItem<Value>>> {
  let entries: Vec<BundleEntry> =
    serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse seed bundle: {}", e))?;

  let mut items = Vec::with_capacity(entries.len());
  for entry in entries {
    if !entry.payload.is_well_formed() {
      warn!(identifier = ?entry.identifier, "skipping empty bundle entry");
      continue;
    }
    let identifier = match entry.identifier {
      Some(id) => id,
      None => {
        let mut hasher = Sha256::new();
        hasher.update(normalize(&entry.kind).as_bytes());
        hasher.update(entry.payload.to_string().as_bytes());
        format!("seed-{}", hex::encode(hasher.finalize()))
      }
    };
    let topic = entry.topic.as_deref().map(normalize);
    items.push(OfflineItem::seed(
      identifier,
      normalize(&entry.kind),
      topic,
      entry.payload,
    ));
  }
  Ok(items)
}

/// Everything a caller needs, built once from config.
pub struct App {
  config: Config,
  storage: Arc<SqliteStorage>,
  resolver: Resolver,
  progress_lock: Mutex<()>,
}

impl App {
  /// Open the app with the HTTP remote described in config.
  pub async fn open(config: Config) -> Result<Self> {
    let remote: Arc<dyn RemoteSource<Value>> = Arc::new(HttpRemote::<Value>::new(&config.remote)?);
    Self::with_remote(config, remote).await
  }

  /// Open the app against an arbitrary remote.
  ///
  /// Seeds the offline store and prunes stale fetched content before returning.
  pub async fn with_remote(config: Config, remote: Arc<dyn RemoteSource<Value>>) -> Result<Self> {
    let path = match &config.offline.path {
      Some(p) => p.clone(),
      None => crate::db::Database::default_path()?,
    };
    let storage = Arc::new(SqliteStorage::open(&path).await?);

    let synthetic = match &config.synthetic {
      Some(entries) => SyntheticTable::new(entries.clone()),
      None => default_json_table(),
    };

    let resolver = FallbackResolver::new(
      remote,
      config.retry,
      Arc::new(RecencyCache::new(config.cache.capacity)),
      Arc::clone(&storage),
      synthetic,
    );

    let app = Self {
      config,
      storage,
      resolver,
      progress_lock: Mutex::new(()),
    };

    let seeded = app.seed().await?;
    let pruned = app.prune(app.config.offline.prune_after_days).await?;
    info!(seeded, pruned, path = %app.storage.path().display(), "offline store ready");

    Ok(app)
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn resolver(&self) -> &Resolver {
    &self.resolver
  }

  /// Resolve a request through every tier.
  pub async fn fetch(&self, request: &FetchRequest) -> FetchResult<Value> {
    self.resolver.resolve(request).await
  }

  /// Seed the built-in bundle plus the configured one. Idempotent.
  pub async fn seed(&self) -> Result<usize> {
    let mut items = parse_bundle(BUILTIN_BUNDLE)?;
    if let Some(bundle) = &self.config.offline.bundle {
      items.extend(load_bundle_file(bundle)?);
    }
    self.storage.seed_defaults(&items).await
  }

  /// Prune fetched content older than `days`.
  pub async fn prune(&self, days: u32) -> Result<usize> {
    self.storage.prune_older_than(days, chrono::Utc::now()).await
  }

  pub async fn list(&self) -> Result<Vec<OfflineItem<Value>>> {
    self.storage.all::<Value>().await
  }

  pub async fn wipe(&self) -> Result<usize> {
    self.storage.wipe().await
  }

  /// Record activity for `date` and persist the updated progress.
  pub async fn record_activity(&self, date: NaiveDate) -> Result<StreakState> {
    let _guard = self.progress_lock.lock().await;
    let mut tracker: ProgressTracker = self
      .storage
      .load_progress(DEFAULT_PROFILE)
      .await?
      .unwrap_or_default();
    let state = tracker.record_activity(date);
    self.storage.save_progress(DEFAULT_PROFILE, &tracker).await?;
    Ok(state)
  }
}

fn load_bundle_file(path: &Path) -> Result<Vec<OfflineItem<Value>>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read seed bundle {}: {}", path.display(), e))?;
  parse_bundle(&contents)
}
