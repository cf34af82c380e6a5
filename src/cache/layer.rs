//! Tiered resolver that turns an unreliable remote into an always-answering call.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::recency::RecencyCache;
use super::storage::{OfflineItem, OfflineStorage};
use super::synthetic::SyntheticTable;
use super::traits::{Content, FetchResult, SourceTier};
use crate::remote::{ErrorKind, FetchRequest, RemoteError, RemoteSource};
use crate::retry::{execute_with_retry, RetryConfig, RetryError};

/// Resolver that cascades network → recency cache → offline store → synthetic.
///
/// The cache and store are shared handles; every clone of a resolver, and every
/// concurrent `resolve`, works against the same instances.
pub struct FallbackResolver<T, R: ?Sized, S> {
  remote: Arc<R>,
  retry: RetryConfig,
  cache: Arc<RecencyCache<T>>,
  storage: Arc<S>,
  synthetic: Arc<SyntheticTable<T>>,
}

impl<T, R: ?Sized, S> Clone for FallbackResolver<T, R, S> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      retry: self.retry,
      cache: Arc::clone(&self.cache),
      storage: Arc::clone(&self.storage),
      synthetic: Arc::clone(&self.synthetic),
    }
  }
}

impl<T, R, S> FallbackResolver<T, R, S>
where
  T: Content,
  R: RemoteSource<T> + ?Sized,
  S: OfflineStorage,
{
  pub fn new(
    remote: Arc<R>,
    retry: RetryConfig,
    cache: Arc<RecencyCache<T>>,
    storage: Arc<S>,
    synthetic: SyntheticTable<T>,
  ) -> Self {
    if synthetic.is_empty() {
      error!("synthetic table is empty; resolve can fail once every other tier is exhausted");
    }
    Self {
      remote,
      retry,
      cache,
      storage,
      synthetic: Arc::new(synthetic),
    }
  }

  pub fn cache(&self) -> &Arc<RecencyCache<T>> {
    &self.cache
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Resolve a request through the tiers, strictly in order.
  ///
  /// Never returns an error: every path ends in a [`FetchResult`]. `Failure`
  /// only happens with an empty synthetic table.
  pub async fn resolve(&self, request: &FetchRequest) -> FetchResult<T> {
    debug!(request = %request.description(), "resolve: called");

    match self.fetch_network(request).await {
      Ok(payload) => {
        self.remember(request, &payload).await;
        return FetchResult::success(payload, SourceTier::Network);
      }
      Err(e) => {
        info!(
          request = %request.description(),
          kind = ?e.kind(),
          attempts = e.attempts().len(),
          "network tier failed, falling back"
        );
      }
    }

    if let Some(payload) = self.from_cache(request) {
      debug!("resolve: answered from recency cache");
      return FetchResult::success(payload, SourceTier::Cache);
    }

    if let Some(payload) = self.from_offline(request).await {
      debug!("resolve: answered from offline store");
      return FetchResult::success(payload, SourceTier::OfflineStore);
    }

    match self.synthetic.pick() {
      Some(payload) => {
        debug!("resolve: answered with synthetic content");
        FetchResult::success(payload, SourceTier::Synthetic)
      }
      None => {
        error!(
          request = %request.description(),
          "every tier exhausted and synthetic table is empty; this is a configuration bug"
        );
        FetchResult::Failure(ErrorKind::ExhaustedFallback)
      }
    }
  }

  /// Network tier: the remote call under the retry policy, one timeout per attempt.
  async fn fetch_network(&self, request: &FetchRequest) -> std::result::Result<T, RetryError> {
    let remote = &self.remote;
    execute_with_retry(&self.retry, || async move {
      let timeout = remote.attempt_timeout();
      match tokio::time::timeout(timeout, remote.perform_remote_call(request)).await {
        Ok(Ok(payload)) if payload.is_well_formed() => Ok(payload),
        Ok(Ok(_)) => Err(RemoteError::Malformed("payload is empty".to_string())),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(RemoteError::Transient(format!(
          "attempt timed out after {:?}",
          timeout
        ))),
      }
    })
    .await
  }

  /// Record a network success in the cache and the offline store.
  ///
  /// A failed store write is logged; the caller still gets the fresh payload.
  /// The write runs on the store's pool, so it completes even if the caller
  /// stops waiting.
  async fn remember(&self, request: &FetchRequest, payload: &T) {
    let kind = request.match_kind();
    let topic = request.match_topic();
    self.cache.insert(payload.clone(), kind.clone(), topic.clone());

    let item = OfflineItem::fetched(request.identifier(), kind, topic, payload.clone());
    if let Err(e) = self.storage.save(&item).await {
      warn!(error = %e, "failed to persist fetched content");
    }
  }

  /// Cache tier: keyed when the request carries a topic, random otherwise.
  /// Never crosses kinds.
  fn from_cache(&self, request: &FetchRequest) -> Option<T> {
    let kind = request.match_kind();
    match request.match_topic() {
      Some(topic) => self.cache.random_pick_matching(&kind, &topic),
      None => self.cache.random_pick(&kind),
    }
  }

  /// Offline tier: keyed first, then any stored item of the same kind.
  async fn from_offline(&self, request: &FetchRequest) -> Option<T> {
    match self.lookup_offline(request).await {
      Ok(item) => item.map(|i| i.payload),
      Err(e) => {
        warn!(error = %e, "offline store lookup failed");
        None
      }
    }
  }

  async fn lookup_offline(&self, request: &FetchRequest) -> Result<Option<OfflineItem<T>>> {
    let kind = request.match_kind();
    if let Some(topic) = request.match_topic() {
      if let Some(item) = self.storage.random_pick_matching::<T>(&kind, &topic).await? {
        return Ok(Some(item));
      }
    }
    self.storage.random_pick::<T>(&kind).await
  }
}
