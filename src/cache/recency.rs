//! Fixed-capacity, insertion-ordered memory of recent successes.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One remembered payload. Never leaves the cache by reference.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
  payload: T,
  /// Normalized kind of the request that produced the payload
  kind: String,
  /// Normalized topic of the request that produced the payload
  topic: Option<String>,
  seq: u64,
}

#[derive(Debug)]
struct Inner<T> {
  entries: VecDeque<CacheEntry<T>>,
  next_seq: u64,
}

/// Bounded FIFO cache.
///
/// Insertion appends; once the cache is over capacity the oldest entry goes.
/// Reads do not affect eviction order and duplicates are kept until they age
/// out. Lives for the process only.
#[derive(Debug)]
pub struct RecencyCache<T> {
  inner: Mutex<Inner<T>>,
  capacity: usize,
}

impl<T: Clone> RecencyCache<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: Mutex::new(Inner {
        entries: VecDeque::with_capacity(capacity + 1),
        next_seq: 0,
      }),
      capacity,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
    // Entries stay consistent even if a holder panicked mid-read
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Append a payload, evicting the oldest entry when over capacity.
  ///
  /// Returns the sequence number assigned to the new entry.
  pub fn insert(&self, payload: T, kind: impl Into<String>, topic: Option<String>) -> u64 {
    let mut inner = self.lock();
    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.entries.push_back(CacheEntry {
      payload,
      kind: kind.into(),
      topic,
      seq,
    });
    while inner.entries.len() > self.capacity {
      inner.entries.pop_front();
    }
    seq
  }

  /// Copies of every payload, oldest first.
  pub fn all(&self) -> Vec<T> {
    self.lock().entries.iter().map(|e| e.payload.clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().entries.is_empty()
  }

  /// Uniformly random entry of `kind`, if any.
  pub fn random_pick(&self, kind: &str) -> Option<T> {
    self.pick_where(|e| e.kind == kind)
  }

  /// Uniformly random entry of `kind` stored under `topic`.
  pub fn random_pick_matching(&self, kind: &str, topic: &str) -> Option<T> {
    self.pick_where(|e| e.kind == kind && e.topic.as_deref() == Some(topic))
  }

  fn pick_where(&self, matches: impl Fn(&CacheEntry<T>) -> bool) -> Option<T> {
    let inner = self.lock();
    let candidates: Vec<&CacheEntry<T>> = inner.entries.iter().filter(|e| matches(*e)).collect();
    if candidates.is_empty() {
      return None;
    }
    let idx = rand::rng().random_range(0..candidates.len());
    Some(candidates[idx].payload.clone())
  }

  /// Sequence numbers currently held, oldest first.
  pub fn sequence_numbers(&self) -> Vec<u64> {
    self.lock().entries.iter().map(|e| e.seq).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  #[test]
  fn test_evicts_oldest_past_capacity() {
    let cache = RecencyCache::new(50);
    for i in 1..=51 {
      cache.insert(i, "story", None);
    }

    let all = cache.all();
    assert_eq!(all.len(), 50);
    assert!(!all.contains(&1));
    assert!(all.contains(&51));
    assert_eq!(all.first(), Some(&2));
  }

  #[test]
  fn test_insertion_order_ignores_reads() {
    let cache = RecencyCache::new(3);
    cache.insert("a", "story", None);
    cache.insert("b", "story", None);
    cache.insert("c", "story", None);

    // Reading "a" must not protect it
    for _ in 0..10 {
      cache.random_pick("story");
    }
    cache.insert("d", "story", None);

    assert_eq!(cache.all(), vec!["b", "c", "d"]);
  }

  #[test]
  fn test_duplicates_coexist() {
    let cache = RecencyCache::new(4);
    cache.insert("same", "story", Some("t".to_string()));
    cache.insert("same", "story", Some("t".to_string()));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.sequence_numbers(), vec![0, 1]);
  }

  #[test]
  fn test_random_pick_empty() {
    let cache: RecencyCache<u32> = RecencyCache::new(5);
    assert!(cache.is_empty());
    assert_eq!(cache.random_pick("story"), None);
    assert_eq!(cache.random_pick_matching("story", "any"), None);
  }

  #[test]
  fn test_random_pick_returns_member() {
    let cache = RecencyCache::new(5);
    for i in 0..5 {
      cache.insert(i, "story", None);
    }
    for _ in 0..20 {
      let picked = cache.random_pick("story").unwrap();
      assert!((0..5).contains(&picked));
    }
  }

  #[test]
  fn test_random_pick_matching_topic() {
    let cache = RecencyCache::new(10);
    cache.insert("forest tale", "story", Some("forest".to_string()));
    cache.insert("sea tale", "story", Some("sea".to_string()));
    cache.insert("untagged", "story", None);

    for _ in 0..10 {
      assert_eq!(cache.random_pick_matching("story", "sea"), Some("sea tale"));
    }
    assert_eq!(cache.random_pick_matching("story", "desert"), None);
  }

  #[test]
  fn test_picks_never_cross_kinds() {
    let cache = RecencyCache::new(10);
    cache.insert("space story", "story", Some("space".to_string()));

    assert_eq!(cache.random_pick_matching("image", "space"), None);
    assert_eq!(cache.random_pick("image"), None);
    assert_eq!(cache.random_pick("story"), Some("space story"));

    cache.insert("space image", "image", Some("space".to_string()));
    for _ in 0..10 {
      assert_eq!(cache.random_pick_matching("image", "space"), Some("space image"));
      assert_eq!(cache.random_pick("image"), Some("space image"));
    }
  }

  #[test]
  fn test_concurrent_inserts_respect_capacity() {
    let cache = Arc::new(RecencyCache::new(16));

    std::thread::scope(|s| {
      for t in 0..8 {
        let cache = Arc::clone(&cache);
        s.spawn(move || {
          for i in 0..100 {
            cache.insert(t * 1000 + i, "story", None);
            assert!(cache.len() <= 16);
          }
        });
      }
    });

    assert_eq!(cache.len(), 16);
    // 800 inserts in total, so the survivors are the last 16 sequence numbers
    assert_eq!(cache.sequence_numbers(), (784..800).collect::<Vec<u64>>());
  }
}
