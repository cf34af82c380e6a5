//! Last-resort generic content.

use rand::Rng;
use serde_json::json;
use tracing::warn;

use super::traits::Content;

/// Fixed table of generic but valid payloads.
///
/// Entries that are not well-formed are dropped at construction, so a pick
/// always yields something a caller can show.
#[derive(Debug, Clone)]
pub struct SyntheticTable<T> {
  entries: Vec<T>,
}

impl<T: Content> SyntheticTable<T> {
  pub fn new(entries: Vec<T>) -> Self {
    let offered = entries.len();
    let entries: Vec<T> = entries.into_iter().filter(|e| e.is_well_formed()).collect();
    if entries.len() != offered {
      warn!(
        dropped = offered - entries.len(),
        "synthetic table: dropped entries that are not well-formed"
      );
    }
    Self { entries }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Pseudo-random entry. `None` only for an empty (misconfigured) table.
  pub fn pick(&self) -> Option<T> {
    if self.entries.is_empty() {
      return None;
    }
    let idx = rand::rng().random_range(0..self.entries.len());
    Some(self.entries[idx].clone())
  }
}

/// Built-in table for opaque JSON content.
pub fn default_json_table() -> SyntheticTable<serde_json::Value> {
  SyntheticTable::new(vec![
    json!({
      "title": "The Quiet Lighthouse",
      "body": "A lighthouse keeper counts the ships that pass each night and writes one kind word about every captain.",
      "synthetic": true
    }),
    json!({
      "title": "The Lost Kite",
      "body": "A red kite drifts over three villages before a child on a hill finally catches its string.",
      "synthetic": true
    }),
    json!({
      "title": "The Patient Garden",
      "body": "Nothing grows for weeks, and then one morning the whole garden wakes up at once.",
      "synthetic": true
    }),
    json!({
      "title": "The Night Train",
      "body": "Every passenger on the last train carries a story, and the conductor collects one before each stop.",
      "synthetic": true
    }),
  ])
}
