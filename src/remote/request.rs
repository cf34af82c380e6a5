//! Request keys for remote content.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Identifies what content a caller wants.
///
/// The subsystem never interprets `kind` or `params`; they are forwarded to the
/// remote and hashed into a stable identifier for persistence. `topic` is the
/// thematic tag used for keyed lookups when the network is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub topic: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub params: BTreeMap<String, String>,
}

impl FetchRequest {
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      topic: None,
      params: BTreeMap::new(),
    }
  }

  pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
    self.topic = Some(topic.into());
    self
  }

  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  /// Normalized kind; lookups never cross kinds.
  pub fn match_kind(&self) -> String {
    normalize(&self.kind)
  }

  /// Normalized topic used for keyed matching.
  pub fn match_topic(&self) -> Option<String> {
    self.topic.as_deref().map(normalize)
  }

  /// Stable identifier derived from the request.
  ///
  /// Two requests that differ only in case or surrounding whitespace map to the
  /// same identifier. The hash input is the JSON encoding of the normalized
  /// fields, so separators inside values cannot make two requests collide.
  pub fn identifier(&self) -> String {
    let params: BTreeMap<String, String> = self
      .params
      .iter()
      .map(|(k, v)| (normalize(k), normalize(v)))
      .collect();
    let key = (self.match_kind(), self.match_topic(), params);

    // Tuples of strings and maps always encode
    let input = serde_json::to_vec(&key).unwrap_or_default();

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(&input);
    let result = hasher.finalize();
    hex::encode(result)
  }

  /// Human readable form for logs.
  pub fn description(&self) -> String {
    match &self.topic {
      Some(topic) => format!("{} ({})", self.kind, topic),
      None => self.kind.clone(),
    }
  }
}

/// Trims whitespace and lowercases for case-insensitive matching.
pub(crate) fn normalize(s: &str) -> String {
  s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identifier_is_stable() {
    let a = FetchRequest::new("story").with_topic("space");
    let b = FetchRequest::new("story").with_topic("space");
    assert_eq!(a.identifier(), b.identifier());
    assert_eq!(a.identifier().len(), 64);
  }

  #[test]
  fn test_identifier_normalizes() {
    let a = FetchRequest::new("Story").with_topic("  Space ");
    let b = FetchRequest::new("story").with_topic("space");
    assert_eq!(a.identifier(), b.identifier());
  }

  #[test]
  fn test_identifier_depends_on_params() {
    let a = FetchRequest::new("dialogue").with_param("turn", "1");
    let b = FetchRequest::new("dialogue").with_param("turn", "2");
    assert_ne!(a.identifier(), b.identifier());
  }

  #[test]
  fn test_identifier_separators_do_not_collide() {
    let packed = FetchRequest::new("story").with_param("a", "b&c=d");
    let split = FetchRequest::new("story")
      .with_param("a", "b")
      .with_param("c", "d");
    assert_ne!(packed.identifier(), split.identifier());

    let colon_kind = FetchRequest::new("story:space");
    let topic = FetchRequest::new("story").with_topic("space");
    assert_ne!(colon_kind.identifier(), topic.identifier());
  }

  #[test]
  fn test_match_kind_and_topic_are_normalized() {
    let request = FetchRequest::new(" Image ").with_topic("SPACE");
    assert_eq!(request.match_kind(), "image");
    assert_eq!(request.match_topic().as_deref(), Some("space"));
    assert_eq!(FetchRequest::new("image").match_topic(), None);
  }

  #[test]
  fn test_description() {
    assert_eq!(
      FetchRequest::new("story").with_topic("ocean").description(),
      "story (ocean)"
    );
    assert_eq!(FetchRequest::new("story").description(), "story");
  }
}
