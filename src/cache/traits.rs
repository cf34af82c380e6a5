//! Core traits and types for the delivery tiers.

use serde::{de::DeserializeOwned, Serialize};

use crate::remote::ErrorKind;

/// Trait for payloads that can travel through the tiers.
///
/// Payloads are opaque to the subsystem apart from a storage namespace and a
/// well-formedness check.
pub trait Content: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Entity type name for storage organization (e.g., "story", "image")
  fn entity_type() -> &'static str;

  /// False for payloads that must never be handed to a caller (null, empty).
  fn is_well_formed(&self) -> bool {
    true
  }
}

/// Opaque JSON content, used by the CLI.
impl Content for serde_json::Value {
  fn entity_type() -> &'static str {
    "content"
  }

  fn is_well_formed(&self) -> bool {
    match self {
      serde_json::Value::Null => false,
      serde_json::Value::String(s) => !s.trim().is_empty(),
      serde_json::Value::Array(a) => !a.is_empty(),
      serde_json::Value::Object(o) => !o.is_empty(),
      _ => true,
    }
  }
}

/// Indicates which tier answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTier {
  /// Fresh data from the network
  Network,
  /// Recently fetched data held in memory
  Cache,
  /// Data from the persistent offline store
  OfflineStore,
  /// Built-in generic content
  Synthetic,
}

impl SourceTier {
  /// True when the caller may want to show a "using saved content" hint.
  pub fn is_fallback(&self) -> bool {
    !matches!(self, SourceTier::Network)
  }
}

impl std::fmt::Display for SourceTier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      SourceTier::Network => "network",
      SourceTier::Cache => "cache",
      SourceTier::OfflineStore => "offline",
      SourceTier::Synthetic => "synthetic",
    };
    f.write_str(name)
  }
}

/// Outcome of a resolve: always tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
  Success { payload: T, tier: SourceTier },
  Failure(ErrorKind),
}

impl<T> FetchResult<T> {
  pub fn success(payload: T, tier: SourceTier) -> Self {
    FetchResult::Success { payload, tier }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, FetchResult::Success { .. })
  }

  pub fn tier(&self) -> Option<SourceTier> {
    match self {
      FetchResult::Success { tier, .. } => Some(*tier),
      FetchResult::Failure(_) => None,
    }
  }

  pub fn payload(&self) -> Option<&T> {
    match self {
      FetchResult::Success { payload, .. } => Some(payload),
      FetchResult::Failure(_) => None,
    }
  }

  pub fn into_payload(self) -> Option<T> {
    match self {
      FetchResult::Success { payload, .. } => Some(payload),
      FetchResult::Failure(_) => None,
    }
  }
}
