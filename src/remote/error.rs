//! Remote call error types and their retry classification.

use thiserror::Error;

/// Status codes worth another attempt.
fn is_retryable_status(status: u16) -> bool {
  matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Classification of every failure the delivery subsystem knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// Connectivity failure or timeout (including HTTP 408)
  TransientNetwork,
  /// HTTP 429
  ServerOverload,
  /// HTTP 500, 502, 503, 504
  ServerFault,
  /// Any other 4xx
  ClientRequest,
  /// Any other non-success status (501, 505, 3xx...)
  UnexpectedStatus,
  /// The remote answered with something we could not use
  MalformedResponse,
  /// One persisted record could not be decoded
  StoreCorruption,
  /// Every tier, synthetic included, came up empty
  ExhaustedFallback,
}

impl ErrorKind {
  /// Classify an HTTP status code.
  pub fn from_status(status: u16) -> Self {
    match status {
      408 => ErrorKind::TransientNetwork,
      429 => ErrorKind::ServerOverload,
      500 | 502 | 503 | 504 => ErrorKind::ServerFault,
      400..=499 => ErrorKind::ClientRequest,
      _ => ErrorKind::UnexpectedStatus,
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      ErrorKind::TransientNetwork | ErrorKind::ServerOverload | ErrorKind::ServerFault
    )
  }
}

/// Errors raised by a remote collaborator.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
  #[error("Network error: {0}")]
  Transient(String),

  #[error("Remote returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Malformed response: {0}")]
  Malformed(String),
}

impl RemoteError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      RemoteError::Transient(_) => ErrorKind::TransientNetwork,
      RemoteError::Status { status, .. } => ErrorKind::from_status(*status),
      RemoteError::Malformed(_) => ErrorKind::MalformedResponse,
    }
  }

  /// Check if this error is worth retrying
  pub fn is_retryable(&self) -> bool {
    match self {
      RemoteError::Transient(_) => true,
      RemoteError::Status { status, .. } => is_retryable_status(*status),
      RemoteError::Malformed(_) => false,
    }
  }
}

impl From<reqwest::Error> for RemoteError {
  fn from(e: reqwest::Error) -> Self {
    if let Some(status) = e.status() {
      return RemoteError::Status {
        status: status.as_u16(),
        message: e.to_string(),
      };
    }
    if e.is_decode() {
      return RemoteError::Malformed(e.to_string());
    }
    RemoteError::Transient(e.to_string())
  }
}

impl From<serde_json::Error> for RemoteError {
  fn from(e: serde_json::Error) -> Self {
    RemoteError::Malformed(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status(code: u16) -> RemoteError {
    RemoteError::Status {
      status: code,
      message: "test".to_string(),
    }
  }

  #[test]
  fn test_retryable_statuses() {
    for code in [408, 429, 500, 502, 503, 504] {
      assert!(status(code).is_retryable(), "{} should retry", code);
      assert!(status(code).kind().is_retryable());
    }
  }

  #[test]
  fn test_fatal_statuses() {
    for code in [400, 401, 403, 404, 409, 422, 501, 505, 302] {
      assert!(!status(code).is_retryable(), "{} should be fatal", code);
      assert!(!status(code).kind().is_retryable());
    }
  }

  #[test]
  fn test_status_kinds() {
    assert_eq!(status(408).kind(), ErrorKind::TransientNetwork);
    assert_eq!(status(429).kind(), ErrorKind::ServerOverload);
    assert_eq!(status(503).kind(), ErrorKind::ServerFault);
    assert_eq!(status(404).kind(), ErrorKind::ClientRequest);
    assert_eq!(status(501).kind(), ErrorKind::UnexpectedStatus);
  }

  #[test]
  fn test_transient_and_malformed() {
    let err = RemoteError::Transient("connection reset".to_string());
    assert!(err.is_retryable());
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);

    let err = RemoteError::Malformed("expected value at line 1".to_string());
    assert!(!err.is_retryable());
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
  }

  #[test]
  fn test_json_error_is_malformed() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: RemoteError = json_err.into();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
  }
}
