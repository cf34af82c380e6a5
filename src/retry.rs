//! Bounded retries with capped exponential backoff.
//!
//! Each failure is classified through [`RemoteError::is_retryable`]. Fatal
//! failures and the final attempt propagate immediately; everything else waits
//! on a tokio timer before trying again.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::remote::{ErrorKind, RemoteError};

/// Retry policy. Every field is required; there are no hidden defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawRetryConfig")]
pub struct RetryConfig {
  max_attempts: u32,
  initial_delay: Duration,
  backoff_multiplier: f64,
  max_delay: Duration,
}

#[derive(Deserialize)]
struct RawRetryConfig {
  max_attempts: u32,
  initial_delay_ms: u64,
  backoff_multiplier: f64,
  max_delay_ms: u64,
}

impl TryFrom<RawRetryConfig> for RetryConfig {
  type Error = String;

  fn try_from(raw: RawRetryConfig) -> std::result::Result<Self, Self::Error> {
    RetryConfig::new(
      raw.max_attempts,
      Duration::from_millis(raw.initial_delay_ms),
      raw.backoff_multiplier,
      Duration::from_millis(raw.max_delay_ms),
    )
    .map_err(|e| e.to_string())
  }
}

impl RetryConfig {
  pub fn new(
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    max_delay: Duration,
  ) -> Result<Self> {
    if max_attempts < 1 {
      return Err(eyre!("retry.max_attempts must be at least 1, got {}", max_attempts));
    }
    if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
      return Err(eyre!(
        "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
        backoff_multiplier
      ));
    }

    Ok(Self {
      max_attempts,
      initial_delay,
      backoff_multiplier,
      max_delay,
    })
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  pub fn initial_delay(&self) -> Duration {
    self.initial_delay
  }

  pub fn backoff_multiplier(&self) -> f64 {
    self.backoff_multiplier
  }

  pub fn max_delay(&self) -> Duration {
    self.max_delay
  }

  /// Wait after the failed attempt at zero-based `index`:
  /// `initial_delay * backoff_multiplier^index`, clamped to `max_delay`.
  pub fn delay_for(&self, index: u32) -> Duration {
    let max_nanos = self.max_delay.as_nanos() as f64;
    let exponent = i32::try_from(index).unwrap_or(i32::MAX);
    let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
    if nanos >= max_nanos {
      return self.max_delay;
    }
    Duration::from_nanos(nanos.round() as u64)
  }

  /// The waits taken between attempts when every attempt fails with a
  /// retryable error: `max_attempts - 1` entries.
  pub fn delays(&self) -> Vec<Duration> {
    (0..self.max_attempts - 1).map(|i| self.delay_for(i)).collect()
  }
}

/// Whether an attempt's failure allowed another try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
  Retryable,
  Fatal,
}

/// Record of one failed attempt. Lives only as long as the call that made it,
/// and is handed back inside [`RetryError`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
  /// Zero-based attempt index
  pub index: u32,
  /// Wait taken after this attempt (zero for the terminal one)
  pub backoff: Duration,
  pub outcome: AttemptOutcome,
  pub kind: ErrorKind,
}

/// Failure of [`execute_with_retry`].
#[derive(Debug, Clone, Error)]
pub enum RetryError {
  #[error("Network exhausted after {} attempts: {last}", attempts.len())]
  Exhausted {
    attempts: Vec<RetryAttempt>,
    last: RemoteError,
  },

  #[error("Fatal error on attempt {}: {last}", attempts.len())]
  Fatal {
    attempts: Vec<RetryAttempt>,
    last: RemoteError,
  },
}

impl RetryError {
  pub fn attempts(&self) -> &[RetryAttempt] {
    match self {
      RetryError::Exhausted { attempts, .. } | RetryError::Fatal { attempts, .. } => attempts,
    }
  }

  pub fn last_error(&self) -> &RemoteError {
    match self {
      RetryError::Exhausted { last, .. } | RetryError::Fatal { last, .. } => last,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    self.last_error().kind()
  }
}

/// Run `operation` until it succeeds, fails fatally, or runs out of attempts.
///
/// Waits are `tokio::time::sleep`, so dropping the returned future cancels both
/// the in-flight attempt and any pending wait.
pub async fn execute_with_retry<T, F, Fut>(
  config: &RetryConfig,
  mut operation: F,
) -> std::result::Result<T, RetryError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = std::result::Result<T, RemoteError>>,
{
  let mut attempts = Vec::new();
  let mut attempt = 0u32;

  loop {
    let err = match operation().await {
      Ok(value) => {
        debug!(attempt, "execute_with_retry: success");
        return Ok(value);
      }
      Err(e) => e,
    };

    let kind = err.kind();
    let is_last = attempt + 1 >= config.max_attempts;

    if !err.is_retryable() {
      debug!(attempt, ?kind, error = %err, "execute_with_retry: fatal error");
      attempts.push(RetryAttempt {
        index: attempt,
        backoff: Duration::ZERO,
        outcome: AttemptOutcome::Fatal,
        kind,
      });
      return Err(RetryError::Fatal { attempts, last: err });
    }

    if is_last {
      warn!(attempt, ?kind, error = %err, "execute_with_retry: attempts exhausted");
      attempts.push(RetryAttempt {
        index: attempt,
        backoff: Duration::ZERO,
        outcome: AttemptOutcome::Retryable,
        kind,
      });
      return Err(RetryError::Exhausted { attempts, last: err });
    }

    let backoff = config.delay_for(attempt);
    warn!(
      attempt,
      backoff_ms = backoff.as_millis() as u64,
      error = %err,
      "execute_with_retry: retrying after transient error"
    );
    attempts.push(RetryAttempt {
      index: attempt,
      backoff,
      outcome: AttemptOutcome::Retryable,
      kind,
    });

    tokio::time::sleep(backoff).await;
    attempt += 1;
  }
}
