//! Resilient content delivery.
//!
//! Turns an unreliable, latency-variable remote call into an operation that
//! always answers: the remote is tried under a bounded retry policy, then a
//! bounded recency cache, then a persistent offline store, then a table of
//! synthetic defaults. Every answer is tagged with the tier that produced it.
//!
//! The crate also carries the streak calculator used by progress tracking.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod progress;
pub mod remote;
pub mod retry;

pub use cache::{FallbackResolver, FetchResult, SourceTier};
pub use remote::{ErrorKind, FetchRequest, RemoteError, RemoteSource};
pub use retry::{execute_with_retry, RetryConfig, RetryError};
