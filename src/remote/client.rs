use async_trait::async_trait;
use reqwest::Client;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

use crate::cache::Content;
use crate::config::{Config, RemoteConfig};

use super::error::RemoteError;
use super::request::FetchRequest;

/// The single outbound operation the subsystem depends on.
///
/// Implementations do not retry; retrying is the caller's job.
#[async_trait]
pub trait RemoteSource<T: Content>: Send + Sync {
  async fn perform_remote_call(&self, request: &FetchRequest) -> Result<T, RemoteError>;

  /// Upper bound on a single attempt.
  fn attempt_timeout(&self) -> Duration;
}

/// JSON-over-HTTP remote.
///
/// POSTs the request as JSON and decodes the response body as the payload type.
pub struct HttpRemote<T> {
  http: Client,
  url: url::Url,
  token: Option<String>,
  timeout: Duration,
  _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for HttpRemote<T> {
  fn clone(&self) -> Self {
    Self {
      http: self.http.clone(),
      url: self.url.clone(),
      token: self.token.clone(),
      timeout: self.timeout,
      _payload: PhantomData,
    }
  }
}

impl<T: Content> HttpRemote<T> {
  pub fn new(config: &RemoteConfig) -> color_eyre::Result<Self> {
    use color_eyre::eyre::eyre;

    let url = url::Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid remote url '{}': {}", config.url, e))?;
    let timeout = Duration::from_millis(config.timeout_ms);
    let http = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      url,
      token: Config::get_api_token(),
      timeout,
      _payload: PhantomData,
    })
  }
}

#[async_trait]
impl<T: Content> RemoteSource<T> for HttpRemote<T> {
  async fn perform_remote_call(&self, request: &FetchRequest) -> Result<T, RemoteError> {
    debug!(request = %request.description(), url = %self.url, "perform_remote_call: called");

    let mut builder = self.http.post(self.url.clone()).json(request);
    if let Some(token) = &self.token {
      builder = builder.bearer_auth(token);
    }

    let response = builder.send().await?;
    let status = response.status();

    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      debug!(status = status.as_u16(), "perform_remote_call: non-success status");
      return Err(RemoteError::Status {
        status: status.as_u16(),
        message,
      });
    }

    let body = response.bytes().await?;
    let payload: T = serde_json::from_slice(&body)?;
    Ok(payload)
  }

  fn attempt_timeout(&self) -> Duration {
    self.timeout
  }
}
