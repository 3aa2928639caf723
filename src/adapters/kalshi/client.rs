//! Kalshi HTTP Client - Rate-limited REST API Client
//!
//! Wraps reqwest with request signing, a request budget, bounded
//! concurrency and retries for all Kalshi trade API interactions.
//! Shared by every engine through `Arc`.
//!
//! With an API key every attempt is signed afresh. With login
//! credentials a session token is obtained once and refreshed on 401.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::auth::KalshiCredentials;
use super::types::{LoginRequest, LoginResponse};
use crate::config::ApiConfig;
use crate::error::ExchangeError;

/// Configuration for the Kalshi HTTP client.
#[derive(Debug, Clone)]
pub struct KalshiClientConfig {
  /// Base URL including the `/trade-api/v2` prefix.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Client-side request budget.
  pub requests_per_second: u32,
}

impl From<&ApiConfig> for KalshiClientConfig {
  fn from(api: &ApiConfig) -> Self {
    Self {
      base_url: api.base_url.trim_end_matches('/').to_string(),
      timeout: Duration::from_millis(api.timeout_ms),
      max_concurrent: api.max_concurrent,
      max_retries: api.max_retries,
      retry_base_delay: Duration::from_millis(api.retry_base_delay_ms),
      requests_per_second: api.requests_per_second,
    }
  }
}

impl Default for KalshiClientConfig {
  fn default() -> Self {
    Self::from(&ApiConfig::default())
  }
}

/// Rate-limited HTTP client for the Kalshi trade API.
pub struct KalshiClient {
  http: Client,
  credentials: KalshiCredentials,
  config: KalshiClientConfig,
  /// Path part of `base_url`, prefixed to every signed path.
  path_prefix: String,
  /// Bearer token from the last successful login.
  token: RwLock<Option<String>>,
  semaphore: Semaphore,
  limiter: DefaultDirectRateLimiter,
}

impl KalshiClient {
  pub fn new(credentials: KalshiCredentials, config: KalshiClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(config.max_concurrent.max(1))
      .build()
      .context("Failed to build HTTP client")?;

    let per_second = NonZeroU32::new(config.requests_per_second)
      .context("requests_per_second must be positive")?;
    let base = Url::parse(&config.base_url)
      .with_context(|| format!("Invalid base URL: {}", config.base_url))?;
    let path_prefix = base.path().trim_end_matches('/').to_string();
    let semaphore = Semaphore::new(config.max_concurrent.max(1));

    Ok(Self {
      http,
      credentials,
      config,
      path_prefix,
      token: RwLock::new(None),
      semaphore,
      limiter: RateLimiter::direct(Quota::per_second(per_second)),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url, path)
  }

  /// Path that gets signed for a request to `path`.
  pub fn signing_path(&self, path: &str) -> String {
    format!("{}{}", self.path_prefix, path)
  }

  /// Start a session and store its token. A no-op for API-key auth,
  /// which signs each request instead.
  pub async fn login(&self) -> Result<(), ExchangeError> {
    let KalshiCredentials::Login { email, password } = &self.credentials else {
      info!(scheme = self.credentials.scheme(), "Using signed API key requests");
      return Ok(());
    };
    self.limiter.until_ready().await;
    let body = LoginRequest {
      email: email.as_str(),
      password: password.as_str(),
    };
    let response = self
      .http
      .post(self.url("/login"))
      .json(&body)
      .send()
      .await
      .map_err(|e| ExchangeError::Transport(e.to_string()))?;

    if !response.status().is_success() {
      let status = response.status();
      let text = response.text().await.unwrap_or_default();
      return Err(ExchangeError::Auth(format!("login rejected ({status}): {text}")));
    }

    let login: LoginResponse = response
      .json()
      .await
      .map_err(|e| ExchangeError::Decode(e.to_string()))?;
    *self.token.write().await = Some(login.token);
    info!(member_id = ?login.member_id, "Logged in to Kalshi");
    Ok(())
  }

  /// End the session. Safe to call without one.
  pub async fn logout(&self) -> Result<(), ExchangeError> {
    let Some(token) = self.token.write().await.take() else {
      return Ok(());
    };
    let response = self
      .http
      .post(self.url("/logout"))
      .bearer_auth(token)
      .send()
      .await
      .map_err(|e| ExchangeError::Transport(e.to_string()))?;
    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(ExchangeError::Rejected { status, body });
    }
    info!("Logged out of Kalshi");
    Ok(())
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ExchangeError> {
    let response = self.send(Method::GET, path, query, None::<&()>).await?;
    decode(response).await
  }

  pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ExchangeError> {
    let response = self.send(Method::POST, path, &[], Some(body)).await?;
    decode(response).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ExchangeError> {
    let response = self.send(Method::DELETE, path, &[], None::<&()>).await?;
    decode(response).await
  }

  /// Send with retries. With session auth, a 401 triggers one fresh
  /// login and a resend.
  async fn send<B: Serialize + Sync>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<&B>,
  ) -> Result<Response, ExchangeError> {
    match self.execute_with_retry(method.clone(), path, query, body).await {
      Err(ExchangeError::Auth(reason)) if self.credentials.uses_session() => {
        warn!(path, reason = %reason, "Session rejected, logging in again");
        self.login().await?;
        self.execute_with_retry(method, path, query, body).await
      }
      other => other,
    }
  }

  async fn execute_with_retry<B: Serialize + Sync>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<&B>,
  ) -> Result<Response, ExchangeError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| ExchangeError::Transport("client closed".into()))?;

    let url = self.url(path);
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, path, "Retrying request");
        sleep(delay).await;
      }
      self.limiter.until_ready().await;

      let mut request = self.http.request(method.clone(), &url).query(query);
      if let Some(body) = body {
        request = request.json(body);
      }
      request = self.authorize(request, &method, path).await;

      match request.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response),
          StatusCode::UNAUTHORIZED => {
            return Err(ExchangeError::Auth(format!("{method} {path} unauthorized")));
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(path, attempt, "Rate limited by Kalshi API, backing off");
            last_error = Some(ExchangeError::Unavailable {
              status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            });
          }
          status if status.is_server_error() => {
            warn!(path, status = %status, attempt, "Server error, retrying");
            last_error = Some(ExchangeError::Unavailable {
              status: status.as_u16(),
            });
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Rejected {
              status: status.as_u16(),
              body,
            });
          }
        },
        Err(e) => {
          warn!(path, error = %e, attempt, "Request failed");
          last_error = Some(ExchangeError::Transport(e.to_string()));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| ExchangeError::Transport("max retries exceeded".into())))
  }

  async fn authorize(&self, request: RequestBuilder, method: &Method, path: &str) -> RequestBuilder {
    match &self.credentials {
      KalshiCredentials::ApiKey(signer) => signer
        .auth_headers(method.as_str(), &self.signing_path(path))
        .into_iter()
        .fold(request, |request, (name, value)| request.header(name, value)),
      KalshiCredentials::Login { .. } => match self.token.read().await.as_deref() {
        Some(token) => request.bearer_auth(token),
        None => request,
      },
    }
  }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
  response
    .json::<T>()
    .await
    .map_err(|e| ExchangeError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::kalshi::auth::ApiKeySigner;

  #[test]
  fn test_config_from_api_trims_trailing_slash() {
    let api = ApiConfig {
      base_url: "https://demo-api.kalshi.co/trade-api/v2/".into(),
      ..Default::default()
    };
    let config = KalshiClientConfig::from(&api);
    assert_eq!(config.base_url, "https://demo-api.kalshi.co/trade-api/v2");
    assert_eq!(config.timeout, Duration::from_millis(api.timeout_ms));
  }

  #[test]
  fn test_zero_request_budget_is_rejected() {
    let config = KalshiClientConfig {
      requests_per_second: 0,
      ..Default::default()
    };
    let creds = KalshiCredentials::login("mm@example.com", "pw");
    assert!(KalshiClient::new(creds, config).is_err());
  }

  #[test]
  fn test_signing_path_includes_api_prefix() {
    let creds = KalshiCredentials::login("mm@example.com", "pw");
    let client = KalshiClient::new(creds, KalshiClientConfig::default()).unwrap();
    assert_eq!(
      client.signing_path("/portfolio/orders"),
      "/trade-api/v2/portfolio/orders"
    );
  }

  #[tokio::test]
  async fn test_login_is_skipped_for_api_key() {
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let creds = KalshiCredentials::api_key(ApiKeySigner::new("key-123", key));
    let client = KalshiClient::new(creds, KalshiClientConfig::default()).unwrap();
    assert!(client.login().await.is_ok());
    assert!(client.token.read().await.is_none());
  }
}
