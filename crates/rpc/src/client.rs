//! Resilient HTTP client for one peer service.
//!
//! Every call passes through the peer's circuit breaker, then retries
//! retryable failures (timeouts, transport errors, 5xx) with exponential
//! backoff. Client errors (4xx) are returned immediately and count as proof
//! the peer is alive.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use adx_core::RpcConfig;

use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::error::RpcError;

/// HTTP client bound to a single peer service.
#[derive(Debug)]
pub struct PeerClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
    max_retries: u32,
    retry_delay: Duration,
    backoff_factor: f64,
}

impl PeerClient {
    /// Creates a client for the named peer.
    ///
    /// # Errors
    /// Returns `RpcError::InvalidConfig` if the underlying HTTP client cannot
    /// be built.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        config: &RpcConfig,
    ) -> Result<Self, RpcError> {
        let name = name.into();
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RpcError::InvalidConfig(e.to_string()))?;
        let breaker_config = BreakerConfig::default()
            .with_failure_threshold(config.failure_threshold)
            .with_recovery_timeout(config.recovery_timeout());

        Ok(Self {
            breaker: CircuitBreaker::new(name.clone(), breaker_config),
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            backoff_factor: config.backoff_factor,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current breaker state, for health reporting.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// GET a JSON resource.
    ///
    /// # Errors
    /// Returns an `RpcError` describing the transport, HTTP, or decode failure.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RpcError> {
        let resp = self.execute(Method::GET, path, None::<&()>).await?;
        self.decode(resp).await
    }

    /// POST a JSON body and decode a JSON response.
    ///
    /// # Errors
    /// Returns an `RpcError` describing the transport, HTTP, or decode failure.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.execute(Method::POST, path, Some(body)).await?;
        self.decode(resp).await
    }

    /// POST a JSON body; a 204 or empty response decodes to `None`.
    ///
    /// # Errors
    /// Returns an `RpcError` describing the transport, HTTP, or decode failure.
    pub async fn post_json_opt<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, RpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.execute(Method::POST, path, Some(body)).await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = resp
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(&self.name, &e))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RpcError::Serialization {
                peer: self.name.clone(),
                message: e.to_string(),
            })
    }

    /// PUT a JSON body and decode a JSON response.
    ///
    /// # Errors
    /// Returns an `RpcError` describing the transport, HTTP, or decode failure.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, RpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.execute(Method::PUT, path, Some(body)).await?;
        self.decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, RpcError> {
        resp.json::<T>().await.map_err(|e| RpcError::Serialization {
            peer: self.name.clone(),
            message: e.to_string(),
        })
    }

    /// Sends one logical request: breaker admission, then up to
    /// `max_retries` additional attempts on retryable failures.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, RpcError> {
        self.breaker.try_acquire()?;
        let url = format!("{}{}", self.base_url, path);

        let mut attempt: u32 = 0;
        loop {
            let mut req = self.http.request(method.clone(), &url);
            if let Some(b) = body {
                req = req.json(b);
            }

            let err = match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    self.breaker.record_success();
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text().await.unwrap_or_default();
                    RpcError::api(&self.name, status, text)
                }
                Err(e) => RpcError::from_reqwest(&self.name, &e),
            };

            if err.is_retryable() && attempt < self.max_retries {
                let delay = self.retry_delay.mul_f64(self.backoff_factor.powi(attempt as i32));
                tracing::debug!(
                    peer = %self.name,
                    %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if err.is_retryable() {
                // Retries exhausted: one breaker failure per logical call.
                self.breaker.record_failure();
            } else {
                // The peer answered; only the request was bad.
                self.breaker.record_success();
            }
            tracing::warn!(peer = %self.name, %url, error = %err, "peer call failed");
            return Err(err);
        }
    }
}
