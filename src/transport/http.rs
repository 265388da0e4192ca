use super::NodeTransport;
use crate::error::{NodeError, Result};
use crate::registry::protocol::ENDPOINT_PING;
use crate::registry::types::UNREACHABLE_PING;
use crate::storage::protocol::STORAGE_PREFIX;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// `reqwest`-backed transport with bounded timeouts and retry on connection errors.
pub struct HttpTransport {
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl HttpTransport {
    pub fn new(timeout: Duration, attempts: usize) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
        }
    }

    /// Builds the request URL. Addresses without a scheme are reached over plain HTTP.
    pub fn url(address: &str, path: &str) -> String {
        let base = address.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}{}", base, path)
        } else {
            format!("http://{}{}", base, path)
        }
    }

    /// Sends the request built by `build`, retrying connection failures with
    /// doubling backoff (150 ms up to 1200 ms) plus jitter.
    ///
    /// Any answer, whatever its status, ends the loop.
    async fn send_with_retry<F>(
        &self,
        method: &str,
        url: &str,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay_ms = 150u64;
        let mut last_error = None;

        for attempt in 0..self.attempts {
            match build().timeout(self.timeout).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    tracing::debug!("{} {} attempt {} failed: {}", method, url, attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < self.attempts {
                        // Jitter keeps retrying nodes from hitting a peer in lockstep
                        let jitter = rand::random::<u64>() % 50;
                        tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                        delay_ms = (delay_ms * 2).min(1200);
                    }
                }
            }
        }

        Err(NodeError::Transport(match last_error {
            Some(e) => format!("{} {}: {}", method, url, e),
            None => format!("{} {}: retry attempts exhausted", method, url),
        }))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 3)
    }
}

/// Reads the body of a 2xx answer; anything else becomes a transport error.
async fn read_body(url: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| NodeError::Transport(format!("{}: unreadable body: {}", url, e)))?;

    if !status.is_success() {
        return Err(NodeError::Transport(format!(
            "{} answered {}: {}",
            url,
            status,
            body.trim()
        )));
    }
    Ok(body)
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn get(&self, address: &str, path: &str) -> Result<String> {
        let url = Self::url(address, path);
        let response = self
            .send_with_retry("GET", &url, || self.http_client.get(url.as_str()))
            .await?;
        read_body(&url, response).await
    }

    async fn post(&self, address: &str, path: &str, body: Bytes) -> Result<String> {
        let url = Self::url(address, path);
        let response = self
            .send_with_retry("POST", &url, || {
                self.http_client.post(url.as_str()).body(body.clone())
            })
            .await?;
        read_body(&url, response).await
    }

    async fn ping(&self, address: &str) -> i64 {
        let url = Self::url(address, &format!("{}{}", STORAGE_PREFIX, ENDPOINT_PING));
        let started = Instant::now();

        // Single attempt: a retried ping would measure the backoff, not the peer.
        match self
            .http_client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => started.elapsed().as_millis() as i64,
            Ok(resp) => {
                tracing::debug!("Ping {} answered {}", url, resp.status());
                UNREACHABLE_PING
            }
            Err(e) => {
                tracing::debug!("Ping {} failed: {}", url, e);
                UNREACHABLE_PING
            }
        }
    }
}
