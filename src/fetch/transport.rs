// src/fetch/transport.rs
use std::{fmt, future::Future, time::Duration};

use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;

/// Basic-auth pair for the report service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What came back from a single GET, whatever the status.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

/// Anything that can GET a URL with basic auth. The report fetcher only
/// depends on this, so it can be driven without a network.
pub trait Transport {
    fn get(
        &self,
        url: &Url,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first request.
    pub max_retries: u32,
    /// Statuses worth asking again for.
    pub statuses: Vec<u16>,
    /// Pause between attempts when the server gives no `Retry-After`.
    pub backoff_ms: u64,
    /// Upper bound on any honoured `Retry-After`.
    pub max_retry_after_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            statuses: vec![429, 500, 502, 503, 504],
            backoff_ms: 0,
            max_retry_after_secs: 30,
            timeout_secs: 30,
        }
    }
}

impl RetryPolicy {
    pub fn retries_on(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    fn delay(&self, retry_after: Option<Duration>) -> Duration {
        let cap = Duration::from_secs(self.max_retry_after_secs);
        retry_after
            .map(|d| d.min(cap))
            .unwrap_or(Duration::from_millis(self.backoff_ms))
    }
}

/// reqwest-backed transport holding one connection pool for the whole run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(policy: RetryPolicy) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .build()?;
        Ok(Self { client, policy })
    }
}

/// `Retry-After` in its delta-seconds form; HTTP dates are ignored.
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl Transport for HttpTransport {
    async fn get(&self, url: &Url, credentials: &Credentials) -> Result<Response, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(%url, attempt, "GET");

            let sent = self
                .client
                .get(url.clone())
                .basic_auth(&credentials.id, Some(&credentials.password))
                .send()
                .await;

            match sent {
                Ok(resp) if self.policy.retries_on(resp.status()) => {
                    let status = resp.status();
                    if attempt > self.policy.max_retries {
                        return Err(TransportError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                            attempts: attempt,
                        });
                    }
                    let delay = self.policy.delay(retry_after(&resp));
                    warn!(%url, %status, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    sleep(delay).await;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.map_err(|source| TransportError::Request {
                        url: url.to_string(),
                        source,
                    })?;
                    return Ok(Response { status, body });
                }
                Err(e) if attempt <= self.policy.max_retries => {
                    let delay = self.policy.delay(None);
                    warn!(%url, attempt, error = %e, "request failed, retrying");
                    sleep(delay).await;
                }
                Err(source) => {
                    return Err(TransportError::Request {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}
