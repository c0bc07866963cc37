//! Shared HTTP plumbing for service adapters
//!
//! Every adapter talks to its service through a [`ServiceClient`], which maps
//! HTTP outcomes onto the error taxonomy and retries transient failures with
//! exponential backoff.

use netpharm_common::{NetpharmError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Client Constants
// ============================================================================

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of attempts for a request (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubles for every further retry
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

const USER_AGENT: &str = concat!("netpharm/", env!("CARGO_PKG_VERSION"));

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
        }
    }

    /// Exactly one attempt, no retry
    pub const fn single_attempt() -> Self {
        Self::new(1, 0)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_BACKOFF_MS)
    }
}

/// HTTP client bound to one named service
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    service: &'static str,
    retry: RetryPolicy,
}

impl ServiceClient {
    pub fn new(service: &'static str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NetpharmError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service,
            retry,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// GET a URL and decode its JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.send(self.client.get(url)).await?;
        self.decode(&body)
    }

    /// GET a URL and return the raw body text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.send(self.client.get(url)).await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, url: &str, payload: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.client.post(url).json(payload)).await?;
        self.decode(&body)
    }

    /// POST form fields and return the raw response text
    pub async fn post_form_text(&self, url: &str, form: &[(&str, String)]) -> Result<String> {
        self.send(self.client.post(url).form(form)).await
    }

    /// POST form fields and decode the JSON response
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let body = self.send(self.client.post(url).form(form)).await?;
        self.decode(&body)
    }

    /// Send a request, retrying transient failures per the retry policy
    pub async fn send(&self, request: RequestBuilder) -> Result<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let builder = request.try_clone().ok_or_else(|| {
                NetpharmError::service(self.service, "request body cannot be replayed")
            })?;

            match self.send_once(builder).await {
                Ok(body) => {
                    debug!(service = self.service, attempt, bytes = body.len(), "Request succeeded");
                    return Ok(body);
                },
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let backoff_ms = self.retry.backoff_ms(attempt);
                    warn!(
                        service = self.service,
                        attempt = attempt,
                        backoff_ms = backoff_ms,
                        error = %e,
                        "Request failed, retrying..."
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(self.service, &e))?;
        let response = self.check_status(response).await?;
        response
            .text()
            .await
            .map_err(|e| classify_transport(self.service, &e))
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(self.service, status, &url, &body))
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        serde_json::from_str(body).map_err(|e| {
            NetpharmError::service(self.service, format!("malformed response body: {}", e))
        })
    }
}

/// Map a non-success status onto the error taxonomy
pub fn classify_status(service: &str, status: StatusCode, url: &str, body: &str) -> NetpharmError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::NOT_FOUND => NetpharmError::not_found(format!("{} has no record at {}", service, url)),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            NetpharmError::transient(service, format!("HTTP {} from {}", status, url))
        },
        _ => NetpharmError::service(service, format!("HTTP {} from {}: {}", status, url, snippet)),
    }
}

fn classify_transport(service: &str, err: &reqwest::Error) -> NetpharmError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        NetpharmError::transient(service, err.to_string())
    } else {
        NetpharmError::service(service, err.to_string())
    }
}
