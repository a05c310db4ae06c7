//! HTTP client with hard timeouts and outcome classification

use std::time::{Duration, Instant};

use reqwest::{Method, Response, redirect};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::fetch::{FetchOutcome, RetryPolicy, RetryReason};

/// Shared HTTP client used for every call made while evaluating instances
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    timeout: Duration,
    slow_threshold: Duration,
    retry: RetryPolicy,
}

impl FetchClient {
    /// Builds a client that sends the configured User-Agent and refuses to follow redirects
    pub fn new(http: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            timeout: http.timeout(),
            slow_threshold: http.slow_threshold(),
            retry: RetryPolicy::from_config(http),
        })
    }

    /// Issues one HTTP call and classifies what came back.
    ///
    /// - 2xx → `Success(response)`
    /// - 5xx → `RetryableFailure(ServerError)`
    /// - any other status (including redirects) → `FatalFailure`
    /// - deadline exceeded → `RetryableFailure(Timeout)`
    /// - any other transport error → `FatalFailure`
    pub async fn safe_fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> FetchOutcome<Response> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let elapsed = start.elapsed();
                    if elapsed > self.slow_threshold {
                        warn!(
                            "{} slow: {} took {:.3}s",
                            method,
                            url,
                            elapsed.as_secs_f64()
                        );
                    }
                    return FetchOutcome::Success(response);
                }

                info!("{} finish: {} {}", method, url, status);
                if status.is_server_error() {
                    FetchOutcome::RetryableFailure(RetryReason::ServerError(status.as_u16()))
                } else {
                    FetchOutcome::FatalFailure
                }
            }
            Err(e) => {
                info!("{} failed: {}: {}", method, url, e);
                classify_transport_error(&e)
            }
        }
    }

    /// Single attempt: `safe_fetch` followed by JSON decoding of a successful body.
    ///
    /// A body that times out while streaming is retryable; one that is not
    /// valid JSON for `T` is fatal.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> FetchOutcome<T> {
        match self.safe_fetch(method, url, body).await {
            FetchOutcome::Success(response) => read_json(url, response).await,
            FetchOutcome::RetryableFailure(reason) => FetchOutcome::RetryableFailure(reason),
            FetchOutcome::FatalFailure => FetchOutcome::FatalFailure,
        }
    }

    /// Fetches a JSON document, retrying retryable outcomes per the client's [`RetryPolicy`].
    ///
    /// A missing body is sent as `{}`. The result is always `Success` or
    /// `FatalFailure`; exhausting the retry budget counts as fatal.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> FetchOutcome<T> {
        let body = body.unwrap_or_else(|| json!({}));
        let mut attempt = 1;

        loop {
            let outcome = self.request_json(method.clone(), url, Some(&body)).await;

            if !self.retry.should_retry(&outcome, attempt) {
                return match outcome {
                    FetchOutcome::RetryableFailure(reason) => {
                        warn!(
                            "Giving up on {} after {} attempts ({:?})",
                            url, attempt, reason
                        );
                        FetchOutcome::FatalFailure
                    }
                    other => other,
                };
            }

            sleep(self.retry.delay).await;
            attempt += 1;
            info!("retry {} (attempt {})", url, attempt);
        }
    }
}

/// Decodes a successful response body as JSON
async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> FetchOutcome<T> {
    match response.json::<T>().await {
        Ok(value) => FetchOutcome::Success(value),
        Err(e) if e.is_timeout() => {
            info!("Reading body of {} timed out", url);
            FetchOutcome::RetryableFailure(RetryReason::Timeout)
        }
        Err(e) => {
            warn!("Failed to parse JSON from {}: {}", url, e);
            FetchOutcome::FatalFailure
        }
    }
}

fn classify_transport_error<T>(error: &reqwest::Error) -> FetchOutcome<T> {
    if error.is_timeout() {
        debug!("Request timed out: {}", error);
        FetchOutcome::RetryableFailure(RetryReason::Timeout)
    } else {
        FetchOutcome::FatalFailure
    }
}
