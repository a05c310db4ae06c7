//! Resilient HTTP fetching
//!
//! Every network call made while evaluating an instance is classified into a
//! [`FetchOutcome`] instead of an error, so failures stay inside the task that
//! produced them.
//!
//! # Modules
//!
//! - [`client`]: `FetchClient` with the single-shot `safe_fetch` and the retrying `fetch_json`

pub mod client;

use std::time::Duration;

use crate::config::HttpConfig;

pub use client::FetchClient;

/// Why a call may succeed if repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The call hit its deadline or was aborted by the transport
    Timeout,
    /// The server answered with a 5xx status
    ServerError(u16),
}

/// Classified result of a network call
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    RetryableFailure(RetryReason),
    FatalFailure,
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Returns the value of a successful outcome, dropping the failure kind
    pub fn success(self) -> Option<T> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Success(value) => FetchOutcome::Success(f(value)),
            FetchOutcome::RetryableFailure(reason) => FetchOutcome::RetryableFailure(reason),
            FetchOutcome::FatalFailure => FetchOutcome::FatalFailure,
        }
    }
}

/// How often, and after how long, a retryable outcome is attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait before each repeated attempt
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_attempts: http.max_attempts,
            delay: http.retry_delay(),
        }
    }

    /// Only retryable outcomes are repeated; fatal ones return at once
    pub fn should_retry<T>(&self, outcome: &FetchOutcome<T>, attempt: u32) -> bool {
        matches!(outcome, FetchOutcome::RetryableFailure(_)) && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}
