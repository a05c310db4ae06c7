//! Shared fixtures for integration tests
#![allow(dead_code)]

mod instance;
mod source;

pub use instance::*;
pub use source::*;

use instance_ranker::config::HttpConfig;

/// Plain-http settings with short deadlines and near-zero retry delays
pub fn fast_http_config() -> HttpConfig {
    HttpConfig {
        scheme: "http".to_string(),
        timeout_ms: 300,
        retry_delay_ms: 10,
        discovery_retry_delay_ms: 10,
        ..HttpConfig::default()
    }
}
