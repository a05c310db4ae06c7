//! Discovery of responding instances that are not listed yet
//!
//! Pages through a federation directory's `/api/federation/instances` and
//! keeps hosts that run the tracked software, answer requests, and are
//! neither listed nor ignored.

use std::collections::{BTreeSet, HashSet};

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CandidateConfig, InstanceConfig};
use crate::fetch::{FetchClient, FetchOutcome};

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Federation directory request failed: {0}")]
    Directory(String),
}

/// One entry of the directory's instance listing
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FederationInstance {
    pub host: String,
    #[serde(default)]
    pub software_name: Option<String>,
    #[serde(default)]
    pub latest_status: Option<Value>,
    #[serde(default)]
    pub is_not_responding: Option<bool>,
}

impl FederationInstance {
    /// Never checked, or checked and answering
    pub fn is_responding(&self) -> bool {
        self.latest_status.as_ref().is_none_or(Value::is_null)
            || self.is_not_responding == Some(false)
    }
}

pub struct CandidateFinder {
    fetch: FetchClient,
    config: CandidateConfig,
}

impl CandidateFinder {
    pub fn new(fetch: FetchClient, config: CandidateConfig) -> Self {
        Self { fetch, config }
    }

    /// Returns sorted, deduplicated hosts worth adding to the instance list.
    pub async fn find_candidates(
        &self,
        instances: &[InstanceConfig],
        ignore_hosts: &[String],
    ) -> Result<Vec<String>, CandidateError> {
        let listed: HashSet<&str> = instances.iter().map(|i| i.url.as_str()).collect();
        let ignored: HashSet<&str> = ignore_hosts.iter().map(String::as_str).collect();
        let url = format!(
            "{}/api/federation/instances",
            self.config.directory_url.trim_end_matches('/')
        );
        let page_size = self.config.page_size.max(1);

        let mut candidates = BTreeSet::new();
        let mut offset = 0;
        loop {
            let body = json!({
                "sort": "+pubSub",
                "limit": page_size + 1,
                "offset": offset,
            });
            let mut page = match self
                .fetch
                .fetch_json::<Vec<FederationInstance>>(Method::POST, &url, Some(body))
                .await
            {
                FetchOutcome::Success(page) => page,
                _ => return Err(CandidateError::Directory(url)),
            };
            debug!("offset {}: {} instances", offset, page.len());

            let has_next = page.len() == page_size + 1;
            if has_next {
                page.pop();
            }

            for instance in page {
                if ignored.contains(instance.host.as_str())
                    || listed.contains(instance.host.as_str())
                    || instance.software_name.as_deref() != Some(self.config.software_name.as_str())
                    || !instance.is_responding()
                {
                    continue;
                }
                candidates.insert(instance.host);
            }

            if !has_next {
                break;
            }
            offset += page_size;
        }

        info!("Found {} candidates", candidates.len());
        Ok(candidates.into_iter().collect())
    }
}
