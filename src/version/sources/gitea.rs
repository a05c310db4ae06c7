//! Gitea/Forgejo tags API source

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::Provider;
use crate::version::error::SourceError;
use crate::version::source::ReleaseSource;
use crate::version::sources::check_status;

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Source implementation for Gitea-compatible forges (Codeberg, Forgejo)
pub struct GiteaSource {
    client: reqwest::Client,
    base_url: String,
}

impl GiteaSource {
    /// Creates a source for the forge at `base_url`, e.g. `https://codeberg.org`
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GiteaSource {
    fn provider(&self) -> Provider {
        Provider::Gitea
    }

    async fn fetch_release_tags(&self, repo: &str) -> Result<Vec<String>, SourceError> {
        let url = format!("{}/api/v1/repos/{}/tags", self.base_url, repo);

        let response = self.client.get(&url).send().await?;
        check_status(&response, repo, &url)?;

        let body: Value = response.json().await.map_err(|e| {
            warn!("Failed to parse tags response from {}: {}", url, e);
            SourceError::InvalidResponse(e.to_string())
        })?;
        if !body.is_array() {
            return Err(SourceError::InvalidResponse(format!(
                "Tags of {} are not an array",
                repo
            )));
        }

        let tags: Vec<Tag> = serde_json::from_value(body)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        Ok(tags.into_iter().map(|t| t.name).collect())
    }
}
