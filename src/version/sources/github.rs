//! GitHub Releases API source

use serde::Deserialize;
use tracing::warn;

use crate::config::{GITHUB_TOKEN_ENV, Provider, RELEASE_WINDOW};
use crate::version::error::SourceError;
use crate::version::source::ReleaseSource;
use crate::version::sources::check_status;

/// Default base URL for GitHub API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Source implementation for GitHub Releases API
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubSource {
    /// Creates a new GitHubSource with a custom base URL
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            token: None,
        }
    }

    /// Sends `Authorization: bearer <token>` with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Reads the API token from `GITHUB_TOKEN`, ignoring an empty value
    pub fn token_from_env() -> Option<String> {
        std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubSource {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    async fn fetch_release_tags(&self, repo: &str) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{}/repos/{}/releases?per_page={}",
            self.base_url, repo, RELEASE_WINDOW
        );

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("bearer {}", token));
        }

        let response = request.send().await?;
        check_status(&response, repo, &url)?;

        let releases: Vec<Release> = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub releases response: {}", e);
            SourceError::InvalidResponse(e.to_string())
        })?;

        Ok(releases.into_iter().map(|r| r.tag_name).collect())
    }
}
