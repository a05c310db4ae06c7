//! Source trait for listing upstream release tags

#[cfg(test)]
use mockall::automock;

use crate::config::Provider;
use crate::version::error::SourceError;

/// Trait for fetching the release tags of a source-code repository
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Returns the hosting provider this implementation talks to
    fn provider(&self) -> Provider;

    /// Fetches the most recent release tags of a repository
    ///
    /// # Arguments
    /// * `repo` - The repository as `owner/name` (e.g., "misskey-dev/misskey")
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - Tag names, ordered from newest to oldest
    /// * `Err(SourceError)` - If the fetch fails
    async fn fetch_release_tags(&self, repo: &str) -> Result<Vec<String>, SourceError>;
}
