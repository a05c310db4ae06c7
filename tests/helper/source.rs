//! In-memory release source

use std::collections::HashMap;

use async_trait::async_trait;

use instance_ranker::config::Provider;
use instance_ranker::version::error::SourceError;
use instance_ranker::version::source::ReleaseSource;

/// Release source serving fixed tag lists
pub struct StaticSource {
    tags: HashMap<String, Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self {
            tags: HashMap::new(),
        }
    }

    /// Tags for `repo`, newest first
    pub fn with_tags(mut self, repo: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(repo.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }
}

#[async_trait]
impl ReleaseSource for StaticSource {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    async fn fetch_release_tags(&self, repo: &str) -> Result<Vec<String>, SourceError> {
        self.tags
            .get(repo)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(repo.to_string()))
    }
}
