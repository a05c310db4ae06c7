//! Version registry: cleaned version string → release metadata

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{Provider, RELEASE_WINDOW, RankerConfig};
use crate::version::semver::clean_loose;
use crate::version::source::ReleaseSource;
use crate::version::sources::github::DEFAULT_BASE_URL;
use crate::version::sources::{GitHubSource, GiteaSource};
use crate::version::vulnerability::VulnerabilityRules;

/// Where a release sits in its repository's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
    /// Repository as `owner/name`
    pub repo_id: String,
    /// Position among the most recent releases (0 = newest)
    pub rank: u32,
    /// Whether the release falls in a known-vulnerable range
    pub vulnerable: bool,
}

/// Lookup from cleaned version string to [`ReleaseRecord`].
///
/// Keys iterate in ascending string order. Inserting an existing key
/// overwrites the previous record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VersionRegistry {
    entries: BTreeMap<String, ReleaseRecord>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under `version`, returning the record it replaced
    pub fn insert(&mut self, version: String, record: ReleaseRecord) -> Option<ReleaseRecord> {
        self.entries.insert(version, record)
    }

    pub fn get(&self, version: &str) -> Option<&ReleaseRecord> {
        self.entries.get(version)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReleaseRecord)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ReleaseRecord)> for VersionRegistry {
    fn from_iter<I: IntoIterator<Item = (String, ReleaseRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Output of [`RegistryBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct BuiltRegistry {
    pub registry: VersionRegistry,
    /// Raw tag names read from each repository, in configured order
    pub tags: IndexMap<String, Vec<String>>,
}

struct TrackedRepo {
    repo_id: String,
    source: Arc<dyn ReleaseSource>,
}

/// Collects release tags from upstream repositories into a [`VersionRegistry`]
pub struct RegistryBuilder {
    repos: Vec<TrackedRepo>,
    rules: VulnerabilityRules,
    window: usize,
}

impl RegistryBuilder {
    pub fn new(rules: VulnerabilityRules) -> Self {
        Self {
            repos: Vec::new(),
            rules,
            window: RELEASE_WINDOW,
        }
    }

    /// Tracks a repository. Later repositories overwrite earlier ones on duplicate versions.
    pub fn with_repo(mut self, repo_id: &str, source: Arc<dyn ReleaseSource>) -> Self {
        self.repos.push(TrackedRepo {
            repo_id: repo_id.to_string(),
            source,
        });
        self
    }

    /// Builds sources and rules from the configured repository list
    pub fn from_config(config: &RankerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.as_str())
            .timeout(config.http.timeout())
            .build()?;
        let token = GitHubSource::token_from_env();

        let builder = config.sources.iter().fold(
            Self::new(VulnerabilityRules::from_sources(&config.sources)),
            |builder, source| {
                let release_source: Arc<dyn ReleaseSource> = match source.provider {
                    Provider::GitHub => Arc::new(
                        GitHubSource::new(client.clone(), DEFAULT_BASE_URL)
                            .with_token(token.clone()),
                    ),
                    Provider::Gitea => {
                        let host = source.host.as_deref().unwrap_or_default();
                        Arc::new(GiteaSource::new(
                            client.clone(),
                            &format!("https://{}", host),
                        ))
                    }
                };
                builder.with_repo(&source.repo_id(), release_source)
            },
        );

        Ok(builder)
    }

    /// Fetches every repository concurrently and fills the registry in configured order.
    ///
    /// A repository whose fetch fails is logged and left out.
    pub async fn build(&self) -> BuiltRegistry {
        info!("Getting release versions from {} repositories", self.repos.len());

        let fetches = self
            .repos
            .iter()
            .map(|repo| repo.source.fetch_release_tags(&repo.repo_id));
        let results = join_all(fetches).await;

        let mut built = BuiltRegistry::default();
        for (repo, result) in self.repos.iter().zip(results) {
            let tags = match result {
                Ok(tags) => tags,
                Err(e) => {
                    error!(
                        "Failed to get tags from {} ({:?}): {}",
                        repo.repo_id,
                        repo.source.provider(),
                        e
                    );
                    continue;
                }
            };

            let recent: Vec<String> = tags.into_iter().take(self.window).collect();
            for (rank, tag) in recent.iter().enumerate() {
                let Some(version) = clean_loose(tag) else {
                    debug!("Skipping tag {} of {}: not a version", tag, repo.repo_id);
                    continue;
                };
                let record = ReleaseRecord {
                    repo_id: repo.repo_id.clone(),
                    rank: rank as u32,
                    vulnerable: self.rules.has_vulnerability(&repo.repo_id, &version),
                };
                if let Some(previous) = built.registry.insert(version.clone(), record) {
                    debug!(
                        "{} from {} overwrites the entry from {}",
                        version, repo.repo_id, previous.repo_id
                    );
                }
            }

            info!("{}: {} tags", repo.repo_id, recent.len());
            built.tags.insert(repo.repo_id.clone(), recent);
        }

        info!("Got {} release versions", built.registry.len());
        built
    }
}
