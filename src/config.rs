use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Time-related constants
// =============================================================================

/// Hard deadline for a single HTTP call in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Responses slower than this are logged as slow (1 second)
pub const SLOW_RESPONSE_THRESHOLD_MS: u64 = 1_000;

/// Delay before retrying a JSON fetch that failed with a retryable outcome (20 seconds)
pub const FETCH_RETRY_DELAY_MS: u64 = 20_000;

/// Total attempts for a JSON fetch (one initial attempt plus one retry)
pub const FETCH_MAX_ATTEMPTS: u32 = 2;

/// Delay before repeating an indeterminate NodeInfo discovery (10 seconds)
pub const DISCOVERY_RETRY_DELAY_MS: u64 = 10_000;

/// Interval between progress log lines while instances are evaluated
pub const PROGRESS_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// Evaluation constants
// =============================================================================

/// Concurrent evaluations for the default profile
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Concurrent evaluations for the wide profile
pub const WIDE_CONCURRENCY: usize = 128;

/// Number of most recent releases read from each upstream repository
pub const RELEASE_WINDOW: usize = 40;

/// Rank given to versions that match nothing in the registry
pub const UNKNOWN_VERSION_RANK: u32 = 1500;

/// Repository that unknown versions are attributed to
pub const PRIMARY_REPO: &str = "misskey-dev/misskey";

/// Environment variable holding an optional GitHub API token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:99.0) Gecko/20100101 Firefox/99.0";

/// Languages assumed for instances that do not configure their own
pub const DEFAULT_LANGS: [&str; 9] = ["ja", "en", "de", "fr", "zh", "ko", "ru", "th", "es"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Ranker configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankerConfig {
    /// Maximum number of instances evaluated at the same time
    pub concurrency: usize,
    /// Repository that unknown versions are attributed to
    pub primary_repo: String,
    pub http: HttpConfig,
    /// Upstream repositories, in write order (the last one wins duplicate versions)
    pub sources: Vec<SourceConfig>,
    pub candidates: CandidateConfig,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            primary_repo: PRIMARY_REPO.to_string(),
            http: HttpConfig::default(),
            sources: vec![SourceConfig {
                provider: Provider::GitHub,
                host: None,
                owner: "misskey-dev".to_string(),
                name: "misskey".to_string(),
                vulnerable_ranges: vec![
                    "< 12.119.2".to_string(),
                    ">= 10.46.0 < 10.102.4 || >= 11.0.0-alpha.1 < 11.20.2".to_string(),
                ],
            }],
            candidates: CandidateConfig::default(),
        }
    }
}

impl RankerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "http.max_attempts must be at least 1".into(),
            ));
        }
        for source in &self.sources {
            if source.provider == Provider::Gitea && source.host.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "gitea source {} needs a host",
                    source.repo_id()
                )));
            }
        }
        Ok(())
    }
}

/// HTTP-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// URL scheme used to reach instances
    pub scheme: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub slow_threshold_ms: u64,
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
    pub discovery_retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout_ms: FETCH_TIMEOUT_MS,
            slow_threshold_ms: SLOW_RESPONSE_THRESHOLD_MS,
            retry_delay_ms: FETCH_RETRY_DELAY_MS,
            max_attempts: FETCH_MAX_ATTEMPTS,
            discovery_retry_delay_ms: DISCOVERY_RETRY_DELAY_MS,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn discovery_retry_delay(&self) -> Duration {
        Duration::from_millis(self.discovery_retry_delay_ms)
    }

    /// Base URL of an instance, e.g. `https://misskey.io`
    pub fn instance_base(&self, host: &str) -> String {
        format!("{}://{}", self.scheme, host)
    }
}

/// Hosting provider of an upstream repository
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Gitea,
}

/// Upstream repository whose releases feed the version registry
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub provider: Provider,
    /// Forge host, required for Gitea/Forgejo (e.g. "codeberg.org")
    #[serde(default)]
    pub host: Option<String>,
    pub owner: String,
    pub name: String,
    /// npm-style ranges of releases with known vulnerabilities
    #[serde(default)]
    pub vulnerable_ranges: Vec<String>,
}

impl SourceConfig {
    /// Repository identifier, `owner/name`
    pub fn repo_id(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Federation directory settings for candidate discovery
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CandidateConfig {
    pub directory_url: String,
    pub software_name: String,
    pub page_size: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            directory_url: "https://stop.voring.me".to_string(),
            software_name: "misskey".to_string(),
            page_size: 60,
        }
    }
}

/// One configured instance
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InstanceConfig {
    /// Host name, e.g. "misskey.io"
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langs: Option<Vec<String>>,
}

impl InstanceConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            name: None,
            description: None,
            langs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstanceFile {
    #[serde(default)]
    instances: Vec<InstanceConfig>,
}

#[derive(Debug, Deserialize)]
struct IgnoreFile {
    #[serde(default)]
    hosts: Vec<String>,
}

/// Loads the ordered instance list from a TOML file with `[[instances]]` tables.
pub fn load_instances(path: &Path) -> Result<Vec<InstanceConfig>, ConfigError> {
    read_toml::<InstanceFile>(path).map(|file| file.instances)
}

/// Loads the list of hosts that candidate discovery must skip.
pub fn load_ignore_hosts(path: &Path) -> Result<Vec<String>, ConfigError> {
    read_toml::<IgnoreFile>(path).map(|file| file.hosts)
}

/// Reads a file as a raw TOML table (used by the lint pass)
pub fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    read_toml(path)
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
