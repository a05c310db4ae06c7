//! Per-instance pipeline
//!
//! ```text
//! discover ──none──► Dead
//!    │
//! resolve ──exact & vulnerable──► Outdated
//!    │
//! meta + stats + chart ──any missing──► Dead
//!    │
//! score ──► Alive
//! ```

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{DEFAULT_LANGS, HttpConfig, InstanceConfig};
use crate::fetch::FetchClient;
use crate::instance::score;
use crate::instance::types::{AliveInstance, ClassifiedInstance, Meta, NoteChart, OutdatedInstance};
use crate::nodeinfo::NodeInfoClient;
use crate::version::registry::VersionRegistry;
use crate::version::resolver::resolve_version;

/// Days of note activity requested from `/api/charts/notes`
const CHART_DAYS: u32 = 15;

/// Evaluates one instance at a time against a shared, read-only registry
#[derive(Clone)]
pub struct InstanceEvaluator {
    fetch: FetchClient,
    nodeinfo: NodeInfoClient,
    registry: Arc<VersionRegistry>,
    primary_repo: String,
    http: HttpConfig,
}

impl InstanceEvaluator {
    pub fn new(
        fetch: FetchClient,
        http: &HttpConfig,
        registry: Arc<VersionRegistry>,
        primary_repo: &str,
    ) -> Self {
        Self {
            nodeinfo: NodeInfoClient::new(fetch.clone(), http),
            fetch,
            registry,
            primary_repo: primary_repo.to_string(),
            http: http.clone(),
        }
    }

    /// Runs the whole pipeline for `config`. Never fails: anything that
    /// cannot be evaluated ends up [`ClassifiedInstance::Dead`].
    pub async fn evaluate(&self, config: InstanceConfig) -> ClassifiedInstance {
        let host = config.url.clone();

        let Some(nodeinfo) = self.nodeinfo.safe_get_nodeinfo(&host).await else {
            info!(host = %host, "no nodeinfo, marking dead");
            return ClassifiedInstance::dead(config);
        };

        let resolution = resolve_version(
            &nodeinfo.software.version,
            &self.registry,
            &self.primary_repo,
        );
        debug!(
            host = %host,
            version = %nodeinfo.software.version,
            repo = %resolution.repo_id,
            rank = resolution.rank,
            exact = resolution.exact,
            "version resolved"
        );
        if resolution.is_known_vulnerable() {
            info!(host = %host, version = %nodeinfo.software.version, "vulnerable release");
            return ClassifiedInstance::Outdated(Box::new(OutdatedInstance { config, nodeinfo }));
        }

        let base = self.http.instance_base(&host);
        let meta_url = format!("{}/api/meta", base);
        let stats_url = format!("{}/api/stats", base);
        let chart_url = format!("{}/api/charts/notes", base);
        let (meta, stats, note_chart) = tokio::join!(
            self.fetch.fetch_json::<Value>(Method::POST, &meta_url, None),
            self.fetch.fetch_json::<Value>(Method::POST, &stats_url, None),
            self.fetch.fetch_json::<Value>(
                Method::POST,
                &chart_url,
                Some(json!({"span": "day", "limit": CHART_DAYS})),
            ),
        );

        let (Some(meta), Some(stats), Some(note_chart)) = (
            meta.success().and_then(present),
            stats.success().and_then(present),
            note_chart.success().and_then(present),
        ) else {
            info!(host = %host, "metadata incomplete, marking dead");
            return ClassifiedInstance::dead(config);
        };
        let mut meta = Meta::from_value(meta);
        meta.strip_heavy_fields();
        let note_chart = NoteChart::from_value(note_chart);

        let score = score::score(resolution.rank, &note_chart);

        let name = config
            .name
            .clone()
            .or_else(|| nodeinfo.node_name().map(str::to_string))
            .or_else(|| meta.name().map(str::to_string))
            .unwrap_or_else(|| host.clone());
        let description = config
            .description
            .clone()
            .or_else(|| nodeinfo.node_description().map(str::to_string))
            .or_else(|| meta.description().map(str::to_string));
        let langs = config
            .langs
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGS.iter().map(|l| l.to_string()).collect());

        ClassifiedInstance::Alive(Box::new(AliveInstance {
            config,
            name,
            description,
            langs,
            score,
            repo: resolution.repo_id,
            nodeinfo,
            meta,
            stats,
            note_chart,
        }))
    }
}

/// `null` and `false` bodies count as missing
fn present(body: Value) -> Option<Value> {
    match body {
        Value::Null | Value::Bool(false) => None,
        body => Some(body),
    }
}
