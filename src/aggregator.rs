//! Batch driver: registry first, then every instance under the scheduler

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{InstanceConfig, PROGRESS_INTERVAL_MS, RankerConfig};
use crate::fetch::FetchClient;
use crate::instance::{
    AliveInstance, ClassifiedInstance, DeadInstance, InstanceEvaluator, OutdatedInstance,
};
use crate::scheduler::{ProgressHandle, Scheduler};
use crate::version::registry::{RegistryBuilder, VersionRegistry};

/// Result of one batch pass
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// RFC 3339 timestamp of the end of the run
    pub generated_at: String,
    /// Score-descending; ties keep configuration order
    pub alive: Vec<AliveInstance>,
    pub dead: Vec<DeadInstance>,
    pub outdated: Vec<OutdatedInstance>,
    pub registry: VersionRegistry,
    /// Raw tags read from each upstream repository
    pub tags: IndexMap<String, Vec<String>>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.alive.len() + self.dead.len() + self.outdated.len()
    }
}

pub struct Aggregator {
    config: RankerConfig,
    builder: RegistryBuilder,
    fetch: FetchClient,
    progress_interval: Duration,
}

impl Aggregator {
    pub fn new(config: RankerConfig, builder: RegistryBuilder) -> Result<Self, reqwest::Error> {
        let fetch = FetchClient::new(&config.http)?;
        Ok(Self {
            config,
            builder,
            fetch,
            progress_interval: Duration::from_millis(PROGRESS_INTERVAL_MS),
        })
    }

    /// Builds the registry once, evaluates every instance, and partitions the results.
    pub async fn run(&self, instances: Vec<InstanceConfig>) -> Report {
        let built = self.builder.build().await;
        let registry = Arc::new(built.registry);

        let evaluator = InstanceEvaluator::new(
            self.fetch.clone(),
            &self.config.http,
            Arc::clone(&registry),
            &self.config.primary_repo,
        );

        info!(
            "Evaluating {} instances, {} at a time",
            instances.len(),
            self.config.concurrency
        );
        let mut scheduler = Scheduler::new(self.config.concurrency);
        for config in instances.iter().cloned() {
            let evaluator = evaluator.clone();
            scheduler.submit(async move { evaluator.evaluate(config).await });
        }

        let reporter =
            spawn_progress_reporter(scheduler.progress_handle(), self.progress_interval);
        let results = scheduler.join().await;
        reporter.abort();
        drop(evaluator);

        let mut alive = Vec::new();
        let mut dead = Vec::new();
        let mut outdated = Vec::new();
        for (config, result) in instances.into_iter().zip(results) {
            let classified = result.unwrap_or_else(|e| {
                warn!("Evaluation of {} failed: {}", config.url, e);
                ClassifiedInstance::dead(config)
            });
            match classified {
                ClassifiedInstance::Alive(instance) => alive.push(*instance),
                ClassifiedInstance::Dead(instance) => dead.push(instance),
                ClassifiedInstance::Outdated(instance) => outdated.push(*instance),
            }
        }

        // Vec::sort_by is stable, so equal scores keep configuration order
        alive.sort_by(|a, b| b.score.total_cmp(&a.score));

        info!(
            "Done: {} alive, {} dead, {} outdated",
            alive.len(),
            dead.len(),
            outdated.len()
        );

        Report {
            generated_at: Utc::now().to_rfc3339(),
            alive,
            dead,
            outdated,
            registry: Arc::unwrap_or_clone(registry),
            tags: built.tags,
        }
    }
}

fn spawn_progress_reporter(progress: ProgressHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = progress.progress();
            info!(
                backlog = snapshot.backlog,
                in_flight = snapshot.in_flight,
                "{} requests remain and {} requests processing.",
                snapshot.backlog,
                snapshot.in_flight
            );
        }
    })
}
