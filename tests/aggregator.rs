//! End-to-end runs of the aggregator over mock instances

mod helper;

use std::collections::HashSet;
use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use helper::{
    Endpoint, MockInstance, StaticSource, chart_with_mean, fast_http_config, healthy_instance,
    linkless_instance, mock_instance,
};
use instance_ranker::aggregator::{Aggregator, Report};
use instance_ranker::config::{InstanceConfig, PRIMARY_REPO, RankerConfig};
use instance_ranker::version::registry::RegistryBuilder;
use instance_ranker::version::vulnerability::VulnerabilityRules;

fn aggregator(tags: &[&str], vulnerable_ranges: &[&str]) -> Aggregator {
    let ranges: Vec<String> = vulnerable_ranges.iter().map(|r| r.to_string()).collect();
    let rules = VulnerabilityRules::new().with_ranges(PRIMARY_REPO, &ranges);
    let builder = RegistryBuilder::new(rules).with_repo(
        PRIMARY_REPO,
        Arc::new(StaticSource::new().with_tags(PRIMARY_REPO, tags)),
    );
    let config = RankerConfig {
        concurrency: 4,
        http: fast_http_config(),
        ..RankerConfig::default()
    };
    Aggregator::new(config, builder).unwrap()
}

fn configs(instances: &[&MockInstance]) -> Vec<InstanceConfig> {
    instances.iter().map(|i| i.config()).collect()
}

fn urls(report: &Report) -> (Vec<String>, Vec<String>, Vec<String>) {
    (
        report.alive.iter().map(|i| i.config.url.clone()).collect(),
        report.dead.iter().map(|i| i.config.url.clone()).collect(),
        report.outdated.iter().map(|i| i.config.url.clone()).collect(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn run_classifies_every_instance_exactly_once() {
    let alive = healthy_instance("13.0.0", 3.0).await;
    let outdated = healthy_instance("12.119.1", 3.0).await;
    let dead = mock_instance(
        "13.0.0",
        Endpoint::Json(json!({})),
        Endpoint::Status(500),
        Endpoint::Json(chart_with_mean(1.0)),
    )
    .await;
    let linkless = linkless_instance().await;
    let instances = configs(&[&alive, &outdated, &dead, &linkless]);

    let report = aggregator(&["13.0.0", "12.119.2", "12.119.1"], &["< 12.119.2"])
        .run(instances.clone())
        .await;

    let (alive_urls, dead_urls, outdated_urls) = urls(&report);
    assert_eq!(alive_urls, vec![alive.host()]);
    assert_eq!(outdated_urls, vec![outdated.host()]);
    assert_eq!(dead_urls, vec![dead.host(), linkless.host()]);

    assert_eq!(report.total(), instances.len());
    let distinct: HashSet<String> = alive_urls
        .into_iter()
        .chain(dead_urls)
        .chain(outdated_urls)
        .collect();
    assert_eq!(distinct.len(), instances.len());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sorts_alive_by_score_keeping_configuration_order_on_ties() {
    let first_tie = healthy_instance("13.0.0", 2.0).await;
    let busiest = healthy_instance("13.0.0", 50.0).await;
    let second_tie = healthy_instance("13.0.0", 2.0).await;
    let older = healthy_instance("12.119.2", 900.0).await;
    let instances = configs(&[&first_tie, &busiest, &second_tie, &older]);

    let report = aggregator(&["13.0.0", "12.119.2"], &[]).run(instances).await;

    let (alive_urls, _, _) = urls(&report);
    assert_eq!(
        alive_urls,
        vec![
            busiest.host(),
            first_tie.host(),
            second_tie.host(),
            older.host()
        ]
    );
    assert!(
        report
            .alive
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn run_outdates_exact_vulnerable_match_but_not_prefix_match() {
    let exact = healthy_instance("12.119.1", 1.0).await;
    let prefixed = healthy_instance("12.119.1-fork.2", 1.0).await;
    let instances = configs(&[&exact, &prefixed]);

    let report = aggregator(&["13.0.0", "12.119.1"], &["< 12.119.2"])
        .run(instances)
        .await;

    let (alive_urls, _, outdated_urls) = urls(&report);
    assert_eq!(outdated_urls, vec![exact.host()]);
    assert_eq!(alive_urls, vec![prefixed.host()]);
    assert_eq!(report.alive[0].score, 100_000.0 - (1.0 - 30.0) * 7_200.0 + 1.0);
}

#[rstest]
#[case::meta_server_error(Endpoint::Status(500), Endpoint::Json(json!({})), Endpoint::Json(json!({})))]
#[case::stats_not_found(Endpoint::Json(json!({})), Endpoint::Status(404), Endpoint::Json(json!({})))]
#[case::chart_timeout(Endpoint::Json(json!({})), Endpoint::Json(json!({})), Endpoint::Stall)]
#[tokio::test(flavor = "multi_thread")]
async fn run_marks_instance_dead_when_a_metadata_fetch_fails(
    #[case] meta: Endpoint,
    #[case] stats: Endpoint,
    #[case] chart: Endpoint,
) {
    let instance = mock_instance("13.0.0", meta, stats, chart).await;

    let report = aggregator(&["13.0.0"], &[]).run(vec![instance.config()]).await;

    assert_eq!(report.dead.len(), 1);
    assert!(report.alive.is_empty());
}

#[rstest]
#[case::null_in_trend(json!({}), json!({"local": {"inc": [1, null, 3]}}), 2.0)]
#[case::chart_is_array(json!({}), json!([]), 0.0)]
#[case::numeric_name(json!({"name": 42}), json!({}), 0.0)]
#[case::list_description(json!({"description": ["a"]}), json!({}), 0.0)]
#[tokio::test(flavor = "multi_thread")]
async fn run_keeps_instance_alive_when_metadata_shapes_are_unexpected(
    #[case] meta: serde_json::Value,
    #[case] chart: serde_json::Value,
    #[case] trend: f64,
) {
    let instance = mock_instance(
        "13.0.0",
        Endpoint::Json(meta),
        Endpoint::Json(json!({})),
        Endpoint::Json(chart),
    )
    .await;

    let report = aggregator(&["13.0.0"], &[]).run(vec![instance.config()]).await;

    assert_eq!(report.alive.len(), 1);
    assert!(report.dead.is_empty());
    assert_eq!(report.alive[0].score, 316_000.0 + trend);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_scores_newer_patch_as_newest_release() {
    let instance = mock_instance(
        "13.0.1",
        Endpoint::Json(json!({})),
        Endpoint::Json(json!({})),
        Endpoint::Json(json!({"local": {"inc": [5, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]}})),
    )
    .await;

    // 13.0.0 is the newest release; 12.0.0 sits at rank 5 and is vulnerable
    let report = aggregator(
        &["13.0.0", "12.5.0", "12.4.0", "12.3.0", "12.2.0", "12.0.0"],
        &["< 12.1.0"],
    )
    .run(vec![instance.config()])
    .await;

    assert_eq!(report.registry.get("12.0.0").map(|r| (r.rank, r.vulnerable)), Some((5, true)));
    assert!(report.outdated.is_empty());
    assert_eq!(report.alive.len(), 1);
    assert_eq!(report.alive[0].score, 316_007.5);
    assert_eq!(report.alive[0].repo, PRIMARY_REPO);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_report_serializes_with_registry_and_tags() {
    let instance = healthy_instance("13.0.0", 1.0).await;

    let report = aggregator(&["v13.0.0"], &[]).run(vec![instance.config()]).await;
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["registry"]["13.0.0"]["rank"], json!(0));
    assert_eq!(value["tags"][PRIMARY_REPO], json!(["v13.0.0"]));
    assert_eq!(value["alive"][0]["config"]["url"], json!(instance.host()));
    assert!(value["alive"][0]["meta"].get("emojis").is_none());
}
