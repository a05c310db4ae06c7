//! Mock instances served by mockito

use std::io::Write;
use std::thread::sleep;
use std::time::Duration;

use mockito::{Mock, Server, ServerGuard};
use serde_json::{Value, json};

use instance_ranker::config::InstanceConfig;

const SCHEMA_2_0: &str = "http://nodeinfo.diaspora.software/ns/schema/2.0";

/// How one metadata endpoint of a mock instance answers
#[derive(Debug, Clone)]
pub enum Endpoint {
    Json(Value),
    Status(usize),
    /// Sends headers, then stalls the body well past the client deadline
    Stall,
}

/// A running mock instance; mocks live as long as the value
pub struct MockInstance {
    pub server: ServerGuard,
    pub mocks: Vec<Mock>,
}

impl MockInstance {
    pub fn host(&self) -> String {
        self.server.host_with_port()
    }

    pub fn config(&self) -> InstanceConfig {
        InstanceConfig::new(&self.host())
    }
}

/// Daily note chart whose non-zero days average to `mean`
pub fn chart_with_mean(mean: f64) -> Value {
    json!({"local": {"inc": [mean, 0, 0, mean, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]}})
}

/// Instance reporting `version` with the three metadata endpoints answering as given
pub async fn mock_instance(
    version: &str,
    meta: Endpoint,
    stats: Endpoint,
    chart: Endpoint,
) -> MockInstance {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();

    let href = format!("{}/nodeinfo/2.0", server.url());
    mocks.push(
        server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(200)
            .with_body(json!({"links": [{"rel": SCHEMA_2_0, "href": href}]}).to_string())
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/nodeinfo/2.0")
            .with_status(200)
            .with_body(json!({"software": {"name": "misskey", "version": version}}).to_string())
            .create_async()
            .await,
    );

    for (path, endpoint) in [
        ("/api/meta", meta),
        ("/api/stats", stats),
        ("/api/charts/notes", chart),
    ] {
        let mock = server.mock("POST", path);
        let mock = match endpoint {
            Endpoint::Json(body) => mock.with_status(200).with_body(body.to_string()),
            Endpoint::Status(status) => mock.with_status(status),
            Endpoint::Stall => mock.with_status(200).with_chunked_body(|w| {
                sleep(Duration::from_secs(1));
                w.write_all(b"{}")
            }),
        };
        mocks.push(mock.create_async().await);
    }

    MockInstance { server, mocks }
}

/// Instance whose metadata endpoints all answer, with the given activity
pub async fn healthy_instance(version: &str, mean: f64) -> MockInstance {
    mock_instance(
        version,
        Endpoint::Json(json!({"name": "Meta Name", "emojis": []})),
        Endpoint::Json(json!({"notesCount": 1})),
        Endpoint::Json(chart_with_mean(mean)),
    )
    .await
}

/// Instance whose discovery document lists no links
pub async fn linkless_instance() -> MockInstance {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/.well-known/nodeinfo")
        .with_status(200)
        .with_body(r#"{"links": []}"#)
        .create_async()
        .await;
    MockInstance {
        server,
        mocks: vec![mock],
    }
}
