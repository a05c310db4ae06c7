//! Two-hop NodeInfo discovery client

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::fetch::{FetchClient, FetchOutcome, RetryReason};
use crate::nodeinfo::{DiscoveryDocument, NodeInfo};

/// Result of one discovery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    Found(NodeInfo),
    /// The instance answered, but offers no usable NodeInfo (or the document timed out)
    Absent,
    /// Neither a document nor a definite absence; worth another try
    Indeterminate,
}

#[derive(Debug, Clone)]
pub struct NodeInfoClient {
    fetch: FetchClient,
    scheme: String,
    retry_delay: Duration,
}

impl NodeInfoClient {
    pub fn new(fetch: FetchClient, http: &HttpConfig) -> Self {
        Self {
            fetch,
            scheme: http.scheme.clone(),
            retry_delay: http.discovery_retry_delay(),
        }
    }

    /// Fetches `/.well-known/nodeinfo` from `host`, then the document behind its preferred link.
    pub async fn get_nodeinfo(&self, host: &str) -> Discovery {
        let well_known_url = format!("{}://{}/.well-known/nodeinfo", self.scheme, host);

        let body = self
            .fetch
            .request_json::<Value>(Method::GET, &well_known_url, None)
            .await;
        let Some(body) = body.success() else {
            info!("Get well-known nodeinfo failed: {}", well_known_url);
            return Discovery::Indeterminate;
        };
        debug!("Get well-known nodeinfo finish: {}", well_known_url);

        let Some(document) = DiscoveryDocument::from_value(&body) else {
            info!("Well-known nodeinfo has no links array: {}", well_known_url);
            return Discovery::Absent;
        };
        let Some(link) = document.preferred_link() else {
            info!("Well-known nodeinfo has no supported schema: {}", well_known_url);
            return Discovery::Absent;
        };

        match self
            .fetch
            .request_json::<NodeInfo>(Method::GET, &link.href, None)
            .await
        {
            FetchOutcome::Success(nodeinfo) => {
                debug!("Get nodeinfo finish: {}", link.href);
                Discovery::Found(nodeinfo)
            }
            FetchOutcome::RetryableFailure(RetryReason::Timeout) => {
                info!("Get nodeinfo timed out: {}", link.href);
                Discovery::Absent
            }
            _ => {
                info!("Get nodeinfo failed: {}", link.href);
                Discovery::Indeterminate
            }
        }
    }

    /// Discovers NodeInfo, repeating once after a delay if the first attempt is indeterminate.
    ///
    /// `None` means the instance is treated as dead for this run.
    pub async fn safe_get_nodeinfo(&self, host: &str) -> Option<NodeInfo> {
        match self.get_nodeinfo(host).await {
            Discovery::Found(nodeinfo) => return Some(nodeinfo),
            Discovery::Absent => return None,
            Discovery::Indeterminate => {}
        }

        info!(
            "Discovery for {} was indeterminate, retrying in {:?}",
            host, self.retry_delay
        );
        sleep(self.retry_delay).await;

        match self.get_nodeinfo(host).await {
            Discovery::Found(nodeinfo) => Some(nodeinfo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodeinfo::SCHEMA_2_0;
    use crate::test_support::{fast_http_config, silent_server};
    use mockito::{Server, ServerGuard};
    use serde_json::json;

    fn client() -> NodeInfoClient {
        let http = fast_http_config();
        NodeInfoClient::new(FetchClient::new(&http).unwrap(), &http)
    }

    async fn mock_well_known(server: &mut ServerGuard, href: &str) -> mockito::Mock {
        server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"links": [{"rel": SCHEMA_2_0, "href": href}]}).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn get_nodeinfo_follows_preferred_link() {
        let mut server = Server::new_async().await;
        let href = format!("{}/nodeinfo/2.0", server.url());
        let well_known = mock_well_known(&mut server, &href).await;
        let document = server
            .mock("GET", "/nodeinfo/2.0")
            .with_status(200)
            .with_body(r#"{"software": {"name": "misskey", "version": "13.0.0"}}"#)
            .create_async()
            .await;

        let result = client().get_nodeinfo(&server.host_with_port()).await;

        well_known.assert_async().await;
        document.assert_async().await;
        let Discovery::Found(nodeinfo) = result else {
            panic!("expected nodeinfo, got {:?}", result);
        };
        assert_eq!(nodeinfo.software.version, "13.0.0");
    }

    #[tokio::test]
    async fn get_nodeinfo_is_indeterminate_when_well_known_fails() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(500)
            .create_async()
            .await;

        let result = client().get_nodeinfo(&server.host_with_port()).await;

        assert_eq!(result, Discovery::Indeterminate);
    }

    #[tokio::test]
    async fn get_nodeinfo_is_absent_for_empty_links() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(200)
            .with_body(r#"{"links": []}"#)
            .create_async()
            .await;

        let result = client().get_nodeinfo(&server.host_with_port()).await;

        assert_eq!(result, Discovery::Absent);
    }

    #[tokio::test]
    async fn get_nodeinfo_is_absent_when_document_times_out() {
        let mut server = Server::new_async().await;
        let silent = silent_server().await;
        let _well_known =
            mock_well_known(&mut server, &format!("http://{}/nodeinfo/2.0", silent)).await;

        let result = client().get_nodeinfo(&server.host_with_port()).await;

        assert_eq!(result, Discovery::Absent);
    }

    #[tokio::test]
    async fn get_nodeinfo_is_indeterminate_when_document_is_malformed() {
        let mut server = Server::new_async().await;
        let href = format!("{}/nodeinfo/2.0", server.url());
        let _well_known = mock_well_known(&mut server, &href).await;
        let _mock = server
            .mock("GET", "/nodeinfo/2.0")
            .with_status(200)
            .with_body(r#"{"software": "nope"}"#)
            .create_async()
            .await;

        let result = client().get_nodeinfo(&server.host_with_port()).await;

        assert_eq!(result, Discovery::Indeterminate);
    }

    #[tokio::test]
    async fn safe_get_nodeinfo_retries_indeterminate_discovery_once() {
        let mut server = Server::new_async().await;
        let well_known = server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let result = client().safe_get_nodeinfo(&server.host_with_port()).await;

        well_known.assert_async().await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn safe_get_nodeinfo_does_not_retry_confirmed_absence() {
        let mut server = Server::new_async().await;
        let well_known = server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(200)
            .with_body(r#"{"links": "nope"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = client().safe_get_nodeinfo(&server.host_with_port()).await;

        well_known.assert_async().await;
        assert_eq!(result, None);
    }
}
