//! NodeInfo discovery
//!
//! Instances publish `/.well-known/nodeinfo`, a list of links to NodeInfo
//! documents keyed by schema version. [`client::NodeInfoClient`] follows the
//! preferred link and returns the software identity of the instance.

pub mod client;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use client::{Discovery, NodeInfoClient};

pub const SCHEMA_1_0: &str = "http://nodeinfo.diaspora.software/ns/schema/1.0";
pub const SCHEMA_2_0: &str = "http://nodeinfo.diaspora.software/ns/schema/2.0";
pub const SCHEMA_2_1: &str = "http://nodeinfo.diaspora.software/ns/schema/2.1";

/// Schemas in order of preference
const PREFERRED_SCHEMAS: [&str; 3] = [SCHEMA_2_1, SCHEMA_2_0, SCHEMA_1_0];

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// The well-known discovery document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocument {
    pub links: Vec<Link>,
}

impl DiscoveryDocument {
    /// Reads the document from an arbitrary JSON body.
    ///
    /// Returns `None` when `links` is missing or not an array. Entries that are
    /// not `{rel, href}` objects are skipped.
    pub fn from_value(body: &Value) -> Option<Self> {
        let links = body.get("links")?.as_array()?;
        let links = links
            .iter()
            .filter_map(|link| serde_json::from_value::<Link>(link.clone()).ok())
            .collect();
        Some(Self { links })
    }

    /// The link with the newest supported schema (2.1, then 2.0, then 1.0)
    pub fn preferred_link(&self) -> Option<&Link> {
        PREFERRED_SCHEMAS
            .iter()
            .find_map(|schema| self.links.iter().find(|link| link.rel == *schema))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Software {
    pub name: String,
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A NodeInfo document; fields other than `software` and `metadata` are kept as-is
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NodeInfo {
    pub software: Software,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeInfo {
    pub fn node_name(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.node_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    pub fn node_description(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.node_description.as_deref())
            .filter(|description| !description.is_empty())
    }
}
