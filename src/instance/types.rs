//! Records fetched from an instance's API and the classified result

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::InstanceConfig;
use crate::nodeinfo::NodeInfo;

/// Fields of `/api/meta` that are large and never read downstream
const HEAVY_META_FIELDS: [&str; 2] = ["emojis", "announcements"];

/// Response of `/api/meta`
///
/// Instances disagree on shapes, so fields read here decode leniently: a
/// value of the wrong type reads as absent instead of failing the record.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Meta {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Reads any JSON body; a non-object yields an empty record
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Drops the emoji list and announcements
    pub fn strip_heavy_fields(&mut self) {
        for field in HEAVY_META_FIELDS {
            self.extra.remove(field);
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|description| !description.is_empty())
    }
}

/// One series of `/api/charts/notes`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ChartSeries {
    /// Notes created per day; non-numeric entries are dropped
    #[serde(
        default,
        deserialize_with = "lenient_numbers",
        skip_serializing_if = "Option::is_none"
    )]
    pub inc: Option<Vec<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `/api/charts/notes` with `span: "day"`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NoteChart {
    #[serde(
        default,
        deserialize_with = "lenient_series",
        skip_serializing_if = "Option::is_none"
    )]
    pub local: Option<ChartSeries>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoteChart {
    /// Reads any JSON body; a non-object yields a chart without series
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Daily increments of local notes, if the chart has them
    pub fn daily_increments(&self) -> Option<&[f64]> {
        self.local.as_ref()?.inc.as_deref()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_numbers<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<f64>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => Some(items.iter().filter_map(Value::as_f64).collect()),
        _ => None,
    })
}

fn lenient_series<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ChartSeries>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

/// An instance that answered every request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AliveInstance {
    pub config: InstanceConfig,
    pub name: String,
    pub description: Option<String>,
    pub langs: Vec<String>,
    pub score: f64,
    pub repo: String,
    pub nodeinfo: NodeInfo,
    pub meta: Meta,
    pub stats: Value,
    pub note_chart: NoteChart,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeadInstance {
    pub config: InstanceConfig,
}

/// An instance running a release with a known vulnerability
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutdatedInstance {
    pub config: InstanceConfig,
    pub nodeinfo: NodeInfo,
}

/// Outcome of evaluating one instance
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedInstance {
    Alive(Box<AliveInstance>),
    Dead(DeadInstance),
    Outdated(Box<OutdatedInstance>),
}

impl ClassifiedInstance {
    pub fn dead(config: InstanceConfig) -> Self {
        ClassifiedInstance::Dead(DeadInstance { config })
    }

    pub fn config(&self) -> &InstanceConfig {
        match self {
            ClassifiedInstance::Alive(alive) => &alive.config,
            ClassifiedInstance::Dead(dead) => &dead.config,
            ClassifiedInstance::Outdated(outdated) => &outdated.config,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            ClassifiedInstance::Alive(alive) => Some(alive.score),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_heavy_fields_removes_emojis_and_announcements_only() {
        let mut meta: Meta = serde_json::from_value(json!({
            "name": "Example",
            "emojis": [{"name": "blobcat"}],
            "announcements": [{"title": "hi"}],
            "maxNoteTextLength": 3000
        }))
        .unwrap();

        meta.strip_heavy_fields();

        assert_eq!(meta.name(), Some("Example"));
        assert!(!meta.extra.contains_key("emojis"));
        assert!(!meta.extra.contains_key("announcements"));
        assert_eq!(meta.extra.get("maxNoteTextLength"), Some(&json!(3000)));
    }

    #[test]
    fn meta_treats_null_and_empty_strings_as_missing() {
        let meta: Meta =
            serde_json::from_value(json!({"name": "", "description": null})).unwrap();

        assert_eq!(meta.name(), None);
        assert_eq!(meta.description(), None);
    }

    #[test]
    fn note_chart_exposes_local_increments() {
        let chart: NoteChart = serde_json::from_value(json!({
            "local": {"total": [1, 2], "inc": [5, 0, 10]},
            "remote": {"inc": [100]}
        }))
        .unwrap();

        assert_eq!(chart.daily_increments(), Some(&[5.0, 0.0, 10.0][..]));
    }

    #[test]
    fn meta_reads_mistyped_fields_as_missing() {
        let meta = Meta::from_value(json!({"name": 42, "description": ["a"], "uri": "x"}));

        assert_eq!(meta.name(), None);
        assert_eq!(meta.description(), None);
        assert_eq!(meta.extra.get("uri"), Some(&json!("x")));
    }

    #[test]
    fn meta_from_non_object_is_empty() {
        assert_eq!(Meta::from_value(json!([1, 2])), Meta::default());
    }

    #[test]
    fn note_chart_keeps_only_numeric_increments() {
        let chart = NoteChart::from_value(json!({"local": {"inc": [1, null, "x", 3]}}));

        assert_eq!(chart.daily_increments(), Some(&[1.0, 3.0][..]));
    }

    #[test]
    fn note_chart_ignores_malformed_series() {
        for body in [
            json!([]),
            json!({"local": 5}),
            json!({"local": {"inc": "many"}}),
            json!({"local": null}),
        ] {
            assert_eq!(NoteChart::from_value(body).daily_increments(), None);
        }
    }

    #[test]
    fn note_chart_without_local_series_has_no_increments() {
        let chart: NoteChart = serde_json::from_value(json!({"remote": {}})).unwrap();

        assert_eq!(chart.daily_increments(), None);
    }
}
