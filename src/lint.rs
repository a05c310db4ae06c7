//! Consistency checks over the raw instance list

use std::collections::HashSet;

use serde::Serialize;
use toml::{Table, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    /// URLs listed more than once, each reported once in first-seen order
    pub duplicated: Vec<String>,
    /// URLs of entries whose `langs` is present but not an array
    pub invalid_langs: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.duplicated.is_empty() && self.invalid_langs.is_empty()
    }
}

/// Lints the `[[instances]]` tables of a parsed instance file.
///
/// Entries without a string `url` are skipped; they fail to load anyway.
pub fn lint_instances(file: &Table) -> LintReport {
    let mut report = LintReport::default();
    let Some(instances) = file.get("instances").and_then(Value::as_array) else {
        return report;
    };

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for entry in instances.iter().filter_map(Value::as_table) {
        let Some(url) = entry.get("url").and_then(Value::as_str) else {
            continue;
        };

        if !seen.insert(url) && reported.insert(url) {
            report.duplicated.push(url.to_string());
        }
        if entry.get("langs").is_some_and(|langs| !langs.is_array()) {
            report.invalid_langs.push(url.to_string());
        }
    }

    report
}
