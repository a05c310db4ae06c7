//! Known-vulnerable release ranges
//!
//! Ranges use the npm grammar subset found in advisories:
//! - `<1.2.3`, `<=1.2.3`, `>1.2.3`, `>=1.2.3`, `=1.2.3`, `1.2.3` - comparators
//!   (a space between operator and version is allowed)
//! - `>=1.0.0 <2.0.0` - space-separated comparators, all must satisfy
//! - `<1.0.0 || >=2.0.0 <2.1.0` - alternatives, any must satisfy
//!
//! A prerelease version only satisfies an alternative that mentions a
//! prerelease of the same `major.minor.patch`, as npm does.

use std::collections::HashMap;

use semver::Version;
use tracing::warn;

use crate::config::SourceConfig;
use crate::version::semver::{parse_loose, parse_partial};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (op, rest) = if let Some(rest) = spec.strip_prefix(">=") {
            (Op::Gte, rest)
        } else if let Some(rest) = spec.strip_prefix("<=") {
            (Op::Lte, rest)
        } else if let Some(rest) = spec.strip_prefix('>') {
            (Op::Gt, rest)
        } else if let Some(rest) = spec.strip_prefix('<') {
            (Op::Lt, rest)
        } else if let Some(rest) = spec.strip_prefix('=') {
            (Op::Eq, rest)
        } else {
            (Op::Eq, spec)
        };

        parse_partial(rest).map(|version| Comparator { op, version })
    }

    fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Lt => version < &self.version,
            Op::Lte => version <= &self.version,
            Op::Gt => version > &self.version,
            Op::Gte => version >= &self.version,
            Op::Eq => version == &self.version,
        }
    }
}

/// `a b || c d` - an OR of AND-ed comparator sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<Vec<Comparator>>,
}

impl VersionRange {
    pub fn parse(spec: &str) -> Option<Self> {
        let alternatives: Option<Vec<Vec<Comparator>>> = spec
            .split("||")
            .map(|alternative| {
                let comparators: Option<Vec<Comparator>> = join_operators(alternative)
                    .iter()
                    .map(|c| Comparator::parse(c))
                    .collect();
                comparators.filter(|c| !c.is_empty())
            })
            .collect();

        alternatives.map(|alternatives| Self { alternatives })
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|comparators| {
            comparators.iter().all(|c| c.matches(version))
                && (version.pre.is_empty() || allows_prerelease_of(comparators, version))
        })
    }
}

fn allows_prerelease_of(comparators: &[Comparator], version: &Version) -> bool {
    comparators.iter().any(|c| {
        !c.version.pre.is_empty()
            && c.version.major == version.major
            && c.version.minor == version.minor
            && c.version.patch == version.patch
    })
}

/// Split on whitespace, gluing a bare operator to the version that follows it
fn join_operators(alternative: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut pending: Option<&str> = None;

    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=')) {
            pending = Some(token);
            continue;
        }
        match pending.take() {
            Some(op) => parts.push(format!("{}{}", op, token)),
            None => parts.push(token.to_string()),
        }
    }

    parts
}

/// Per-repository table of vulnerable ranges
#[derive(Debug, Clone, Default)]
pub struct VulnerabilityRules {
    rules: HashMap<String, Vec<VersionRange>>,
}

impl VulnerabilityRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the ranges for `repo_id`. Ranges that do not parse are logged and skipped.
    pub fn with_ranges(mut self, repo_id: &str, ranges: &[String]) -> Self {
        let parsed = ranges.iter().filter_map(|spec| {
            let range = VersionRange::parse(spec);
            if range.is_none() {
                warn!("Ignoring unparsable range {:?} for {}", spec, repo_id);
            }
            range
        });
        self.rules
            .entry(repo_id.to_string())
            .or_default()
            .extend(parsed);
        self
    }

    pub fn from_sources(sources: &[SourceConfig]) -> Self {
        sources.iter().fold(Self::new(), |rules, source| {
            rules.with_ranges(&source.repo_id(), &source.vulnerable_ranges)
        })
    }

    /// Whether `version` of `repo_id` falls in any known-vulnerable range.
    ///
    /// Repositories without rules and unparsable versions are never vulnerable.
    pub fn has_vulnerability(&self, repo_id: &str, version: &str) -> bool {
        let Some(ranges) = self.rules.get(repo_id) else {
            return false;
        };
        let Some(version) = parse_loose(version) else {
            return false;
        };
        ranges.iter().any(|range| range.satisfies(&version))
    }
}
