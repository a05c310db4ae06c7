//! Resolution of an instance's reported version against the registry
//!
//! Reported versions are often decorated (`13.0.1-cherry.2`, `v12.119.2+abc`),
//! so resolution goes from strict to loose:
//! 1. exact match of the cleaned version
//! 2. registry keys that prefix the cleaned version (or, for the primary
//!    repository, the coerced `major.minor.patch`); rank 0 wins at once,
//!    otherwise the smallest rank, first key in ascending order on ties
//! 3. a version newer than a rank-0 release of the same major counts as that release
//! 4. otherwise the primary repository at [`UNKNOWN_VERSION_RANK`]

use serde::Serialize;

use crate::config::UNKNOWN_VERSION_RANK;
use crate::version::registry::{ReleaseRecord, VersionRegistry};
use crate::version::semver::{clean_loose, coerce, parse_loose};

/// Result of resolving one reported version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionResolution {
    /// Whether the cleaned version is itself a registry key
    pub exact: bool,
    pub repo_id: String,
    pub rank: u32,
    pub vulnerable: bool,
}

impl VersionResolution {
    fn from_record(record: &ReleaseRecord, exact: bool) -> Self {
        Self {
            exact,
            repo_id: record.repo_id.clone(),
            rank: record.rank,
            vulnerable: record.vulnerable,
        }
    }

    fn unknown(primary_repo: &str) -> Self {
        Self {
            exact: false,
            repo_id: primary_repo.to_string(),
            rank: UNKNOWN_VERSION_RANK,
            vulnerable: false,
        }
    }

    /// Only an exactly identified vulnerable release blocks an instance
    pub fn is_known_vulnerable(&self) -> bool {
        self.exact && self.vulnerable
    }
}

pub fn resolve_version(
    raw: &str,
    registry: &VersionRegistry,
    primary_repo: &str,
) -> VersionResolution {
    let cleaned = clean_loose(raw);
    if let Some(record) = cleaned.as_deref().and_then(|v| registry.get(v)) {
        return VersionResolution::from_record(record, true);
    }

    let coerced = coerce(raw);
    let mut best: Option<&ReleaseRecord> = None;
    for (key, record) in registry.iter() {
        let cleaned_matches = cleaned
            .as_deref()
            .is_some_and(|v| v.starts_with(key.as_str()));
        let coerced_matches = record.repo_id == primary_repo
            && coerced
                .as_deref()
                .is_some_and(|v| v.starts_with(key.as_str()));
        if !(cleaned_matches || coerced_matches) {
            continue;
        }

        if record.rank == 0 {
            return VersionResolution::from_record(record, false);
        }
        if best.is_none_or(|current| record.rank < current.rank) {
            best = Some(record);
        }
    }
    if let Some(record) = best {
        return VersionResolution::from_record(record, false);
    }

    if let Some(record) = newest_release_below(raw, registry) {
        return VersionResolution::from_record(record, false);
    }

    VersionResolution::unknown(primary_repo)
}

/// A rank-0 release of the same major that `raw` is newer than
fn newest_release_below<'a>(raw: &str, registry: &'a VersionRegistry) -> Option<&'a ReleaseRecord> {
    let reported = parse_loose(raw).or_else(|| coerce(raw).as_deref().and_then(parse_loose))?;

    registry
        .iter()
        .filter(|(_, record)| record.rank == 0)
        .find(|(key, _)| {
            parse_loose(key)
                .is_some_and(|newest| newest.major == reported.major && reported > newest)
        })
        .map(|(_, record)| record)
}
