use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

/// `major.minor.patch`, optionally followed by a prerelease (hyphen optional) and build metadata
static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\.(\d+)\.(\d+)(?:-?([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("valid version regex")
});

/// First run of up to three dot-separated numbers anywhere in a string
static COERCIBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid coerce regex")
});

/// Parse a loosely written version into a semver::Version.
///
/// Accepts leading `=`/`v` and whitespace, leading zeros, and a prerelease
/// without its hyphen. Build metadata is dropped.
///
/// Examples:
/// - "v12.119.2" -> 12.119.2
/// - " =13.0.0-beta.1 " -> 13.0.0-beta.1
/// - "12.0.0beta1" -> 12.0.0-beta1
/// - "13.0.0+abc123" -> 13.0.0
pub fn parse_loose(raw: &str) -> Option<Version> {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| c == '=' || c == 'v' || c == 'V' || c.is_whitespace());
    let captures = LOOSE_VERSION.captures(trimmed)?;

    let number = |i: usize| captures.get(i)?.as_str().parse::<u64>().ok();
    let pre = match captures.get(4) {
        Some(pre) => Prerelease::new(pre.as_str()).ok()?,
        None => Prerelease::EMPTY,
    };

    Some(Version {
        major: number(1)?,
        minor: number(2)?,
        patch: number(3)?,
        pre,
        build: BuildMetadata::EMPTY,
    })
}

/// Canonical form of a loosely written version, or `None` if it is not one.
pub fn clean_loose(raw: &str) -> Option<String> {
    parse_loose(raw).map(|v| v.to_string())
}

/// Best-effort `major.minor.patch` taken from anywhere in the string.
///
/// Missing minor or patch components become zero; prerelease and build
/// suffixes are ignored.
pub fn coerce(raw: &str) -> Option<String> {
    let captures = COERCIBLE.captures(raw)?;
    let number = |i: usize| -> Option<u64> {
        match captures.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    let version = Version::new(number(1)?, number(2)?, number(3)?);
    Some(version.to_string())
}

/// Parse a comparator operand, padding partial versions like "1" or "1.2" with zeros.
pub fn parse_partial(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    parse_loose(&normalized)
}
