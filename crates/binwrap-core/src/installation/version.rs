//! Version ranges and version extraction from probe output

use crate::errors::{BinWrapError, BinWrapResult};
use regex::Regex;
use semver::{Version, VersionReq};
use std::sync::OnceLock;

/// A semantic-version constraint the installed binary must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    req: VersionReq,
}

impl VersionRange {
    /// Parse a range such as `^1.2.0`, `>=1.2, <2` or `>=1.2.0 <2.0.0`
    pub fn parse(raw: &str) -> BinWrapResult<Self> {
        let trimmed = raw.trim();
        let req = VersionReq::parse(trimmed)
            .or_else(|_| VersionReq::parse(&join_comparators(trimmed)))
            .map_err(|e| {
                BinWrapError::invalid_configuration(format!("Invalid version range '{}': {}", raw, e))
            })?;

        Ok(Self {
            raw: trimmed.to_string(),
            req,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Turn whitespace-separated comparators (`>=1.2.0 <2.0.0`) into the
/// comma-separated form the semver crate parses
fn join_comparators(raw: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for token in raw.split_whitespace() {
        match parts.last_mut() {
            Some(last) if is_operator(last.as_str()) => last.push_str(token),
            _ => parts.push(token.to_string()),
        }
    }
    parts.join(", ")
}

fn is_operator(token: &str) -> bool {
    token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\bv?(\d+)\.(\d+)(?:\.(\d+))?(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?")
            .expect("version pattern is valid")
    })
}

/// Find the first version-looking token in `output`.
///
/// Two-component versions (`1.2`) are read as `1.2.0`.
pub fn find_version(output: &str) -> Option<Version> {
    version_pattern().captures_iter(output).find_map(|caps| {
        let patch = caps.get(3).map_or("0", |m| m.as_str());
        let candidate = format!(
            "{}.{}.{}{}{}",
            &caps[1],
            &caps[2],
            patch,
            caps.get(4).map_or("", |m| m.as_str()),
            caps.get(5).map_or("", |m| m.as_str()),
        );
        Version::parse(&candidate).ok()
    })
}
