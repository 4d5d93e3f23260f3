//! Release tag ordering.
//!
//! Tags are read as semantic versions after dropping a leading `v` and padding
//! missing minor/patch components (`v1.4` reads as `1.4.0`). Tags that still
//! do not parse only compare equal to an identical tag; anything else is a
//! [`PptError::VersionParse`]. Tags sharing a `<prefix>/` (`cli/v1.2.0`) are
//! compared on the part after it.

use crate::error::{PptError, Result};
use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn loose_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?((?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)$")
            .expect("valid version regex")
    })
}

pub fn parse_version(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    if let Ok(v) = Version::parse(trimmed.trim_start_matches(['v', 'V'])) {
        return Some(v);
    }

    let caps = loose_version_re().captures(trimmed)?;
    let major = &caps[1];
    let minor = caps.get(2).map_or("0", |m| m.as_str());
    let patch = caps.get(3).map_or("0", |m| m.as_str());
    let suffix = caps.get(4).map_or("", |m| m.as_str());
    Version::parse(&format!("{}.{}.{}{}", major, minor, patch, suffix)).ok()
}

/// Compare two release tags.
pub fn compare_versions(current: &str, latest: &str) -> Result<Ordering> {
    if current == latest {
        return Ok(Ordering::Equal);
    }
    let (current, latest) = strip_shared_prefix(current, latest);

    let current_version = parse_version(current).ok_or_else(|| PptError::VersionParse {
        version: current.to_string(),
    })?;
    let latest_version = parse_version(latest).ok_or_else(|| PptError::VersionParse {
        version: latest.to_string(),
    })?;

    // Build metadata carries no precedence.
    Ok(current_version.cmp_precedence(&latest_version))
}

fn strip_shared_prefix<'a>(current: &'a str, latest: &'a str) -> (&'a str, &'a str) {
    match (current.rsplit_once('/'), latest.rsplit_once('/')) {
        (Some((a, current_tail)), Some((b, latest_tail))) if a == b => (current_tail, latest_tail),
        _ => (current, latest),
    }
}

/// True when `latest` is strictly newer than `current`.
pub fn is_newer(current: &str, latest: &str) -> Result<bool> {
    Ok(compare_versions(current, latest)? == Ordering::Less)
}
