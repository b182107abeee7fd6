//! Semantic-version extraction from free-form text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Matches the first semver-shaped substring in a larger text. Numeric
/// components reject leading zeros; an optional leading `v` is accepted and
/// stripped.
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bv?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?",
    )
    .expect("version pattern is valid")
});

/// A parsed semantic version. Two versions are equal when their normalized
/// renderings are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// True for prerelease versions (`1.2.3-rc.1` and friends).
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

/// Scan `text` for the first substring matching the semantic-version grammar
/// and return its parts, or `None` when no version is present.
pub fn parse(text: &str) -> Option<Version> {
    let captures = VERSION_PATTERN.captures(text)?;
    Some(Version {
        major: captures[1].parse().ok()?,
        minor: captures[2].parse().ok()?,
        patch: captures[3].parse().ok()?,
        pre: captures.get(4).map(|m| m.as_str().to_string()),
        build: captures.get(5).map(|m| m.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_version() {
        let version = parse("1.2.3").unwrap();
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 2);
        assert_eq!(version.patch, 3);
        assert!(version.pre.is_none());
        assert!(version.build.is_none());
    }

    #[test]
    fn test_parse_strips_leading_v() {
        assert_eq!(parse("v1.2.3"), parse("1.2.3"));
        assert_eq!(parse("v0.1.0-rc.1"), parse("0.1.0-rc.1"));
    }

    #[test]
    fn test_parse_pre_and_build() {
        let version = parse("2.0.0-beta.1+build.42").unwrap();
        assert_eq!(version.pre.as_deref(), Some("beta.1"));
        assert_eq!(version.build.as_deref(), Some("build.42"));
        assert!(version.is_prerelease());
    }

    #[test]
    fn test_parse_embedded_in_text() {
        let version = parse("release v10.20.30 is out").unwrap();
        assert_eq!(version.to_string(), "10.20.30");
    }

    #[test]
    fn test_parse_rejects_leading_zeros() {
        assert!(parse("01.2.3").is_none());
        assert!(parse("nothing here").is_none());
    }

    #[test]
    fn test_normalized_rendering() {
        assert_eq!(parse("v1.2.3-rc.1").unwrap().to_string(), "1.2.3-rc.1");
    }
}
