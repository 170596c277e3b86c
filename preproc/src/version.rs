//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use once_cell::sync::Lazy;
use regex::Regex;

/// `major.minor[.patch][release-suffix]*`, e.g. `1.2`, `1.2.3`, `1.2.3-beta_2`.
pub const VERSION_PATTERN: &str =
    r"([0-9]+)\.([0-9]+)(?:\.([0-9]+))?((?:[+\-_.][A-Za-z0-9_]+)*)";

static VERSION_CONST: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{VERSION_PATTERN}")).unwrap());

/// A version literal.
///
/// Ordering is by (major, minor, patch, release); an absent patch sorts below
/// any present patch when major and minor are equal, and likewise an absent
/// release suffix sorts below a present one.  The derived `Ord` on the field
/// order below implements exactly that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
    pub release: Option<String>,
}

impl Version {
    /// Parse a version from the front of `input`, returning the version and
    /// the number of bytes consumed.
    pub fn parse_prefix(input: &str) -> Option<(Version, usize)> {
        let caps = VERSION_CONST.captures(input)?;
        let major = caps[1].parse().ok()?;
        let minor = caps[2].parse().ok()?;
        let patch = match caps.get(3) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        let release = match caps.get(4) {
            Some(m) if !m.as_str().is_empty() => Some(m.as_str().to_string()),
            _ => None,
        };
        Some((
            Version {
                major,
                minor,
                patch,
                release,
            },
            caps.get(0).unwrap().end(),
        ))
    }

    /// Parse `input` as a version, requiring the whole string to match.
    pub fn parse_full(input: &str) -> Option<Version> {
        match Self::parse_prefix(input) {
            Some((version, len)) if len == input.len() => Some(version),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        if let Some(release) = &self.release {
            write!(f, "{release}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn v(input: &str) -> Version {
        Version::parse_full(input).unwrap()
    }

    #[test]
    fn parses_components() {
        assert_eq!(
            v("1.2.3"),
            Version {
                major: 1,
                minor: 2,
                patch: Some(3),
                release: None
            }
        );
        assert_eq!(v("10.0").patch, None);
        assert_eq!(v("1.2.3-beta_2").release.as_deref(), Some("-beta_2"));
        assert_eq!(v("1.2.3-rc.1").release.as_deref(), Some("-rc.1"));
    }

    #[test]
    fn parse_prefix_reports_length() {
        let (version, len) = Version::parse_prefix("1.5 && true").unwrap();
        assert_eq!(version, v("1.5"));
        assert_eq!(len, 3);
        assert!(Version::parse_prefix("abc").is_none());
        assert!(Version::parse_prefix("5").is_none());
    }

    #[test]
    fn full_match_rejects_trailing_input() {
        assert!(Version::parse_full("1.2.3 ").is_none());
        assert!(Version::parse_full("1.2.3").is_some());
    }

    #[test]
    fn numeric_component_ordering() {
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("1.2.3") > v("1.2.2"));
    }

    #[test]
    fn absent_patch_sorts_below_present() {
        assert!(v("1.2") < v("1.2.0"));
        assert!(v("1.2") < v("1.2.9"));
        assert!(v("1.3") > v("1.2.9"));
    }

    #[test]
    fn release_suffix_ordering() {
        assert!(v("1.2.3") < v("1.2.3-beta"));
        assert!(v("1.2.3-alpha") < v("1.2.3-beta"));
        assert_eq!(v("1.2.3"), v("1.2.3"));
    }

    #[test]
    fn display_round_trip() {
        for text in ["1.2", "1.2.3", "1.2.3-rc1"] {
            assert_eq!(v(text).to_string(), text);
        }
    }
}
