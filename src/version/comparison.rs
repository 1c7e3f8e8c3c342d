//! Version comparison for update decisions.
//!
//! Release tags and the version reported by a running binary are free-form
//! strings. This module turns them into [`semver::Version`] values and orders
//! them by semver precedence: numeric major/minor/patch first, a pre-release
//! sorts below the same release without one, and build metadata is ignored.
//!
//! # Examples
//!
//! ```rust
//! use std::cmp::Ordering;
//! use upkeep_cli::version::VersionComparator;
//!
//! # fn example() -> upkeep_cli::core::UpkeepResult<()> {
//! assert!(VersionComparator::is_outdated("v1.2.0", "1.3.0-beta")?);
//! assert!(!VersionComparator::is_outdated("1.2.0", "1.2.0")?);
//! assert_eq!(VersionComparator::compare("1.0.0+build.7", "1.0.0")?, Ordering::Equal);
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;

use semver::Version;

use crate::core::{UpkeepError, UpkeepResult};

/// Stateless comparison helpers over version strings.
pub struct VersionComparator;

impl VersionComparator {
    /// Orders two version strings by semver precedence.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::VersionParse`] naming whichever input failed to
    /// parse (the left one is checked first).
    pub fn compare(a: &str, b: &str) -> UpkeepResult<Ordering> {
        let a = parse_version(a)?;
        let b = parse_version(b)?;
        Ok(precedence(&a, &b))
    }

    /// Returns `true` iff `current` sorts strictly below `latest`.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::VersionParse`] if either string is malformed.
    pub fn is_outdated(current: &str, latest: &str) -> UpkeepResult<bool> {
        Ok(Self::compare(current, latest)? == Ordering::Less)
    }
}

/// Compares two parsed versions, ignoring build metadata.
///
/// [`Version`]'s own `Ord` breaks ties on build metadata, which semver
/// precedence does not.
#[must_use]
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// Parses a version string leniently.
///
/// Accepts a leading `v`/`V` and zero-fills missing minor and patch numbers,
/// so `v2` parses as `2.0.0` and `1.4-rc.1` as `1.4.0-rc.1`. Anything else
/// must be valid semver.
///
/// # Errors
///
/// Returns [`UpkeepError::VersionParse`] carrying the original input.
pub fn parse_version(input: &str) -> UpkeepResult<Version> {
    let invalid = |reason: String| UpkeepError::VersionParse {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    let unprefixed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    if unprefixed.is_empty() {
        return Err(invalid("empty version".to_string()));
    }

    // The numeric core ends at the first pre-release or build marker
    let split = unprefixed.find(['-', '+']).unwrap_or(unprefixed.len());
    let (core, suffix) = unprefixed.split_at(split);

    let components: Vec<&str> = core.split('.').collect();
    if components.len() > 3 || components.iter().any(|c| c.is_empty()) {
        return Err(invalid(format!("'{core}' is not of the form MAJOR[.MINOR[.PATCH]]")));
    }

    let mut normalized = components.join(".");
    for _ in components.len()..3 {
        normalized.push_str(".0");
    }
    normalized.push_str(suffix);

    Version::parse(&normalized).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_zero_fill() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("V1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_version("v2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_version("  3.1.4  ").unwrap(), Version::new(3, 1, 4));

        let pre = parse_version("1.4-rc.1").unwrap();
        assert_eq!((pre.major, pre.minor, pre.patch), (1, 4, 0));
        assert_eq!(pre.pre.as_str(), "rc.1");
    }

    #[test]
    fn test_malformed_versions_name_the_input() {
        for bad in ["", "v", "latest", "1..2", "1.2.3.4", "1.x.0", "1.2.3-", "-1.0.0"] {
            match parse_version(bad) {
                Err(UpkeepError::VersionParse {
                    input,
                    ..
                }) => assert_eq!(input, bad),
                other => panic!("expected VersionParse for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_is_outdated_matches_compare_less() {
        let pairs = [
            ("1.2.0", "1.2.0"),
            ("1.2.0", "1.3.0-beta"),
            ("1.3.0-beta", "1.3.0"),
            ("1.3.0", "1.3.0-beta"),
            ("2.0.0", "1.99.99"),
            ("1.0.0-alpha", "1.0.0-alpha.1"),
            ("v0.9", "0.10.0"),
        ];
        for (a, b) in pairs {
            let outdated = VersionComparator::is_outdated(a, b).unwrap();
            let ordering = VersionComparator::compare(a, b).unwrap();
            assert_eq!(outdated, ordering == Ordering::Less, "{a} vs {b}");
        }
    }

    #[test]
    fn test_precedence_rules() {
        assert!(!VersionComparator::is_outdated("1.2.0", "1.2.0").unwrap());
        assert_eq!(VersionComparator::compare("1.3.0-beta", "1.2.0").unwrap(), Ordering::Greater);
        assert_eq!(VersionComparator::compare("1.3.0", "1.3.0-beta").unwrap(), Ordering::Greater);
        assert_eq!(VersionComparator::compare("1.10.0", "1.9.0").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_build_metadata_ignored() {
        assert_eq!(
            VersionComparator::compare("1.0.0+linux.amd64", "1.0.0+darwin").unwrap(),
            Ordering::Equal
        );
        assert!(!VersionComparator::is_outdated("1.0.0", "v1.0.0+build.5").unwrap());
    }

    #[test]
    fn test_error_names_right_operand() {
        let err = VersionComparator::compare("1.0.0", "nightly").unwrap_err();
        assert!(err.to_string().contains("'nightly'"));
    }
}
