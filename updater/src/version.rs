//! Dotted numeric version comparison.
//!
//! Version strings come from an untrusted remote descriptor, so parsing never
//! fails: a component that is not a non-negative integer counts as `0` and
//! missing trailing components are treated as zero (`1.2` equals `1.2.0`).

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A version decomposed into its numeric components.
///
/// # Examples
///
/// ```
/// use wsmr_updater::version::VersionToken;
///
/// let a = VersionToken::parse("1.10.0");
/// let b = VersionToken::parse("1.9.9");
/// assert!(a > b);
/// assert_eq!(VersionToken::parse("1.2"), VersionToken::parse("1.2.0"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersionToken(Vec<u64>);

impl VersionToken {
    /// Parse a dotted version string, degrading malformed parts to zero.
    ///
    /// Surrounding whitespace and a single leading `v` or `V` are ignored so
    /// release tags such as `v1.4.2` compare like `1.4.2`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if body.is_empty() {
            return Self(Vec::new());
        }
        Self(body.split('.').map(parse_component).collect())
    }

    /// Return the numeric components as parsed.
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.0
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

fn parse_component(part: &str) -> u64 {
    part.trim().parse().unwrap_or(0)
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionToken {}

impl FromStr for VersionToken {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.0.iter();
        match parts.next() {
            Some(first) => write!(f, "{first}")?,
            None => return write!(f, "0"),
        }
        for part in parts {
            write!(f, ".{part}")?;
        }
        Ok(())
    }
}

/// Compare two version strings component-wise.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use wsmr_updater::version::compare;
///
/// assert_eq!(compare("1.2", "1.2.0"), Ordering::Equal);
/// assert_eq!(compare("1.a.0", "1.0.0"), Ordering::Equal);
/// ```
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    VersionToken::parse(a).cmp(&VersionToken::parse(b))
}

/// Return `true` when `candidate` is strictly newer than `baseline`.
#[must_use]
pub fn is_newer(candidate: &str, baseline: &str) -> bool {
    compare(candidate, baseline) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::trailing_zero("1.2", "1.2.0", Ordering::Equal)]
    #[case::double_digit_minor("1.10.0", "1.9.9", Ordering::Greater)]
    #[case::malformed_component("1.a.0", "1.0.0", Ordering::Equal)]
    #[case::shorter_is_older("1.2", "1.2.1", Ordering::Less)]
    #[case::tag_prefix("v2.0.0", "1.99", Ordering::Greater)]
    #[case::empty_is_zero("", "0.0.0", Ordering::Equal)]
    #[case::whitespace("  1.0.1 \n", "1.0.1", Ordering::Equal)]
    #[case::negative_is_malformed("1.-1", "1.0", Ordering::Equal)]
    fn compares_versions(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare(a, b), expected, "compare({a:?}, {b:?})");
    }

    #[test]
    fn comparison_is_antisymmetric_and_transitive() {
        let versions = [
            "0", "0.9", "1", "1.0.0", "1.0.1", "1.2", "1.2.0", "1.9.9", "1.10.0", "1.x", "2.0",
            "10.0.0.1",
        ];
        for a in versions {
            for b in versions {
                assert_eq!(compare(a, b), compare(b, a).reverse(), "{a} vs {b}");
                for c in versions {
                    if compare(a, b).is_le() && compare(b, c).is_le() {
                        assert!(compare(a, c).is_le(), "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[rstest]
    #[case("1.0.1", "1.0.0", true)]
    #[case("1.0.0", "1.0.0", false)]
    #[case("1.9.0", "2.0.0", false)]
    fn is_newer_is_strict(#[case] candidate: &str, #[case] baseline: &str, #[case] newer: bool) {
        assert_eq!(is_newer(candidate, baseline), newer);
    }

    #[test]
    fn display_joins_components() {
        assert_eq!(VersionToken::parse("v1.b.3").to_string(), "1.0.3");
        assert_eq!(VersionToken::parse("").to_string(), "0");
    }
}
