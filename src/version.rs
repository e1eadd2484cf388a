//! Lenient dotted-version comparison for system package requirements.
//!
//! Installed versions come straight from the platform package index and may
//! carry an epoch (`2:`) and a packaging revision (`-3ubuntu1`). Both are
//! stripped before comparison. Requirement strings are compared as written.
//!
//! Components that do not parse as integers become `-1`, so they order below
//! every real component (including `0`). Tuples compare lexicographically and a
//! strict prefix orders before the longer tuple: `1.2 < 1.2.0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::IntErrorKind;

/// Value substituted for a component that is not an integer.
pub const NON_NUMERIC_COMPONENT: i64 = -1;

/// Verdict of comparing an installed version against a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Satisfaction {
    MeetsRecommended,
    MeetsMinimum,
    BelowMinimum,
}

impl Satisfaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Satisfaction::MeetsRecommended => "meets-recommended",
            Satisfaction::MeetsMinimum => "meets-minimum",
            Satisfaction::BelowMinimum => "below-minimum",
        }
    }

    /// Whether the installed version is good enough to skip building.
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, Satisfaction::BelowMinimum)
    }
}

impl fmt::Display for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer components of a dotted version string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTuple(Vec<i64>);

impl VersionTuple {
    /// Splits on `.` and parses every component leniently. Never fails.
    pub fn parse_lenient(version: &str) -> Self {
        VersionTuple(version.split('.').map(lenient_component).collect())
    }

    pub fn components(&self) -> &[i64] {
        &self.0
    }
}

impl fmt::Display for VersionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

fn lenient_component(component: &str) -> i64 {
    match component.trim().parse::<i64>() {
        Ok(value) => value,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => NON_NUMERIC_COMPONENT,
        },
    }
}

/// Drops a packaging revision (from the first `-`) and an epoch (up to the
/// last `:`) from an installed version string.
pub fn strip_epoch_and_revision(installed: &str) -> &str {
    let without_revision = installed.split('-').next().unwrap_or(installed);
    match without_revision.rfind(':') {
        Some(idx) => &without_revision[idx + 1..],
        None => without_revision,
    }
}

/// Decides whether `installed` satisfies the `minimum`/`recommended` pair.
pub fn compare_versions(installed: &str, minimum: &str, recommended: &str) -> Satisfaction {
    let installed = VersionTuple::parse_lenient(strip_epoch_and_revision(installed));

    if installed >= VersionTuple::parse_lenient(recommended) {
        return Satisfaction::MeetsRecommended;
    }

    if installed >= VersionTuple::parse_lenient(minimum) {
        return Satisfaction::MeetsMinimum;
    }

    Satisfaction::BelowMinimum
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        non_numeric_component = { "1.2.a", "1.2.0", "1.3.0", Satisfaction::BelowMinimum },
        shorter_prefix = { "1.2", "1.2.1", "1.3", Satisfaction::BelowMinimum },
        epoch_and_revision = { "2:1.5-3", "1.0", "1.5", Satisfaction::MeetsRecommended },
        between_bounds = { "1.4", "1.0", "1.6", Satisfaction::MeetsMinimum },
        longer_installed = { "1.6.1", "1.0", "1.6", Satisfaction::MeetsRecommended },
        double_digit = { "1.10", "1.9", "1.11", Satisfaction::MeetsMinimum },
        empty_installed = { "", "0", "1", Satisfaction::BelowMinimum },
        ubuntu_revision = { "1:2.36.0-2ubuntu1", "2.30", "2.36", Satisfaction::MeetsRecommended },
    )]
    fn test_compare_versions(installed: &str, minimum: &str, recommended: &str, expected: Satisfaction) {
        assert_eq!(compare_versions(installed, minimum, recommended), expected);
    }

    #[test]
    fn test_identical_versions_meet_recommended() {
        for v in ["0", "1", "1.2", "3.14.15", "10.0.0.1", "weird", ""] {
            assert_eq!(compare_versions(v, v, v), Satisfaction::MeetsRecommended, "{}", v);
        }
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let cases = [
            ("2:1.5-3", "1.4", "1.6"),
            ("1:0.9", "1.0", "1.1"),
            ("3.2-1-2", "3.2", "3.3"),
        ];
        for (installed, min, rec) in cases {
            let stripped = strip_epoch_and_revision(installed);
            assert_eq!(
                compare_versions(installed, min, rec),
                compare_versions(stripped, min, rec)
            );
        }
    }

    #[test]
    fn test_strip_epoch_and_revision() {
        assert_eq!(strip_epoch_and_revision("2:1.5-3"), "1.5");
        assert_eq!(strip_epoch_and_revision("1.5"), "1.5");
        assert_eq!(strip_epoch_and_revision("1:2:3.0"), "3.0");
        assert_eq!(strip_epoch_and_revision("-1"), "");
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(VersionTuple::parse_lenient("1.2.a").components(), &[1, 2, -1]);
        assert_eq!(VersionTuple::parse_lenient("").components(), &[-1]);
        assert_eq!(VersionTuple::parse_lenient("1..2").components(), &[1, -1, 2]);
        assert_eq!(VersionTuple::parse_lenient(" 7 .+3").components(), &[7, 3]);
    }

    #[test]
    fn test_non_numeric_orders_below_zero() {
        assert!(VersionTuple::parse_lenient("1.rc") < VersionTuple::parse_lenient("1.0"));
        assert!(VersionTuple::parse_lenient("1.2") < VersionTuple::parse_lenient("1.2.0"));
    }

    #[test]
    fn test_satisfaction_display() {
        assert_eq!(Satisfaction::MeetsMinimum.to_string(), "meets-minimum");
        assert!(Satisfaction::MeetsMinimum.is_satisfied());
        assert!(!Satisfaction::BelowMinimum.is_satisfied());
    }

    #[test]
    fn test_satisfaction_serializes_like_display() {
        for verdict in [
            Satisfaction::MeetsRecommended,
            Satisfaction::MeetsMinimum,
            Satisfaction::BelowMinimum,
        ] {
            let json = serde_json::to_value(verdict).unwrap();
            assert_eq!(json, verdict.as_str());
        }
    }
}
