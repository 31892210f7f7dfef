//! Semantic versions and the version gate.

use super::error::MigrationError;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version compared numerically per segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Major segment.
    pub major: u64,
    /// Minor segment.
    pub minor: u64,
    /// Patch segment.
    pub patch: u64,
}

impl SemVer {
    /// Create a version from its segments.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of a component that was never installed.
    pub const ZERO: SemVer = SemVer::new(0, 0, 0);

    /// Parse a version string. Missing trailing segments are zero.
    pub fn parse(input: &str) -> Result<Self, MigrationError> {
        let malformed = |reason: &str| MigrationError::MalformedVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty version"));
        }

        let mut segments = [0u64; 3];
        for (idx, part) in trimmed.split('.').enumerate() {
            if idx >= segments.len() {
                return Err(malformed("more than three segments"));
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("segments must be non-negative integers"));
            }
            segments[idx] = part
                .parse()
                .map_err(|_| malformed("segment out of range"))?;
        }

        Ok(Self::new(segments[0], segments[1], segments[2]))
    }
}

impl FromStr for SemVer {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Decides which upgrade steps still have to run.
pub struct VersionGate;

impl VersionGate {
    /// A step runs when the installed version is older than the step.
    pub fn should_run(installed: &SemVer, step: &SemVer) -> bool {
        installed < step
    }

    /// String form of [`VersionGate::should_run`].
    pub fn should_run_str(installed: &str, step: &str) -> Result<bool, MigrationError> {
        Ok(Self::should_run(&SemVer::parse(installed)?, &SemVer::parse(step)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        assert_eq!(SemVer::parse("1.0.12").unwrap(), SemVer::new(1, 0, 12));
        assert_eq!(SemVer::parse(" 2.3.4 ").unwrap(), SemVer::new(2, 3, 4));
    }

    #[test]
    fn test_missing_segments_are_zero() {
        assert_eq!(SemVer::parse("1").unwrap(), SemVer::new(1, 0, 0));
        assert_eq!(SemVer::parse("1.1").unwrap(), SemVer::new(1, 1, 0));
        assert_eq!(SemVer::parse("1.1").unwrap(), SemVer::parse("1.1.0").unwrap());
    }

    #[test]
    fn test_malformed_versions() {
        for input in ["", "   ", "1..2", "1.0.x", "v1.0.0", "1.0.0.0", "-1.0", "1.0.0-beta"] {
            let err = SemVer::parse(input).unwrap_err();
            assert!(
                matches!(err, MigrationError::MalformedVersion { .. }),
                "expected malformed for {input:?}"
            );
        }
    }

    #[test]
    fn test_numeric_segment_ordering() {
        // 1.0.12 must sort after 1.0.7, unlike a string comparison.
        assert!(SemVer::parse("1.0.7").unwrap() < SemVer::parse("1.0.12").unwrap());
        assert!(SemVer::parse("1.0.16").unwrap() < SemVer::parse("1.1.17").unwrap());
        assert!(SemVer::parse("1.9.9").unwrap() < SemVer::parse("2.0").unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(SemVer::new(1, 1, 21).to_string(), "1.1.21");
        assert_eq!(SemVer::parse("3").unwrap().to_string(), "3.0.0");
    }

    #[test]
    fn test_gate() {
        let installed = SemVer::new(1, 0, 5);
        assert!(!VersionGate::should_run(&installed, &SemVer::new(1, 0, 1)));
        assert!(!VersionGate::should_run(&installed, &SemVer::new(1, 0, 5)));
        assert!(VersionGate::should_run(&installed, &SemVer::new(1, 0, 7)));
        assert!(VersionGate::should_run(&SemVer::ZERO, &SemVer::new(1, 0, 1)));
    }

    #[test]
    fn test_gate_from_strings() {
        assert!(VersionGate::should_run_str("1.0.3", "1.0.12").unwrap());
        assert!(!VersionGate::should_run_str("1.1", "1.0.16").unwrap());
        assert!(VersionGate::should_run_str("1.0.x", "1.0.1").is_err());
    }
}
