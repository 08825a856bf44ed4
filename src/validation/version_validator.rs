//! Version Validator - Checks container and component versions
//!
//! The platform accepts full semantic versions (`1.2.3`, `1.0.0-beta.1+b7`)
//! and the `MAJOR.MINOR` shorthand that older publish files use.
//!
//! # Example
//!
//! ```
//! use tao_publisher::validation::version_validator::VersionValidator;
//!
//! let validator = VersionValidator::new();
//! let result = validator.validate("2.1");
//!
//! assert!(result.is_valid);
//! assert_eq!(result.major, Some(2));
//! assert_eq!(result.minor, Some(1));
//! assert_eq!(result.patch, Some(0));
//! ```

use semver::Version;

/// Result of version validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionValidationResult {
    /// Whether the version is well-formed
    pub is_valid: bool,
    /// Validation error message (if any)
    pub error: Option<String>,
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    /// Pre-release part (e.g., "alpha.1")
    pub prerelease: Option<String>,
}

impl VersionValidationResult {
    fn invalid(error: String) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
            major: None,
            minor: None,
            patch: None,
            prerelease: None,
        }
    }
}

/// Validator for publish-file versions
#[derive(Debug, Clone, Copy)]
pub struct VersionValidator;

impl Default for VersionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a version string
    ///
    /// # Arguments
    ///
    /// * `version_str` - Version string to validate (e.g., "1.2.3" or "1.2")
    ///
    /// # Examples
    ///
    /// ```
    /// use tao_publisher::validation::version_validator::VersionValidator;
    ///
    /// let validator = VersionValidator::new();
    ///
    /// assert!(validator.validate("1.2.3").is_valid);
    /// assert!(!validator.validate("v1").is_valid);
    /// ```
    pub fn validate(&self, version_str: &str) -> VersionValidationResult {
        let trimmed = version_str.trim();
        if trimmed.is_empty() {
            return VersionValidationResult::invalid("empty version".to_string());
        }

        let parsed = match Version::parse(trimmed) {
            Ok(version) => Ok(version),
            Err(e) => Self::parse_shorthand(trimmed).ok_or(e),
        };

        match parsed {
            Ok(version) => VersionValidationResult {
                is_valid: true,
                error: None,
                major: Some(version.major),
                minor: Some(version.minor),
                patch: Some(version.patch),
                prerelease: if version.pre.is_empty() {
                    None
                } else {
                    Some(version.pre.to_string())
                },
            },
            Err(e) => VersionValidationResult::invalid(e.to_string()),
        }
    }

    pub fn is_well_formed(&self, version_str: &str) -> bool {
        self.validate(version_str).is_valid
    }

    /// `MAJOR.MINOR` with plain numeric parts and no leading zeros
    fn parse_shorthand(version_str: &str) -> Option<Version> {
        let (major, minor) = version_str.split_once('.')?;
        Some(Version::new(
            Self::numeric_part(major)?,
            Self::numeric_part(minor)?,
            0,
        ))
    }

    fn numeric_part(part: &str) -> Option<u64> {
        let well_formed = !part.is_empty()
            && part.bytes().all(|b| b.is_ascii_digit())
            && (part == "0" || !part.starts_with('0'));
        if well_formed { part.parse().ok() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_version() {
        let validator = VersionValidator::new();
        let result = validator.validate("1.2.3");

        assert!(result.is_valid);
        assert_eq!(result.major, Some(1));
        assert_eq!(result.minor, Some(2));
        assert_eq!(result.patch, Some(3));
        assert!(result.prerelease.is_none());
    }

    #[test]
    fn test_validate_prerelease_version() {
        let validator = VersionValidator::new();
        let result = validator.validate("1.0.0-alpha.1+build.5");

        assert!(result.is_valid);
        assert_eq!(result.prerelease, Some("alpha.1".to_string()));
    }

    #[test]
    fn test_validate_shorthand() {
        let validator = VersionValidator::new();
        let result = validator.validate("0.9");

        assert!(result.is_valid);
        assert_eq!(result.major, Some(0));
        assert_eq!(result.minor, Some(9));
        assert_eq!(result.patch, Some(0));
    }

    #[test]
    fn test_validate_invalid_version() {
        let validator = VersionValidator::new();

        for literal in ["", "invalid", "1", "1.x", "01.2", "1.2.3.4", "v1.2"] {
            let result = validator.validate(literal);
            assert!(!result.is_valid, "{literal:?} should be rejected");
            assert!(result.error.is_some());
            assert!(result.major.is_none());
        }
    }

    #[test]
    fn test_is_well_formed() {
        let validator = VersionValidator::default();
        assert!(validator.is_well_formed("10.4.1"));
        assert!(!validator.is_well_formed("latest"));
    }
}
