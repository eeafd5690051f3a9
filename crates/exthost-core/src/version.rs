//! Version requirement parsing and checking.
//!
//! A dependency's requirement string is read with two grammars, tried in
//! order:
//!
//! - **Ranges**: a bare version (`1.0`, meaning "at least 1.0.0"), interval
//!   notation (`[1.0]`, `[1.0,2.0)`, `(1.0,]`, `(,2.0]`) or comma-separated
//!   comparators (`>=1.2, <2.0`, `==1.2.3`, `!=1.3.0`, `≥1.0`).
//! - **Floating patterns**: `*`, `1.*`, `1.2.*`, `1.2.3-*`, `1.2.3-beta*`.
//!
//! Versions may omit minor and patch components (`3` and `3.12` read as
//! `3.0.0` and `3.12.0`).
//!
//! # Examples
//!
//! ```
//! use exthost_core::version::{VersionRequirement, check_requirement};
//!
//! let req = VersionRequirement::parse("[1.0,2.0)").unwrap();
//! assert!(req.matches_str("1.9.9"));
//! assert!(!req.matches_str("2.0.0"));
//!
//! let float = VersionRequirement::parse("1.*").unwrap();
//! assert!(float.is_floating());
//! assert!(float.matches_str("1.4.2"));
//!
//! assert!(check_requirement(">=1.0", "1.0").is_ok());
//! assert!(check_requirement(">=2.0", "1.0").is_err());
//! ```

use semver::Version;

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn new(op: CompareOp, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A bounded or half-open version range. All specifiers must match.
#[derive(Debug, Clone)]
pub struct VersionRange {
    specifiers: Vec<Specifier>,
    raw: String,
}

impl VersionRange {
    /// Parse a range requirement.
    pub fn parse(requirement: &str) -> Result<Self> {
        let raw = requirement.to_string();
        let trimmed = requirement.trim();
        if trimmed.is_empty() {
            return Err(invalid_requirement(requirement, "empty requirement"));
        }

        let specifiers = if trimmed.starts_with('[') || trimmed.starts_with('(') {
            parse_interval(trimmed)?
        } else if starts_with_operator(trimmed) {
            parse_comparators(trimmed)?
        } else {
            // A bare version is a floor, not an exact match.
            let version = parse_version(trimmed)
                .map_err(|_| invalid_requirement(requirement, "not a version"))?;
            vec![Specifier::new(CompareOp::Gte, version)]
        };

        Ok(Self { specifiers, raw })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// How far a floating pattern floats.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FloatBehavior {
    /// `*`
    Any,
    /// `1.*`
    Minor { major: u64 },
    /// `1.2.*`
    Patch { major: u64, minor: u64 },
    /// `1.2.3-*` or `1.2.3-beta*`
    Prerelease {
        major: u64,
        minor: u64,
        patch: u64,
        prefix: String,
    },
}

/// A floating (wildcard) version requirement.
///
/// Release-only patterns never match pre-release versions; the pre-release
/// form matches the release of the same version too.
#[derive(Debug, Clone)]
pub struct FloatRange {
    behavior: FloatBehavior,
    raw: String,
}

impl FloatRange {
    /// Parse a floating requirement.
    pub fn parse(requirement: &str) -> Result<Self> {
        let raw = requirement.to_string();
        let trimmed = requirement.trim();

        let behavior = if trimmed == "*" {
            FloatBehavior::Any
        } else if let Some(base) = trimmed.strip_suffix('*') {
            if let Some(fixed) = base.strip_suffix('.') {
                let parts = parse_numeric_parts(fixed)
                    .ok_or_else(|| invalid_requirement(requirement, "invalid floating prefix"))?;
                match parts.as_slice() {
                    [major] => FloatBehavior::Minor { major: *major },
                    [major, minor] => FloatBehavior::Patch {
                        major: *major,
                        minor: *minor,
                    },
                    _ => {
                        return Err(invalid_requirement(
                            requirement,
                            "floating pattern fixes too many components",
                        ));
                    }
                }
            } else if let Some((fixed, prefix)) = base.split_once('-') {
                let parts = parse_numeric_parts(fixed)
                    .ok_or_else(|| invalid_requirement(requirement, "invalid floating prefix"))?;
                let [major, minor, patch] = parts.as_slice() else {
                    return Err(invalid_requirement(
                        requirement,
                        "pre-release float needs major.minor.patch",
                    ));
                };
                if !prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
                {
                    return Err(invalid_requirement(requirement, "invalid pre-release prefix"));
                }
                FloatBehavior::Prerelease {
                    major: *major,
                    minor: *minor,
                    patch: *patch,
                    prefix: prefix.to_string(),
                }
            } else {
                return Err(invalid_requirement(requirement, "misplaced wildcard"));
            }
        } else {
            return Err(invalid_requirement(requirement, "no wildcard"));
        };

        Ok(Self { behavior, raw })
    }

    pub fn matches(&self, version: &Version) -> bool {
        match &self.behavior {
            FloatBehavior::Any => version.pre.is_empty(),
            FloatBehavior::Minor { major } => version.pre.is_empty() && version.major == *major,
            FloatBehavior::Patch { major, minor } => {
                version.pre.is_empty() && version.major == *major && version.minor == *minor
            }
            FloatBehavior::Prerelease {
                major,
                minor,
                patch,
                prefix,
            } => {
                (version.major, version.minor, version.patch) == (*major, *minor, *patch)
                    && (version.pre.is_empty() || version.pre.as_str().starts_with(prefix.as_str()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// A parsed dependency requirement.
#[derive(Debug, Clone)]
pub enum VersionRequirement {
    Range(VersionRange),
    Floating(FloatRange),
}

impl VersionRequirement {
    /// Parse as a range first, then as a floating pattern.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequirement` when neither grammar accepts the
    /// string.
    pub fn parse(requirement: &str) -> Result<Self> {
        if let Ok(range) = VersionRange::parse(requirement) {
            return Ok(Self::Range(range));
        }
        FloatRange::parse(requirement)
            .map(Self::Floating)
            .map_err(|_| {
                invalid_requirement(requirement, "neither a version range nor a floating version")
            })
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Range(range) => range.matches(version),
            Self::Floating(float) => float.matches(version),
        }
    }

    /// Check a version string. Unparseable versions never match.
    pub fn matches_str(&self, version: &str) -> bool {
        parse_version(version).is_ok_and(|v| self.matches(&v))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Self::Floating(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Range(range) => range.as_str(),
            Self::Floating(float) => float.as_str(),
        }
    }
}

impl std::fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a dependency edge does not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// The depended-on extension declares an unparseable version.
    #[error("loaded version '{version}' has an invalid format")]
    InvalidVersion { version: String },

    /// The requirement matches neither grammar.
    #[error("invalid dependency version format '{requirement}'")]
    InvalidRequirement { requirement: String },

    /// The requirement parsed but does not accept the loaded version.
    #[error("requires version '{requirement}'{}, but loaded version '{version}' is incompatible", floating_note(.floating))]
    Incompatible {
        requirement: String,
        version: String,
        floating: bool,
    },
}

/// Check `requirement` against a depended-on extension's declared `version`.
///
/// The version is parsed first; a malformed version fails the edge before
/// the requirement is looked at.
pub fn check_requirement(
    requirement: &str,
    version: &str,
) -> std::result::Result<(), ConstraintError> {
    let loaded = parse_version(version).map_err(|_| ConstraintError::InvalidVersion {
        version: version.to_string(),
    })?;

    let parsed =
        VersionRequirement::parse(requirement).map_err(|_| ConstraintError::InvalidRequirement {
            requirement: requirement.to_string(),
        })?;

    if parsed.matches(&loaded) {
        Ok(())
    } else {
        Err(ConstraintError::Incompatible {
            requirement: requirement.to_string(),
            version: version.to_string(),
            floating: parsed.is_floating(),
        })
    }
}

/// Parse a version, padding missing minor and patch components with `0`.
///
/// - `"3.12.1"` -> `3.12.1`
/// - `"3.12"` -> `3.12.0`
/// - `"3"` -> `3.0.0`
/// - `"1.0-beta"` -> `1.0.0-beta`
/// - `"1.2.3.0"` -> `1.2.3`
///
/// A fourth (revision) component is accepted only when it is `0`; semver
/// has nowhere to put any other value.
pub fn parse_version(s: &str) -> Result<Version> {
    let s = s.trim();

    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }

    let split_at = s.find(['-', '+']).unwrap_or(s.len());
    let (core, suffix) = s.split_at(split_at);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        4 => match core.rsplit_once('.') {
            Some((release, "0")) => format!("{release}{suffix}"),
            _ => {
                return Err(Error::InvalidVersion {
                    version: s.to_string(),
                    reason: "a revision component other than 0 is not supported".to_string(),
                });
            }
        },
        _ => s.to_string(),
    };

    Version::parse(&padded).map_err(|e| Error::InvalidVersion {
        version: s.to_string(),
        reason: e.to_string(),
    })
}

fn starts_with_operator(s: &str) -> bool {
    s.starts_with(['>', '<', '=', '!', '≥', '≤'])
}

/// Parse `[a,b)`-style interval notation.
fn parse_interval(s: &str) -> Result<Vec<Specifier>> {
    let min_inclusive = s.starts_with('[');
    let max_inclusive = s.ends_with(']');
    if !max_inclusive && !s.ends_with(')') {
        return Err(invalid_requirement(s, "unterminated interval"));
    }
    // Both delimiters are single-byte ASCII.
    let inner = &s[1..s.len() - 1];

    let Some((low, high)) = inner.split_once(',') else {
        if !(min_inclusive && max_inclusive) {
            return Err(invalid_requirement(s, "exact version must use [x]"));
        }
        let version = parse_version(inner).map_err(|_| invalid_requirement(s, "not a version"))?;
        return Ok(vec![Specifier::new(CompareOp::Eq, version)]);
    };

    let (low, high) = (low.trim(), high.trim());
    if low.is_empty() && high.is_empty() {
        return Err(invalid_requirement(s, "interval has no bounds"));
    }

    let mut specifiers = Vec::with_capacity(2);
    let mut floor = None;
    if !low.is_empty() {
        let version =
            parse_version(low).map_err(|_| invalid_requirement(s, "invalid lower bound"))?;
        let op = if min_inclusive { CompareOp::Gte } else { CompareOp::Gt };
        floor = Some(version.clone());
        specifiers.push(Specifier::new(op, version));
    }
    if !high.is_empty() {
        let version =
            parse_version(high).map_err(|_| invalid_requirement(s, "invalid upper bound"))?;
        if floor.as_ref().is_some_and(|floor| *floor > version) {
            return Err(invalid_requirement(s, "lower bound exceeds upper bound"));
        }
        let op = if max_inclusive { CompareOp::Lte } else { CompareOp::Lt };
        specifiers.push(Specifier::new(op, version));
    }

    Ok(specifiers)
}

/// Parse comma-separated comparators such as `>=1.0, <2.0`.
fn parse_comparators(s: &str) -> Result<Vec<Specifier>> {
    let mut specifiers = Vec::new();
    for part in s.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        specifiers.push(parse_specifier(part)?);
    }

    if specifiers.is_empty() {
        return Err(invalid_requirement(s, "empty requirement"));
    }
    Ok(specifiers)
}

/// Parse a single specifier like `>=3.12` or `<3.13.0`.
fn parse_specifier(s: &str) -> Result<Specifier> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=").or(s.strip_prefix('≥')) {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=").or(s.strip_prefix('≤')) {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==").or(s.strip_prefix('=')) {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        return Err(invalid_requirement(s, "missing comparison operator"));
    };

    let version_str = version_str.trim();
    let version = parse_version(version_str)
        .map_err(|_| invalid_requirement(s, &format!("invalid version: {version_str}")))?;

    Ok(Specifier::new(op, version))
}

fn floating_note(floating: &bool) -> &'static str {
    if *floating { " (floating)" } else { "" }
}

fn parse_numeric_parts(s: &str) -> Option<Vec<u64>> {
    s.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

fn invalid_requirement(requirement: &str, reason: &str) -> Error {
    Error::InvalidRequirement {
        requirement: requirement.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // --- parse_version ---

    #[rstest]
    #[case("3.12.1", Version::new(3, 12, 1))]
    #[case("3.12", Version::new(3, 12, 0))]
    #[case("3", Version::new(3, 0, 0))]
    #[case("  1.0.0  ", Version::new(1, 0, 0))]
    #[case("1.0.0.0", Version::new(1, 0, 0))]
    #[case("2.4.1.0", Version::new(2, 4, 1))]
    fn test_parse_version_pads(#[case] input: &str, #[case] expected: Version) {
        assert_eq!(parse_version(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_version_keeps_prerelease() {
        let v = parse_version("1.0-beta.2").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 0, 0));
        assert_eq!(v.pre.as_str(), "beta.2");
    }

    #[rstest]
    #[case("")]
    #[case("not-a-version")]
    #[case("1.2.3.4.5")]
    #[case("1.2.3.4")]
    #[case("1.*")]
    fn test_parse_version_rejects(#[case] input: &str) {
        assert!(matches!(
            parse_version(input),
            Err(Error::InvalidVersion { .. })
        ));
    }

    // --- ranges ---

    #[rstest]
    #[case("1.0", "1.0.0", true)]
    #[case("1.0", "7.3.1", true)]
    #[case("1.0", "0.9.9", false)]
    #[case("[1.0,2.0)", "1.4.0.0", true)]
    #[case("[1.0]", "1.0.0", true)]
    #[case("[1.0]", "1.0.1", false)]
    #[case("[1.0,2.0)", "1.5.0", true)]
    #[case("[1.0,2.0)", "2.0.0", false)]
    #[case("[1.0,2.0]", "2.0.0", true)]
    #[case("(1.0,2.0)", "1.0.0", false)]
    #[case("(1.0,)", "1.0.1", true)]
    #[case("[1.0,)", "1.0.0", true)]
    #[case("(,2.0]", "0.1.0", true)]
    #[case("(,2.0)", "2.0.0", false)]
    #[case(">=1.0", "1.0.0", true)]
    #[case("≥1.0", "1.0.0", true)]
    #[case(">=2.0", "1.0.0", false)]
    #[case(">=3.10,<3.13", "3.12.5", true)]
    #[case(">=3.10, <3.13", "3.13.0", false)]
    #[case("==3.12.0", "3.12.1", false)]
    #[case("=3.12.0", "3.12.0", true)]
    #[case("!=3.11.0", "3.11.0", false)]
    #[case("<=1.2", "1.2.0", true)]
    #[case("≤1.2", "1.2.1", false)]
    fn test_range_matches(#[case] requirement: &str, #[case] version: &str, #[case] expected: bool) {
        let range = VersionRange::parse(requirement).unwrap();
        assert_eq!(
            range.matches(&parse_version(version).unwrap()),
            expected,
            "{requirement} vs {version}"
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("[1.0,2.0")]
    #[case("(1.0)")]
    #[case("[,]")]
    #[case("[2.0,1.0]")]
    #[case(">=abc")]
    #[case(">=1.0, 2.0")]
    #[case("1.*")]
    fn test_range_rejects(#[case] requirement: &str) {
        assert!(matches!(
            VersionRange::parse(requirement),
            Err(Error::InvalidRequirement { .. })
        ));
    }

    // --- floating ---

    #[rstest]
    #[case("*", "0.0.1", true)]
    #[case("*", "1.0.0-alpha", false)]
    #[case("1.*", "1.9.3", true)]
    #[case("1.*", "2.0.0", false)]
    #[case("1.*", "1.2.0-rc.1", false)]
    #[case("1.2.*", "1.2.7", true)]
    #[case("1.2.*", "1.3.0", false)]
    #[case("1.2.3-*", "1.2.3-anything", true)]
    #[case("1.2.3-*", "1.2.3", true)]
    #[case("1.2.3-*", "1.2.4-alpha", false)]
    #[case("1.2.3-beta*", "1.2.3-beta.4", true)]
    #[case("1.2.3-beta*", "1.2.3-alpha", false)]
    fn test_float_matches(#[case] requirement: &str, #[case] version: &str, #[case] expected: bool) {
        let float = FloatRange::parse(requirement).unwrap();
        assert_eq!(
            float.matches(&parse_version(version).unwrap()),
            expected,
            "{requirement} vs {version}"
        );
    }

    #[rstest]
    #[case("1.2.3.*")]
    #[case("*.1")]
    #[case("1.x")]
    #[case("1.2-*")]
    #[case("a.*")]
    #[case("")]
    fn test_float_rejects(#[case] requirement: &str) {
        assert!(FloatRange::parse(requirement).is_err());
    }

    // --- VersionRequirement ---

    #[test]
    fn test_requirement_prefers_range_grammar() {
        let req = VersionRequirement::parse("1.0").unwrap();
        assert!(!req.is_floating());
        assert_eq!(req.to_string(), "1.0");
    }

    #[test]
    fn test_requirement_falls_back_to_floating() {
        let req = VersionRequirement::parse("2.*").unwrap();
        assert!(req.is_floating());
        assert!(req.matches_str("2.5"));
        assert!(!req.matches_str("garbage"));
    }

    #[test]
    fn test_requirement_rejects_both_grammars() {
        assert!(matches!(
            VersionRequirement::parse("latest"),
            Err(Error::InvalidRequirement { .. })
        ));
    }

    // --- check_requirement ---

    #[test]
    fn test_check_satisfied() {
        assert_eq!(check_requirement(">=1.0", "1.0"), Ok(()));
        assert_eq!(check_requirement("1.*", "1.4.0"), Ok(()));
    }

    #[test]
    fn test_check_invalid_loaded_version_checked_first() {
        assert_eq!(
            check_requirement("garbage", "v-one"),
            Err(ConstraintError::InvalidVersion {
                version: "v-one".to_string()
            })
        );
    }

    #[test]
    fn test_check_invalid_requirement() {
        assert_eq!(
            check_requirement("latest", "1.0.0"),
            Err(ConstraintError::InvalidRequirement {
                requirement: "latest".to_string()
            })
        );
    }

    #[test]
    fn test_check_incompatible_reports_floating() {
        let err = check_requirement("2.*", "1.0.0").unwrap_err();
        assert_eq!(
            err,
            ConstraintError::Incompatible {
                requirement: "2.*".to_string(),
                version: "1.0.0".to_string(),
                floating: true,
            }
        );
        assert_eq!(
            err.to_string(),
            "requires version '2.*' (floating), but loaded version '1.0.0' is incompatible"
        );
    }
}
