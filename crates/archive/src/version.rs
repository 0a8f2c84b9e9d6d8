//! # Symbolic Version Tokens
//!
//! A coordinate's version may be concrete (`1.2.0`), the symbolic token
//! `latest`, or a bracketed range such as `[1.2,2.0)` or `(,3.0]`. This module
//! parses those tokens into a [`VersionSpec`] that can be intersected with the
//! set of versions a remote index has published.
//!
//! Range endpoints use bracket/parenthesis notation for inclusive/exclusive
//! bounds and may be omitted for an unbounded side. Comparison uses semver's
//! total order: numeric segment-wise, with pre-release versions sorting below
//! their release. Endpoints with fewer than three numeric segments are padded
//! with zeros, so `[1.2,2.0)` means `[1.2.0,2.0.0)`.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use thiserror::Error;

//================================================================================================
// Types
//================================================================================================

/// An error that can occur when parsing a version token.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The token looks like a range but is not delimited correctly.
    #[error("`{0}` is not a valid version range")]
    InvalidRange(String),
    /// A version or range endpoint is not a valid version.
    #[error(transparent)]
    InvalidVersion(#[from] semver::Error),
}

/// One endpoint of a bounded range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// The endpoint version.
    pub version: Version,
    /// Whether the endpoint itself satisfies the range.
    pub inclusive: bool,
}

/// A bracketed version range with optional endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    /// The lower endpoint, unbounded when absent.
    pub lower: Option<Bound>,
    /// The upper endpoint, unbounded when absent.
    pub upper: Option<Bound>,
}

/// A parsed version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// The symbolic `latest` token, equivalent to the unbounded range `[,)`.
    Latest,
    /// A concrete version, satisfied only by itself.
    Exact(Version),
    /// A bounded range.
    Range(VersionRange),
}

//================================================================================================
// Impls
//================================================================================================

impl VersionSpec {
    /// Whether a token denotes a symbolic version that requires querying the
    /// index, without parsing it fully.
    pub fn is_symbolic(token: &str) -> bool {
        token == "latest" || token.starts_with('[') || token.starts_with('(')
    }

    /// Whether the given published version satisfies this token.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Latest => true,
            VersionSpec::Exact(v) => v == version,
            VersionSpec::Range(range) => range.contains(version),
        }
    }

    /// The highest of the given published versions satisfying this token, if
    /// any.
    pub fn highest_match<'a, I>(&self, published: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        published.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl VersionRange {
    fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            let ok = if lower.inclusive {
                *version >= lower.version
            } else {
                *version > lower.version
            };
            if !ok {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ok = if upper.inclusive {
                *version <= upper.version
            } else {
                *version < upper.version
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token == "latest" {
            return Ok(VersionSpec::Latest);
        }
        if !(token.starts_with('[') || token.starts_with('(')) {
            return Ok(VersionSpec::Exact(lenient_version(token)?));
        }

        let lower_inclusive = token.starts_with('[');
        let upper_inclusive = token.ends_with(']');
        if !(token.ends_with(']') || token.ends_with(')')) {
            return Err(VersionError::InvalidRange(token.into()));
        }

        let inner = &token[1..token.len() - 1];
        let (lo, hi) = inner
            .split_once(',')
            .ok_or_else(|| VersionError::InvalidRange(token.into()))?;

        let lower = match lo.trim() {
            "" => None,
            v => Some(Bound {
                version: lenient_version(v)?,
                inclusive: lower_inclusive,
            }),
        };
        let upper = match hi.trim() {
            "" => None,
            v => Some(Bound {
                version: lenient_version(v)?,
                inclusive: upper_inclusive,
            }),
        };

        Ok(VersionSpec::Range(VersionRange { lower, upper }))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str("latest"),
            VersionSpec::Exact(v) => write!(f, "{}", v),
            VersionSpec::Range(r) => {
                f.write_str(match &r.lower {
                    Some(b) if b.inclusive => "[",
                    _ => "(",
                })?;
                if let Some(b) = &r.lower {
                    write!(f, "{}", b.version)?;
                }
                f.write_str(",")?;
                if let Some(b) = &r.upper {
                    write!(f, "{}", b.version)?;
                }
                f.write_str(match &r.upper {
                    Some(b) if b.inclusive => "]",
                    _ => ")",
                })
            },
        }
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Parses a version that may omit minor or patch segments, padding with
/// zeros (`1.2` becomes `1.2.0`).
pub fn lenient_version(token: &str) -> Result<Version, VersionError> {
    match Version::parse(token) {
        Ok(v) => Ok(v),
        Err(e) => {
            // only pad plain numeric prefixes; anything with pre-release or
            // build metadata must already be complete
            let numeric = token.chars().all(|c| c.is_ascii_digit() || c == '.');
            if !numeric {
                return Err(e.into());
            }
            let segments = token.split('.').count();
            let padded = match segments {
                1 => format!("{token}.0.0"),
                2 => format!("{token}.0"),
                _ => return Err(e.into()),
            };
            Ok(Version::parse(&padded)?)
        },
    }
}

#[cfg(test)]
mod test;
