//! # Exclusion Filtering
//!
//! Glob-style patterns over the colon-delimited 4-tuple form
//! `group:artifact:extension:version` prune nodes out of the dependency graph
//! while it is being walked. A node matched by any pattern is excluded before
//! it contributes further edges, so none of its own dependencies appear in
//! the result either.
//!
//! Matching is segment-wise: both the pattern and the candidate are split on
//! colons, segment counts must agree, and `*` matches any run of characters
//! within one segment. `com.example:*:lib:*` therefore excludes every binary
//! dependency under `com.example` at any version.
//!
//! This filter concerns the dependency graph only; the independent
//! capability-surface excludes declared in a manifest are applied by the
//! [`surface`](crate::surface) module after resolution.

use crate::Coordinate;

//================================================================================================
// Types
//================================================================================================

/// An ordered list of exclusion patterns applied during graph collection.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<String>,
}

//================================================================================================
// Impls
//================================================================================================

impl ExclusionFilter {
    /// Creates a filter from the given patterns.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a filter extended with additional patterns (e.g. a manifest's
    /// own exclusions layered over the global configuration).
    pub fn merged(&self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut merged = self.clone();
        merged.patterns.extend(patterns.into_iter().map(Into::into));
        merged
    }

    /// The patterns the filter holds, in application order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether any pattern matches the coordinate's 4-tuple string form.
    pub fn excludes(&self, coordinate: &Coordinate) -> bool {
        let form = coordinate.to_string();
        self.patterns.iter().any(|p| tuple_match(p, &form))
    }

    /// Whether the filter holds no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Matches a colon-delimited glob pattern against a colon-delimited value,
/// segment by segment.
fn tuple_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<&str> = pattern.split(':').collect();
    let value: Vec<&str> = value.split(':').collect();
    pattern.len() == value.len()
        && pattern
            .iter()
            .zip(value.iter())
            .all(|(p, v)| segment_match(p, v))
}

/// Matches a single segment against a glob where `*` spans any run of
/// characters.
fn segment_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    // iterative wildcard matching with single-star backtracking
    let (mut pi, mut vi) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);
    while vi < v.len() {
        if pi < p.len() && (p[pi] == v[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = vi;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            vi = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::coordinate::Extension;

    #[test]
    fn wildcard_pattern() {
        let filter = ExclusionFilter::new(["*:*:lib:*"]);

        let lib = Coordinate::new("com.example", "blabla", "1.0.0", Extension::Binary);
        let arc = Coordinate::new("com.example", "blabla", "1.0.0", Extension::Archive);

        assert!(filter.excludes(&lib));
        assert!(!filter.excludes(&arc));
    }

    #[test]
    fn exact_and_partial_segments() -> anyhow::Result<()> {
        let filter = ExclusionFilter::new(["com.example:util-*:arc:1.*"]);

        assert!(filter.excludes(&Coordinate::from_str("com.example:util-core:arc:1.4.2")?));
        assert!(!filter.excludes(&Coordinate::from_str("com.example:util-core:arc:2.0.0")?));
        assert!(!filter.excludes(&Coordinate::from_str("com.example:core:arc:1.4.2")?));
        Ok(())
    }

    #[test]
    fn merged_layers_manifest_patterns() {
        let global = ExclusionFilter::new(["com.banned:*:arc:*"]);
        let layered = global.merged(["org.local:*:lib:*"]);

        let banned = Coordinate::new("com.banned", "x", "1.0.0", Extension::Archive);
        let local = Coordinate::new("org.local", "y", "1.0.0", Extension::Binary);

        assert!(layered.excludes(&banned));
        assert!(layered.excludes(&local));
        assert!(!global.excludes(&local));
    }
}
