//! Public path classification.
//!
//! # Prefix Matching
//!
//! A path is public when it starts with any configured prefix. A configured
//! `/api/novels` therefore exempts `/api/novels/123`, and also
//! `/api/novels-admin`. This mirrors the behaviour downstream services were
//! built against; review new prefixes with that over-broadening in mind.
//!
//! # Normalization
//!
//! Classification runs on [`normalize_path`] output, and the request is
//! rewritten to that same path before dispatch. Upstream URL handling resolves
//! `..` (also `%2e%2e`), so classifying the raw path would let
//! `/api/novels/../orders` pass as public and arrive upstream as `/api/orders`.

use std::borrow::Cow;

/// Ordered set of path prefixes exempt from authentication.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    prefixes: Vec<String>,
}

impl PublicPaths {
    /// Build the classifier. Empty prefixes are dropped, since an empty
    /// prefix would exempt every path.
    pub fn new(prefixes: Vec<String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// Whether `path` (already normalized, no query string) needs no token.
    pub fn is_public(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl<S: Into<String>> FromIterator<S> for PublicPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Resolve `.` and `..` segments, including their `%2e` spellings, the way
/// URL parsers do. Backslashes count as separators. `..` never climbs above
/// the root.
///
/// Returns the input unchanged (borrowed) when there is nothing to resolve.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if !path.starts_with('/') || !needs_normalizing(path) {
        return Cow::Borrowed(path);
    }

    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    let mut ends_in_directory = false;

    for segment in unified.split('/').skip(1) {
        ends_in_directory = true;
        match dot_segment(segment) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                segments.pop();
            }
            None => {
                segments.push(segment);
                ends_in_directory = false;
            }
        }
    }

    let mut normalized = String::with_capacity(unified.len());
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if ends_in_directory || segments.is_empty() {
        normalized.push('/');
    }
    Cow::Owned(normalized)
}

enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(segment: &str) -> Option<DotSegment> {
    let is = |s: &str| segment.eq_ignore_ascii_case(s);
    if is(".") || is("%2e") {
        Some(DotSegment::Current)
    } else if is("..") || is(".%2e") || is("%2e.") || is("%2e%2e") {
        Some(DotSegment::Parent)
    } else {
        None
    }
}

fn needs_normalizing(path: &str) -> bool {
    path.contains('\\') || path.split('/').any(|s| dot_segment(s).is_some())
}
