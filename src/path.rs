//! URL path segmentation and extracted route parameters.

use std::fmt;

use smallvec::SmallVec;

/// Split a path into its non-empty segments.
///
/// Splitting happens on `/`; empty tokens are discarded, so leading,
/// trailing and duplicate slashes are normalized away. Deterministic,
/// with no failure mode.
pub(crate) fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// A single pattern segment, its kind inferred from the first character
/// of the token: `:name` matches exactly one path segment, `*name`
/// matches the remainder of the path, anything else matches by exact
/// text equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    /// Binds a single path segment to the contained name.
    Param(String),
    /// Binds the remainder of the path to the contained name.
    /// Only valid as the final segment of a pattern.
    CatchAll(String),
}

impl Segment {
    pub(crate) fn parse(token: &str) -> Self {
        if let Some(name) = token.strip_prefix(':') {
            Self::Param(name.to_owned())
        } else if let Some(name) = token.strip_prefix('*') {
            Self::CatchAll(name.to_owned())
        } else {
            Self::Literal(token.to_owned())
        }
    }

    pub(crate) fn is_wild(&self) -> bool {
        matches!(self, Self::Param(_) | Self::CatchAll(_))
    }

    pub(crate) fn is_catch_all(&self) -> bool {
        matches!(self, Self::CatchAll(_))
    }

    /// The token as written in the pattern, prefix included.
    pub(crate) fn token(&self) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Param(name) => format!(":{name}"),
            Self::CatchAll(name) => format!("*{name}"),
        }
    }
}

/// Parse a route pattern into its segments.
pub(crate) fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split(pattern).into_iter().map(Segment::parse).collect()
}

/// A single extracted route parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    name: String,
    value: String,
}

impl Param {
    pub(crate) fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name the parameter was bound under, without its `:`/`*` prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The request-path value bound to this parameter.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Parameters extracted from a matched request path.
///
/// Ordered by the left-to-right position of the wild segments in the
/// matched registered pattern, not by any map insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: SmallVec<[Param; 4]>,
}

impl Params {
    pub(crate) fn push(&mut self, param: Param) {
        self.entries.push(param);
    }

    /// Truncates the list, keeping allocated capacity for reuse.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// The value bound under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|param| param.name() == name)
            .map(Param::value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the parameters in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.entries.iter()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for param in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", param.name(), param.value())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_discards_empty_tokens() {
        assert_eq!(split("/hello/world"), vec!["hello", "world"]);
        assert_eq!(split("hello/world/"), vec!["hello", "world"]);
        assert_eq!(split("//hello///world//"), vec!["hello", "world"]);
        assert!(split("/").is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn test_segment_kinds() {
        assert_eq!(Segment::parse("users"), Segment::Literal("users".to_owned()));
        assert_eq!(Segment::parse(":id"), Segment::Param("id".to_owned()));
        assert_eq!(Segment::parse("*rest"), Segment::CatchAll("rest".to_owned()));
        assert!(Segment::parse(":id").is_wild());
        assert!(Segment::parse("*rest").is_wild());
        assert!(!Segment::parse("users").is_wild());
    }

    #[test]
    fn test_segment_token_round_trip() {
        for token in ["users", ":id", "*rest"] {
            assert_eq!(Segment::parse(token).token(), token);
        }
    }

    #[test]
    fn test_params_lookup() {
        let mut params = Params::default();
        params.push(Param::new("id", "42"));
        params.push(Param::new("rest", "a/b"));

        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("rest"), Some("a/b"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 2);
    }
}
