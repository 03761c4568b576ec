//! Resource URIs: `res://<kind>/<path>`.
//!
//! `path` is `/`-separated; a trailing `*` wildcards any suffix. Empty path,
//! `*`, and `.` all mean "all resources of this kind" (§3).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of resource kinds a URI may name, plus `*` (any kind),
/// handled separately in [`ResourceUri::matches`].
pub const KNOWN_RESOURCE_KINDS: &[&str] = &[
    "catalogs", "variants", "namespaces", "views", "resources", "skillsets",
];

/// Errors parsing a [`ResourceUri`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceUriError {
    /// Missing the `res://` scheme.
    #[error("resource uri must start with res://: {0}")]
    MissingScheme(String),

    /// `res://` with nothing after it.
    #[error("resource uri must name a kind: {0}")]
    EmptyKind(String),

    /// A kind outside [`KNOWN_RESOURCE_KINDS`] (and not `*`).
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
}

const SCHEME: &str = "res://";

/// A parsed `res://<kind>/<path>` URI.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceUri {
    raw: String,
    kind: String,
    /// Path segments, with the trailing `*` (if present) stripped.
    segments: Vec<String>,
    wildcard_suffix: bool,
}

impl ResourceUri {
    /// Parse and validate a resource URI string.
    ///
    /// # Errors
    ///
    /// See [`ResourceUriError`].
    pub fn parse(raw: impl Into<String>) -> Result<Self, ResourceUriError> {
        let raw = raw.into();
        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or_else(|| ResourceUriError::MissingScheme(raw.clone()))?;

        let (kind, path) = match rest.split_once('/') {
            Some((k, p)) => (k, p),
            None => (rest, ""),
        };

        if kind.is_empty() {
            return Err(ResourceUriError::EmptyKind(raw.clone()));
        }
        if kind != "*" && !KNOWN_RESOURCE_KINDS.contains(&kind) {
            return Err(ResourceUriError::UnknownKind(kind.to_string()));
        }

        // Empty path, `*`, and `.` all mean "all resources of this kind".
        if path.is_empty() || path == "*" || path == "." {
            return Ok(Self {
                raw,
                kind: kind.to_string(),
                segments: Vec::new(),
                wildcard_suffix: true,
            });
        }

        let (path, wildcard_suffix) = match path.strip_suffix('*') {
            Some(stripped) => (stripped.trim_end_matches('/'), true),
            None => (path, false),
        };

        let segments = path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();

        Ok(Self {
            raw,
            kind: kind.to_string(),
            segments,
            wildcard_suffix,
        })
    }

    /// The raw URI string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The resource kind (`*` for "any kind").
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether `self` (as a *rule target pattern*) matches a concrete
    /// `target` URI (§4.3, §8 invariant 8).
    ///
    /// Matching rules:
    /// - `res://*` (kind `*`) matches any kind.
    /// - Exact equality of kind and segments, when `self` has no wildcard.
    /// - When `self` ends in `*`, `target` matches if it has the same kind
    ///   and its segments extend `self`'s segments (segment-wise prefix,
    ///   not byte-wise — `res://<kind>/a/b/*` does not match
    ///   `res://<kind>/a/bc`).
    #[must_use]
    pub fn matches(&self, target: &ResourceUri) -> bool {
        if self.kind != "*" && self.kind != target.kind {
            return false;
        }
        if self.wildcard_suffix {
            target.segments.len() >= self.segments.len()
                && target.segments[..self.segments.len()] == self.segments[..]
        } else {
            self.segments == target.segments
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl fmt::Debug for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceUri({})", self.raw)
    }
}

impl TryFrom<String> for ResourceUri {
    type Error = ResourceUriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResourceUri> for String {
    fn from(uri: ResourceUri) -> Self {
        uri.raw
    }
}

impl std::str::FromStr for ResourceUri {
    type Err = ResourceUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
