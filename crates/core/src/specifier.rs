//! Hierarchical authorization specifiers (`"model.read"`, `"a.b.c"`).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Separator between specifier segments.
pub const SEPARATOR: char = '.';

/// A dot-separated path naming a protected capability or resource scope.
///
/// The empty specifier denotes the root of the namespace. Every other
/// specifier consists of one or more non-empty segments, so leading, trailing
/// and doubled dots are rejected at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Specifier(String);

impl ValueObject for Specifier {}

impl Specifier {
    /// The root specifier (empty path).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and validate a specifier string.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }

        if raw.starts_with(SEPARATOR) {
            return Err(DomainError::invalid_specifier(raw, "leading separator"));
        }
        if raw.ends_with(SEPARATOR) {
            return Err(DomainError::invalid_specifier(raw, "trailing separator"));
        }

        for segment in raw.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(DomainError::invalid_specifier(raw, "empty segment"));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(DomainError::invalid_specifier(
                    raw,
                    format!("segment '{segment}' contains whitespace"),
                ));
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Build a specifier from already separated segments.
    pub fn from_segments<I, S>(segments: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments from the top level down to the leaf. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|segment| !segment.is_empty())
    }

    /// Number of segments (0 for the root).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The ancestor made of the first `depth` segments.
    ///
    /// `prefix(0)` is the root; a depth beyond the specifier's own yields itself.
    pub fn prefix(&self, depth: usize) -> Self {
        let joined = self.segments().take(depth).collect::<Vec<_>>().join(".");
        Self(joined)
    }

    /// Append a single segment.
    pub fn child(&self, segment: &str) -> DomainResult<Self> {
        if segment.contains(SEPARATOR) {
            return Err(DomainError::invalid_specifier(
                segment,
                "child segment must not contain a separator",
            ));
        }
        if self.is_root() {
            Self::parse(segment)
        } else {
            Self::parse(&format!("{}{}{}", self.0, SEPARATOR, segment))
        }
    }

    /// Whether `other` equals this specifier or lies below it.
    pub fn covers(&self, other: &Specifier) -> bool {
        if self.is_root() {
            return true;
        }
        other.0 == self.0
            || (other.0.starts_with(&self.0)
                && other.0[self.0.len()..].starts_with(SEPARATOR))
    }
}

impl core::fmt::Display for Specifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for Specifier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Specifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Specifier {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Specifier> for String {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Specifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
