//! validated capability tags forced onto nodes by an administrator.
//!
//! tags look like `tag:<name>` where the name is 1-50 lowercase
//! alphanumeric characters, hyphens or underscores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// maximum length for a tag name (after the "tag:" prefix).
pub const MAX_TAG_NAME_LEN: usize = 50;

const TAG_PREFIX: &str = "tag:";

/// a validated tag string.
///
/// # Example
/// ```
/// use hubscale_types::Tag;
///
/// let tag: Tag = "tag:server".parse().unwrap();
/// assert_eq!(tag.as_str(), "tag:server");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// create a new tag, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, TagError> {
        let s = s.into();
        let name = s.strip_prefix(TAG_PREFIX).ok_or(TagError::MissingPrefix)?;
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        if name.len() > MAX_TAG_NAME_LEN {
            return Err(TagError::NameTooLong(name.len()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(TagError::InvalidCharacters);
        }
        Ok(Self(s))
    }

    /// the full tag string, e.g. `tag:server`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tag::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// error type for tag validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// tag must start with "tag:".
    MissingPrefix,
    /// tag name cannot be empty.
    EmptyName,
    /// tag name exceeds maximum length.
    NameTooLong(usize),
    /// tag name contains invalid characters.
    InvalidCharacters,
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::MissingPrefix => write!(f, "tag must start with 'tag:'"),
            TagError::EmptyName => write!(f, "tag name cannot be empty"),
            TagError::NameTooLong(len) => write!(
                f,
                "tag name too long ({} chars, max {})",
                len, MAX_TAG_NAME_LEN
            ),
            TagError::InvalidCharacters => write!(
                f,
                "tag name must be lowercase alphanumeric with hyphens or underscores"
            ),
        }
    }
}

impl std::error::Error for TagError {}
