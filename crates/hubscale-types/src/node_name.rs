//! validated node name type used for a node's given name.
//!
//! node names must:
//! - be 1-63 characters long (dns label compatible)
//! - contain only lowercase alphanumeric characters and hyphens
//! - not start or end with a hyphen

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dns_label::{self, DnsLabelError};

/// maximum length for a node name (dns label compatible).
pub const MAX_NODE_NAME_LEN: usize = 63;

/// a validated node name string.
///
/// # Example
/// ```
/// use hubscale_types::NodeName;
///
/// let name: NodeName = "my-server".parse().unwrap();
/// assert_eq!(name.as_str(), "my-server");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeName(String);

impl NodeName {
    /// create a new node name, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, NodeNameError> {
        let s = s.into();
        dns_label::validate(&s, MAX_NODE_NAME_LEN)?;
        Ok(Self(s))
    }

    /// sanitise an arbitrary string (usually a device hostname) into a valid node name.
    ///
    /// returns `None` if nothing usable is left.
    pub fn sanitise(s: &str) -> Option<Self> {
        dns_label::sanitise(s, MAX_NODE_NAME_LEN).map(Self)
    }

    /// append `-{suffix}` to this name, trimming the base so that the result
    /// stays within the label limit with `trim` characters to spare.
    pub fn with_suffix(&self, suffix: &str, trim: usize) -> Result<Self, NodeNameError> {
        let budget = MAX_NODE_NAME_LEN.saturating_sub(suffix.len() + trim);
        let mut base: &str = &self.0;
        if base.len() > budget {
            // names are ascii, so any byte index is a char boundary
            base = &base[..budget];
        }
        let base = base.trim_end_matches('-');
        if base.is_empty() {
            return Self::new(suffix);
        }
        Self::new(format!("{base}-{suffix}"))
    }

    /// get the node name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the node name and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for NodeName {
    /// the name used when a hostname sanitises to nothing.
    fn default() -> Self {
        Self("node".to_string())
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeName {
    type Err = NodeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// serde: deserialize with validation
impl<'de> Deserialize<'de> for NodeName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NodeName::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for NodeName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// error type for node name validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeNameError {
    /// node name cannot be empty.
    Empty,
    /// node name exceeds maximum length.
    TooLong(usize),
    /// node name contains invalid characters.
    InvalidCharacters,
    /// node name starts or ends with a hyphen.
    InvalidHyphenPosition,
}

impl From<DnsLabelError> for NodeNameError {
    fn from(e: DnsLabelError) -> Self {
        match e {
            DnsLabelError::Empty => Self::Empty,
            DnsLabelError::TooLong(len) => Self::TooLong(len),
            DnsLabelError::InvalidCharacters => Self::InvalidCharacters,
            DnsLabelError::InvalidHyphenPosition => Self::InvalidHyphenPosition,
        }
    }
}

impl fmt::Display for NodeNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeNameError::Empty => write!(f, "node name cannot be empty"),
            NodeNameError::TooLong(len) => {
                write!(
                    f,
                    "node name too long ({} chars, max {})",
                    len, MAX_NODE_NAME_LEN
                )
            }
            NodeNameError::InvalidCharacters => {
                write!(
                    f,
                    "node name must contain only lowercase letters, digits, and hyphens"
                )
            }
            NodeNameError::InvalidHyphenPosition => {
                write!(f, "node name cannot start or end with a hyphen")
            }
        }
    }
}

impl std::error::Error for NodeNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_node_names() {
        assert!(NodeName::new("mynode").is_ok());
        assert!(NodeName::new("my-node").is_ok());
        assert!(NodeName::new("123").is_ok());
    }

    #[test]
    fn test_invalid_node_names() {
        assert_eq!(NodeName::new("").unwrap_err(), NodeNameError::Empty);
        assert_eq!(
            NodeName::new("My_Node").unwrap_err(),
            NodeNameError::InvalidCharacters
        );
        assert_eq!(
            NodeName::new("-node").unwrap_err(),
            NodeNameError::InvalidHyphenPosition
        );
        assert!(matches!(
            NodeName::new("a".repeat(MAX_NODE_NAME_LEN + 1)).unwrap_err(),
            NodeNameError::TooLong(_)
        ));
    }

    #[test]
    fn test_sanitise() {
        assert_eq!(NodeName::sanitise("MyNode").unwrap(), "mynode");
        assert_eq!(NodeName::sanitise("my.node.local").unwrap(), "my-node-local");
        assert!(NodeName::sanitise("...").is_none());
    }

    #[test]
    fn test_with_suffix_short_base() {
        let name = NodeName::new("laptop").unwrap();
        let suffixed = name.with_suffix("abcd1234", 2).unwrap();
        assert_eq!(suffixed, "laptop-abcd1234");
    }

    #[test]
    fn test_with_suffix_trims_long_base() {
        let name = NodeName::new("a".repeat(MAX_NODE_NAME_LEN)).unwrap();
        let suffixed = name.with_suffix("abcd1234", 2).unwrap();
        // 63 - 8 - 2 = 53 base chars, one hyphen, eight suffix chars
        assert_eq!(suffixed.as_str().len(), 62);
        assert!(suffixed.as_str().starts_with(&"a".repeat(53)));
        assert!(suffixed.as_str().ends_with("-abcd1234"));
    }

    #[test]
    fn test_with_suffix_drops_dangling_hyphen() {
        let base = format!("{}-{}", "a".repeat(52), "b".repeat(10));
        let name = NodeName::new(base).unwrap();
        let suffixed = name.with_suffix("abcd1234", 2).unwrap();
        assert!(!suffixed.as_str().contains("--"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let name = NodeName::new("mynode").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"mynode\"");
        assert!(serde_json::from_str::<NodeName>("\"MyNode\"").is_err());
    }
}
