//! key types for node identity.
//!
//! these types wrap the raw key bytes. the machine key identifies the
//! physical device, the node key identifies its current session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// machine key - identifies a physical device.
///
/// this key is stable across node key rotations and is the lookup key
/// for pending registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineKey(Vec<u8>);

impl MachineKey {
    /// create a new machine key from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// get the raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// returns a short string representation for logging.
    pub fn short_string(&self) -> String {
        short_string("mkey", &self.0)
    }
}

impl fmt::Display for MachineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mkey:{}", hex::encode(&self.0))
    }
}

impl FromStr for MachineKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed("mkey", s).map(Self)
    }
}

/// node key - identifies a node's current session.
///
/// rotates on re-authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey(Vec<u8>);

impl NodeKey {
    /// create a new node key from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// get the raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// returns a short string representation for logging.
    pub fn short_string(&self) -> String {
        short_string("nodekey", &self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nodekey:{}", hex::encode(&self.0))
    }
}

impl FromStr for NodeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed("nodekey", s).map(Self)
    }
}

fn short_string(prefix: &str, bytes: &[u8]) -> String {
    if bytes.len() >= 4 {
        format!("{prefix}:{:02x}{:02x}...", bytes[0], bytes[1])
    } else {
        format!("{prefix}:???")
    }
}

fn parse_prefixed(prefix: &str, s: &str) -> Result<Vec<u8>, Error> {
    let hex_part = s
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| Error::InvalidKey(format!("expected {prefix}: prefix")))?;
    hex::decode(hex_part).map_err(|e| Error::InvalidKey(e.to_string()))
}
