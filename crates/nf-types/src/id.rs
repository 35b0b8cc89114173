use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::{Uuid, Variant};

use crate::error::TypeError;

/// Length of the canonical hyphenated UUID form.
const HYPHENATED_LEN: usize = 36;

/// Identifier of a node in the tree.
///
/// A `NodeId` is a UUID rendered in its canonical hyphenated form. Generated
/// ids are random (v4). The nil UUID is reserved for [`NodeId::ROOT`], the
/// conceptual root that is never persisted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    /// The root sentinel: `00000000-0000-0000-0000-000000000000`.
    pub const ROOT: NodeId = NodeId(Uuid::nil());

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its hyphenated string form.
    ///
    /// Accepts RFC 4122 UUIDs of versions 1 through 5 and the nil UUID.
    /// Braced, URN, and unhyphenated spellings are rejected.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != HYPHENATED_LEN {
            return Err(TypeError::InvalidId(s.to_string()));
        }
        let uuid = Uuid::try_parse(s).map_err(|_| TypeError::InvalidId(s.to_string()))?;
        if uuid.is_nil() {
            return Ok(Self(uuid));
        }
        let version_ok = matches!(uuid.get_version_num(), 1..=5);
        if !version_ok || uuid.get_variant() != Variant::RFC4122 {
            return Err(TypeError::InvalidId(s.to_string()));
        }
        Ok(Self(uuid))
    }

    /// Returns `true` for the root sentinel.
    pub fn is_root(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Wrap a UUID without checking its version. Use `generate()` or
    /// `parse()` for ids that will be persisted.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0.hyphenated())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.hyphenated())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
