use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::snowflake::SnowflakeGenerator;

/// Well-known id prefixes.
pub mod prefix {
    pub const CONNECTION: &str = "conn";
}

/// Opaque identifier of one live transport connection.
///
/// Rendered on the wire as `conn_<snowflake>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next id from `generator`.
    pub fn generate(generator: &SnowflakeGenerator) -> Self {
        Self(generator.generate())
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", prefix::CONNECTION, self.0)
    }
}

/// Error returned when a string is not a `conn_<u64>` id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection id: {0}")]
pub struct InvalidConnectionId(pub String);

impl FromStr for ConnectionId {
    type Err = InvalidConnectionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(prefix::CONNECTION)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|raw| raw.parse().ok())
            .map(Self)
            .ok_or_else(|| InvalidConnectionId(s.to_string()))
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
