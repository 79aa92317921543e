//! Room keys and location scopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Well-known room kinds. The set is open; clients may join any kind.
pub mod kind {
    pub const POSTS: &str = "posts";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const CITY: &str = "city";
    pub const NEIGHBORHOOD: &str = "neighborhood";
}

/// Scope used for rooms that are not tied to a place.
pub const GLOBAL_SCOPE: &str = "global";

/// Structured room identifier.
///
/// Two keys are equal iff both `kind` and `scope` are byte-equal. No case or
/// whitespace normalization happens, and because the components are kept
/// apart a `:` or `/` inside a scope can never make two keys collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomKey {
    pub kind: String,
    pub scope: String,
}

impl RoomKey {
    pub fn new(kind: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            scope: scope.into(),
        }
    }

    /// The `posts` room for a location.
    pub fn posts(location: &Location) -> Self {
        Self::new(kind::POSTS, location.scope())
    }

    /// The single process-wide notifications room.
    pub fn notifications() -> Self {
        Self::new(kind::NOTIFICATIONS, GLOBAL_SCOPE)
    }
}

/// Diagnostic form `kind:scope`. Not used for lookups.
impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.scope)
    }
}

/// A location as sent by clients: either a ready-made scope string or a
/// `{city, neighborhood, ...}` object.
///
/// The JSON is kept exactly as received and serializes back unchanged, so
/// relayed payloads carry every field the client put in the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Location {
    raw: Value,
    scope: String,
}

#[derive(Debug, thiserror::Error)]
#[error("location must be a string or an object with a string `city`")]
pub struct InvalidLocation;

impl Location {
    pub fn place(city: impl Into<String>, neighborhood: impl Into<String>) -> Self {
        let (city, neighborhood) = (city.into(), neighborhood.into());
        let scope = place_scope(&city, Some(neighborhood.as_str()));
        Self {
            raw: json!({ "city": city, "neighborhood": neighborhood }),
            scope,
        }
    }

    /// The scope string rooms are keyed by: `city/neighborhood`, or `city`
    /// when the neighborhood is missing, empty or not a string.
    pub fn scope(&self) -> String {
        self.scope.clone()
    }

    /// The location JSON as the client sent it.
    pub fn as_value(&self) -> &Value {
        &self.raw
    }
}

fn place_scope(city: &str, neighborhood: Option<&str>) -> String {
    match neighborhood {
        Some(n) if !n.is_empty() => format!("{city}/{n}"),
        _ => city.to_string(),
    }
}

impl TryFrom<Value> for Location {
    type Error = InvalidLocation;

    fn try_from(raw: Value) -> Result<Self, InvalidLocation> {
        let scope = match &raw {
            Value::String(scope) => scope.clone(),
            Value::Object(fields) => {
                let city = fields.get("city").and_then(Value::as_str).ok_or(InvalidLocation)?;
                place_scope(city, fields.get("neighborhood").and_then(Value::as_str))
            }
            _ => return Err(InvalidLocation),
        };
        Ok(Self { raw, scope })
    }
}

impl From<Location> for Value {
    fn from(location: Location) -> Self {
        location.raw
    }
}

impl From<&str> for Location {
    fn from(scope: &str) -> Self {
        Self {
            raw: Value::String(scope.to_string()),
            scope: scope.to_string(),
        }
    }
}
