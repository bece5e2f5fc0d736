//! Core identifier types for fibermesh

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Name of an addressable entity living on some fiber
///
/// Entities are the application-level recipients of envelopes. Whether an
/// entity is local to a fiber decides routing: local entities are delivered
/// in-process, everything else goes out over the publish endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create an entity id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for a message
///
/// Uses ULID for time-ordered unique identifiers that sort lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Ulid);

impl MessageId {
    /// Create a new MessageId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// Unique identifier for a fiber instance
///
/// Assigned once by the base lifecycle and stamped on every outbound
/// envelope so peers can tell which fiber originated a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiberId(pub Ulid);

impl FiberId {
    /// Create a new random FiberId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for FiberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FiberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fiber_{}", self.0)
    }
}

/// A peer transport address
///
/// Kept as an opaque string so discovery functions can hand back whatever
/// their source produces. Both `host:port` and the `tcp://host:port`
/// spelling are accepted; [`PeerAddr::socket_addr`] strips the scheme
/// before the value reaches a socket call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr(pub String);

impl PeerAddr {
    /// Create a peer address from any string-like value
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get the raw address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address with any `tcp://` scheme stripped, ready for bind/connect
    pub fn socket_addr(&self) -> &str {
        self.0.strip_prefix("tcp://").unwrap_or(&self.0)
    }
}

impl std::fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerAddr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerAddr {
    fn from(s: String) -> Self {
        Self(s)
    }
}
