//! Identifiers shared by hosts, sessions and engines.
//!
//! All ids are cheap to clone and compare. `HostId` and `MediaId` are
//! caller-chosen strings (a screen name, a content key); `EngineId` is
//! minted by the coordinator for every engine it constructs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a host view (detail screen, feed cell, overlay).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostId(String);

impl HostId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Unique id for hosts that have no natural name (recycled feed cells).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Stable identifier of a content item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of one constructed engine instance.
///
/// Monotonic per coordinator, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineId(pub u64);

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// What a host asks to play: the content id plus the resource to prepare.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub url: String,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: MediaId::new(id),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_host_ids_differ() {
        assert_ne!(HostId::generate(), HostId::generate());
    }

    #[test]
    fn test_display() {
        assert_eq!(HostId::new("detail").to_string(), "detail");
        assert_eq!(EngineId(7).to_string(), "engine#7");
        assert_eq!(MediaItem::new("a", "sim://a").id, MediaId::from("a"));
    }
}
