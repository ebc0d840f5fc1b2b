//! Identifiers for sessions and connections
//!
//! A [`SessionId`] names a stream as chosen by its producer; a
//! [`ConnectionId`] names one transport connection for set membership.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Opaque name of a session (e.g. "room1")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Process-unique id of a transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_session_id_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(SessionId::from("room1"), 1);

        assert_eq!(map.get("room1"), Some(&1));
        assert_eq!(map.get("room2"), None);
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let ids = vec![SessionId::new("a"), SessionId::new("b")];
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionId::new("room1").to_string(), "room1");
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }
}
