use std::fmt;
use uuid::Uuid;

/// Unique identifier of one client/server connection.
///
/// Both endpoints of a channel pair carry the same id. Servers key their
/// in-flight accept tasks by it, and it appears in every log line about the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the connection ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn display_is_hyphenated_uuid() {
        let id = ConnectionId::generate();
        assert_eq!(id.to_string().len(), 36);
    }
}
