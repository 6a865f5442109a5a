//! Common types used across shadow-twin modules.

use serde::{Deserialize, Serialize};

/// Unique identifier of a twin (one predictor/voter in a committee).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwinId(pub String);

impl TwinId {
    /// Create a new twin ID.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TwinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a consensus round.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundId(pub String);

impl RoundId {
    /// Create a new round ID.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_id_generate_unique() {
        let id1 = RoundId::generate();
        let id2 = RoundId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_twin_id_display() {
        let id = TwinId::new("twin-7");
        assert_eq!(id.to_string(), "twin-7");
        assert_eq!(id.as_str(), "twin-7");
    }
}
