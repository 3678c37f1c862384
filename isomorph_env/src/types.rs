//! Common types for the isomorph environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one validation call.
///
/// Identities and dedup state are scoped to a call; the id ties the
/// log lines of that call together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Creates a new random CallId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic CallId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_from_seed_is_deterministic() {
        assert_eq!(CallId::from_seed(7), CallId::from_seed(7));
        assert_ne!(CallId::from_seed(7), CallId::from_seed(8));
    }

    #[test]
    fn test_call_id_display_is_short() {
        assert_eq!(CallId::new().to_string().len(), 8);
    }
}
