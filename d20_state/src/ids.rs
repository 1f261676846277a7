//! Entity identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of an entity. Stamped into save bundles and shown in
/// logs and context graphs; transient entities get one too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Fresh random identity for a newly created entity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Rebuild an identity read back from storage.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The all-zero identity, for fixtures and placeholder bundles.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }

    #[test]
    fn test_display_matches_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(EntityId::from_uuid(uuid).to_string(), uuid.to_string());
        assert_eq!(EntityId::nil().0, Uuid::nil());
    }
}
