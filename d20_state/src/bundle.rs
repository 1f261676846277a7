//! Version-stamped save bundles.

use serde::{Deserialize, Serialize};

use crate::{EntityId, StateError, Value};

/// Version stamped into every bundle this runtime writes.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serialized state of a single component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentBlob {
    /// The component's registered name.
    pub name: String,
    pub data: Value,
}

/// Saved state of one entity: one blob per component, in attach order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBundle {
    pub version: String,
    pub entity: EntityId,
    pub components: Vec<ComponentBlob>,
}

impl SaveBundle {
    /// Create a bundle stamped with the current runtime version.
    pub fn new(entity: EntityId, components: Vec<ComponentBlob>) -> Self {
        Self {
            version: RUNTIME_VERSION.to_string(),
            entity,
            components,
        }
    }

    /// Fail unless the bundle was written by this runtime version.
    pub fn verify_version(&self) -> Result<(), StateError> {
        if self.version != RUNTIME_VERSION {
            return Err(StateError::VersionMismatch {
                expected: RUNTIME_VERSION.to_string(),
                found: self.version.clone(),
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(text)?)
    }
}
