//! Errors raised while encoding, decoding or configuring state.

use thiserror::Error;

/// Failure in the state layer.
#[derive(Debug, Error)]
pub enum StateError {
    /// A save bundle was written by a different runtime version.
    ///
    /// Loading is aborted before any field is touched; there is no migration.
    #[error("save bundle version mismatch: runtime is {expected}, bundle is {found}")]
    VersionMismatch { expected: String, found: String },

    /// A blob could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blob carried a field its schema does not declare.
    #[error("unknown field `{field}` for stateful object `{object}`")]
    UnknownField { object: String, field: String },

    /// A bundle does not line up with the components attached to the entity.
    #[error("component mismatch: expected `{expected}`, bundle has `{found}`")]
    ComponentMismatch { expected: String, found: String },

    /// The dice collaborator could not produce a result.
    #[error("dice error: {0}")]
    Dice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_message() {
        let err = StateError::VersionMismatch {
            expected: "0.1.0".into(),
            found: "0.0.9".into(),
        };
        let message = err.to_string();
        assert!(message.contains("0.1.0"));
        assert!(message.contains("0.0.9"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: StateError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StateError::Serialization(_)));
    }
}
