//! Runtime errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`RuntimeError::MarshalNotFound`] | `RUNTIME_MARSHAL_NOT_FOUND` | Yes |
//! | [`RuntimeError::MarshalUsage`] | `RUNTIME_MARSHAL_USAGE` | Yes |
//! | [`RuntimeError::PermissionDenied`] | `RUNTIME_PERMISSION_DENIED` | Yes |
//! | [`RuntimeError::EmptyResult`] | `RUNTIME_EMPTY_RESULT` | Yes |
//! | [`RuntimeError::NoInteractionInterface`] | `RUNTIME_NO_INTERACTION_INTERFACE` | No |
//! | [`RuntimeError::SignatureMismatch`] | `RUNTIME_SIGNATURE_MISMATCH` | No |
//! | [`RuntimeError::StaleContext`] | `RUNTIME_STALE_CONTEXT` | No |
//! | [`RuntimeError::ChainTooDeep`] | `RUNTIME_CHAIN_TOO_DEEP` | No |
//! | [`RuntimeError::State`] | `RUNTIME_STATE` | No |
//! | [`RuntimeError::Callback`] | `RUNTIME_CALLBACK` | No |

use d20_state::StateError;
use thiserror::Error;

use crate::event::EventId;

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The head of a command chain matched no marshal.
    #[error("MarshalNotFound: {name}")]
    MarshalNotFound { name: String },

    /// A marshal rejected its arguments. The message is shown to the user as-is.
    #[error("{0}")]
    MarshalUsage(String),

    /// No context up to the root has an interaction delegate installed.
    #[error("no interaction interface installed on this context chain")]
    NoInteractionInterface,

    /// An event id was registered or queried with two different signatures.
    #[error("event `{event}` used with mismatched argument/return types")]
    SignatureMismatch { event: EventId },

    /// The context was disposed.
    #[error("context has been disposed")]
    StaleContext,

    /// Forwarded command chains nested past the configured limit.
    #[error("command chain nested too deeply ({depth} levels)")]
    ChainTooDeep { depth: usize },

    /// A checked action finished without a value.
    #[error("event `{event}` produced no value")]
    EmptyResult { event: EventId },

    /// Raised by the transport when `validate_admin` fails.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    State(#[from] StateError),

    /// Any other failure raised by a handler or marshal.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl RuntimeError {
    /// Build a usage error from a marshal.
    pub fn usage(message: impl Into<String>) -> Self {
        RuntimeError::MarshalUsage(message.into())
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MarshalNotFound { .. } => "RUNTIME_MARSHAL_NOT_FOUND",
            Self::MarshalUsage(_) => "RUNTIME_MARSHAL_USAGE",
            Self::NoInteractionInterface => "RUNTIME_NO_INTERACTION_INTERFACE",
            Self::SignatureMismatch { .. } => "RUNTIME_SIGNATURE_MISMATCH",
            Self::StaleContext => "RUNTIME_STALE_CONTEXT",
            Self::ChainTooDeep { .. } => "RUNTIME_CHAIN_TOO_DEEP",
            Self::EmptyResult { .. } => "RUNTIME_EMPTY_RESULT",
            Self::PermissionDenied(_) => "RUNTIME_PERMISSION_DENIED",
            Self::State(_) => "RUNTIME_STATE",
            Self::Callback(_) => "RUNTIME_CALLBACK",
        }
    }

    /// Whether an ordinary caller can carry on, e.g. by showing a message.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MarshalNotFound { .. }
                | Self::MarshalUsage(_)
                | Self::PermissionDenied(_)
                | Self::EmptyResult { .. }
        )
    }
}
