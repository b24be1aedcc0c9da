//! Error types for the idle engine.
//!
//! Nothing here is fatal to the host: the per-tick path logs and skips, and the
//! authoring/loader APIs hand these back so editors can surface them.

use crate::ids::StateId;

/// Error type for authoring, pathfinding and persistence operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum IdleError {
    /// A name or handle did not resolve to a live animation/layer/state/channel.
    #[error("{kind} not found: {name}")]
    LookupMiss { kind: &'static str, name: String },

    /// All candidate transitions are weightless or avoided.
    #[error("no valid transition out of state {state:?}")]
    NoValidTransition { state: StateId },

    /// The requested edge cannot exist in the graph.
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },

    /// Split point outside the open interval (0, 1).
    #[error("cannot split a transition at {at}")]
    InvalidSplit { at: f32 },

    /// Persisted document is structurally unusable.
    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },

    /// Persisted document was written by a newer format revision.
    #[error("unsupported document version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl IdleError {
    pub fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        Self::LookupMiss {
            kind,
            name: name.into(),
        }
    }

    /// Recoverable errors resolve to "keep prior state and retry next tick".
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LookupMiss { .. } | Self::NoValidTransition { .. }
        )
    }

    /// Error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::LookupMiss { .. } => "lookup",
            Self::NoValidTransition { .. } => "selection",
            Self::InvalidTransition { .. } | Self::InvalidSplit { .. } => "authoring",
            Self::MalformedDocument { .. } | Self::UnsupportedVersion { .. } => "document",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for IdleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_miss_is_recoverable() {
        let err = IdleError::lookup("state", "Wave");
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "lookup");
        assert_eq!(err.to_string(), "state not found: Wave");
    }

    #[test]
    fn document_errors_are_not_recoverable() {
        let err = IdleError::UnsupportedVersion { version: 9 };
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "document");
    }

    #[test]
    fn json_errors_convert() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: IdleError = parse.unwrap_err().into();
        assert!(matches!(err, IdleError::Serialization { .. }));
    }
}
