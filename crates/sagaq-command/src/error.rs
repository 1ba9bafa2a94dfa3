//! Error types for the command model
//!
//! Covers the three failure surfaces:
//! - External operation failures during execute/undo
//! - Malformed serialized payloads
//! - Unregistered command kinds

/// Failure of an external operation during `execute` or `undo`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Backing service unreachable or transport-level failure
    #[error("provisioning backend unavailable: {0}")]
    Unavailable(String),

    /// Backing service refused the operation
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// Call exceeded its deadline
    #[error("operation timed out after {limit_ms}ms")]
    Timeout {
        /// The deadline that expired, in milliseconds
        limit_ms: u64,
    },

    /// Failure injected by a fault hook
    #[error("injected fault: {0}")]
    FaultInjected(String),
}

impl ExecutionError {
    /// Check if a retry could plausibly succeed
    ///
    /// `Rejected` is a permanent verdict from the backend; everything else
    /// is transient.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Serialized payload does not decode into its declared kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedCommandError {
    /// Required field absent from the envelope
    #[error("command kind `{kind}` is missing required field `{field}`")]
    MissingField {
        /// Kind tag of the envelope
        kind: String,
        /// Name of the absent field
        field: &'static str,
    },

    /// Field present but with the wrong shape
    #[error("field `{field}` of command kind `{kind}` must be {expected}")]
    InvalidField {
        /// Kind tag of the envelope
        kind: String,
        /// Name of the offending field
        field: &'static str,
        /// Expected shape, e.g. "a string"
        expected: &'static str,
    },
}

/// Kind tag with no registered constructor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command kind `{kind}`")]
pub struct UnknownKindError {
    /// The unrecognized tag
    pub kind: String,
}

/// Reconstruction failure when turning an envelope back into a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No constructor registered for the envelope's kind
    #[error(transparent)]
    UnknownKind(#[from] UnknownKindError),

    /// Constructor found, but the fields do not decode
    #[error(transparent)]
    Malformed(#[from] MalformedCommandError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_display() {
        let err = ExecutionError::Unavailable("connection refused".to_string());
        assert!(err.to_string().contains("unavailable"));

        let err = ExecutionError::Timeout { limit_ms: 30_000 };
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn execution_error_is_retryable() {
        assert!(ExecutionError::Unavailable("down".to_string()).is_retryable());
        assert!(ExecutionError::Timeout { limit_ms: 100 }.is_retryable());
        assert!(ExecutionError::FaultInjected("chaos".to_string()).is_retryable());
        assert!(!ExecutionError::Rejected("quota exceeded".to_string()).is_retryable());
    }

    #[test]
    fn malformed_error_names_the_field() {
        let err = MalformedCommandError::MissingField {
            kind: "create_customer".to_string(),
            field: "customer_id",
        };
        let text = err.to_string();
        assert!(text.contains("create_customer"));
        assert!(text.contains("customer_id"));
    }

    #[test]
    fn decode_error_is_transparent() {
        let err: DecodeError = UnknownKindError {
            kind: "unknown_type".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown command kind `unknown_type`");
    }
}
