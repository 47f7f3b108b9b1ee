//! Signaling Relay error types.
//!
//! The taxonomy is deliberately small: the relay is best-effort, so most
//! failure modes (unknown relay target, send to a vanished connection) are
//! swallowed at the transport layer rather than surfaced as errors. A
//! room-not-found on join is a protocol event, not an error.

use thiserror::Error;

/// Signaling Relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A frame that could not be decoded into a known event.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Internal error (actor channel failures and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RelayError::MalformedEvent("missing target".to_string())),
            "Malformed event: missing target"
        );
        assert_eq!(
            format!("{}", RelayError::Internal("channel closed".to_string())),
            "Internal error: channel closed"
        );
    }
}
