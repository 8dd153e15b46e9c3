//! Error types for the storage bridge
//!
//! Every failure a resource operation can produce is one variant of [`Error`].
//! Errors are returned to the caller exactly as produced: nothing in the core
//! retries, suppresses, or rewrites them.

use thiserror::Error;

/// Unified error type for the bridge
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Malformed input, or an engine call that reported "false"/no effect
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unable to find key {0}")]
    NotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// The engine could not be reached or the stream could not be framed
    #[error("Engine transport error: {0}")]
    Transport(String),

    /// A response arrived for a different correlation id
    #[error("Engine protocol error: sent request id {expected}, received response id {received}")]
    Protocol { expected: u64, received: u64 },

    /// The engine answered with a non-zero error code
    #[error("Engine error {code}: {message}")]
    Engine { code: i64, message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by API surfaces to pick a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Unimplemented,
    /// Engine unreachable or unframeable
    Unavailable,
    /// Engine reachable but refused the call
    EngineDeclined,
    Internal,
}

impl Error {
    /// Shorthand for an invalid-argument error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Classify this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::NotImplemented(_) => ErrorCode::Unimplemented,
            Error::Transport(_) | Error::Protocol { .. } => ErrorCode::Unavailable,
            Error::Engine { .. } => ErrorCode::EngineDeclined,
            Error::Internal(_)
            | Error::Configuration(_)
            | Error::Json(_)
            | Error::Io(_) => ErrorCode::Internal,
        }
    }
}

/// Result type alias for the bridge
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::invalid("bad").code(), ErrorCode::InvalidArgument);

        let protocol = Error::Protocol {
            expected: 2,
            received: 1,
        };
        assert_eq!(protocol.code(), ErrorCode::Unavailable);

        let declined = Error::Engine {
            code: -32602,
            message: "Invalid parameters".into(),
        };
        assert_eq!(declined.code(), ErrorCode::EngineDeclined);
        assert_eq!(Error::NotImplemented("stats".into()).code(), ErrorCode::Unimplemented);
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::NotFound("//storage.bridge.dev/subsystems/s1".into());
        assert_eq!(err.to_string(), "Unable to find key //storage.bridge.dev/subsystems/s1");

        let err = Error::Engine {
            code: -17,
            message: "File exists".into(),
        };
        assert_eq!(err.to_string(), "Engine error -17: File exists");
        assert_eq!(err.code(), ErrorCode::EngineDeclined);
    }
}
