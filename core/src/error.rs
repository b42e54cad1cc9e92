//! Error types for the vision operation client.
//!
//! # Design
//! Every failure a call can hit lands in one `ApiError`. The remote services
//! report failures in two different JSON shapes; both are kept as separate
//! variants so callers can still see which one the server used. Every
//! variant is terminal for the call that produced it.

use thiserror::Error;

/// Errors returned by the dispatcher, poller, resolver and `VisionClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP exchange itself failed (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Server failure reported as `{"statusCode": .., "message": ..}`.
    #[error("HTTP {status_code}; {message}")]
    StructuredApi { status_code: i64, message: String },

    /// Server failure reported as `{"error": {"code": .., "message": ..}}`.
    #[error("{code}; {message}")]
    CodedApi { code: String, message: String },

    /// A response or status body was not the JSON we expected.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A request object could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The operation reached `Failed`, or finished without the expected payload.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// Polling ran out of attempts before a terminal state.
    #[error("reached the limit of tries: {attempts}")]
    OperationTimedOut { attempts: u32 },

    /// The caller passed an argument that is neither a URL nor raw bytes.
    #[error("given parameter type ({type_name}) is not supported")]
    UnsupportedArgumentType { type_name: String },

    /// A 202 arrived without an `Operation-Location` header.
    #[error("accepted response carried no Operation-Location header")]
    MissingOperationLocation,

    /// A status code that has no meaning at this point of the protocol.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// Polling was cancelled through a `CancelHandle`.
    #[error("operation polling was cancelled")]
    Cancelled,

    /// Writing a downloaded resource to its sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// True for failures the remote service reported about the request itself.
    pub fn is_api_error(&self) -> bool {
        matches!(self, ApiError::StructuredApi { .. } | ApiError::CodedApi { .. })
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
