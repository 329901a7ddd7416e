use std::fmt;

use crate::types::ProtocolVersion;

/// Errors surfaced by the handshake driver.
///
/// `WouldBlock` is the one transient variant: it means a transport
/// operation (or a resumable work callback) stalled and the same call
/// should be repeated once I/O is ready. Every other variant is fatal for
/// the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A transport operation would block. Retry the call when ready.
    WouldBlock,
    /// The connection previously hit a fatal error and must be torn down.
    Failed,
    /// The peer sent a message the current handshake state does not allow.
    UnexpectedMessage(String),
    /// The peer announced a message larger than the grammar permits.
    ExcessiveMessageSize {
        /// Announced message size.
        size: usize,
        /// The grammar's limit for the current state.
        limit: usize,
    },
    /// The negotiated version is below the configured security floor.
    VersionTooLow(ProtocolVersion),
    /// Server-side renegotiation with a peer that does not support secure
    /// renegotiation, and the legacy path is not allowed.
    UnsafeLegacyRenegotiation,
    /// An internal invariant was violated.
    InternalError(String),
    /// The connection-level clear failed; a prior fault is still pending.
    ClearFailed(String),
    /// A timer expired ("handshake" for a flight, "connect" overall).
    Timeout(&'static str),
    /// The record layer reported a transport-level failure.
    TransportError(String),
}

impl Error {
    /// True for the transient NBIO variant.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WouldBlock => write!(f, "operation would block"),
            Error::Failed => write!(f, "connection is in a failed state"),
            Error::UnexpectedMessage(m) => write!(f, "unexpected message: {}", m),
            Error::ExcessiveMessageSize { size, limit } => {
                write!(f, "excessive message size: {} > {}", size, limit)
            }
            Error::VersionTooLow(v) => write!(f, "version too low: {}", v),
            Error::UnsafeLegacyRenegotiation => {
                write!(f, "unsafe legacy renegotiation disabled")
            }
            Error::InternalError(m) => write!(f, "internal error: {}", m),
            Error::ClearFailed(m) => write!(f, "connection clear failed: {}", m),
            Error::Timeout(which) => write!(f, "timeout: {}", which),
            Error::TransportError(m) => write!(f, "transport error: {}", m),
        }
    }
}

impl std::error::Error for Error {}
