//! The record-layer boundary.
//!
//! The driver never touches wire bytes. It asks the record layer for
//! message headers and bodies, tells it to flush constructed messages with
//! the right content type, and has it send alerts. A record layer that
//! cannot make progress returns [`Error::WouldBlock`]; the driver suspends
//! and the next `drive` call retries the same operation. The record layer
//! is the authority on how much input has been consumed, so nothing is
//! re-parsed across a suspension.

use crate::error::Error;
use crate::types::{ContentType, MessageType};

/// Parsed handshake message header as reported by the record layer.
///
/// For DTLS the complete body is available as soon as the header is (the
/// record layer defragments first), so `length` doubles as the body length
/// and the driver skips the separate body read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// The handshake message type.
    pub msg_type: MessageType,
    /// Announced body length in bytes.
    pub length: usize,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Warning alert.
    Warning,
    /// Fatal alert; the connection is over.
    Fatal,
}

impl From<AlertLevel> for u8 {
    fn from(value: AlertLevel) -> Self {
        match value {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
        }
    }
}

/// Alert descriptions the driver can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    /// The peer sent a message the handshake grammar forbids.
    UnexpectedMessage,
    /// The handshake failed (used for rejected renegotiation).
    HandshakeFailure,
    /// A field (here: the message size) violated policy.
    IllegalParameter,
    /// An internal error unrelated to the peer.
    InternalError,
}

impl From<AlertDescription> for u8 {
    fn from(value: AlertDescription) -> Self {
        use AlertDescription::*;
        match value {
            UnexpectedMessage => 10,
            HandshakeFailure => 40,
            IllegalParameter => 47,
            InternalError => 80,
        }
    }
}

/// The record layer as seen from the handshake driver.
///
/// Implementations wrap a real record protocol (TLS or DTLS) over some
/// transport. The default methods are no-ops for record layers that do not
/// buffer or retransmit.
pub trait RecordLayer: Send {
    /// Read the next handshake message header.
    ///
    /// Returns [`Error::WouldBlock`] when the transport has not delivered
    /// enough bytes yet. For DTLS the whole message must be available
    /// before the header is reported.
    fn read_message_header(&mut self) -> Result<MessageHeader, Error>;

    /// Read the body of the message whose header was just reported,
    /// returning its length. Not called for DTLS.
    fn read_message_body(&mut self) -> Result<usize, Error>;

    /// Flush the constructed message to the transport as `ctype`,
    /// returning the number of bytes written.
    fn write_pending(&mut self, ctype: ContentType) -> Result<usize, Error>;

    /// Send an alert record. Alerts are fire-and-forget from the driver's
    /// point of view; delivery failures do not change the outcome.
    fn send_alert(&mut self, level: AlertLevel, description: AlertDescription);

    /// Prepare read/write buffers for a handshake.
    fn setup_buffers(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Drop any buffered state during a connection-level clear.
    fn clear_buffers(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Push a buffering layer onto the write side for the duration of the
    /// handshake, so a flight goes out in as few packets as possible.
    fn push_write_buffer(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Retransmit the last outbound flight (DTLS).
    fn retransmit(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// True when the transport is SCTP (no write buffering wanted).
    fn is_sctp(&self) -> bool {
        false
    }
}
