//! hsflow — resumable TLS/DTLS handshake flow driver (Sans-IO)
//!
//! hsflow is the control plane of a TLS/DTLS endpoint: the pair of nested
//! state machines that run a handshake as a sequence of inbound message
//! reads and outbound message writes, resumable at byte-exact points when
//! the underlying transport would block, for both client and server roles.
//!
//! The crate deliberately contains no cryptography, no record framing and
//! no message parsing. Those are collaborators behind two seams:
//!
//! - [`RecordLayer`]: supplies message headers and bodies, flushes
//!   constructed messages with the right record content type, and sends
//!   alerts.
//! - [`HandshakeGrammar`]: one implementation per role, encoding which
//!   messages are legal in which state, how to process them and what to
//!   construct next. Both grammars are handed over at construction, so
//!   there is never a half-wired driver to dereference.
//!
//! # Structure
//!
//! There are two primary state machines:
//!
//! 1) Message flow state machine
//! 2) Handshake state machine
//!
//! The message flow machine controls the reading and sending of messages,
//! including handling of non-blocking IO events and unexpected messages.
//! It is itself broken into two separate sub-state machines which control
//! reading and writing respectively.
//!
//! The handshake state machine ([`HandshakeState`]) tracks the protocol
//! position and is advanced by the grammar as a result of events within
//! the message flow machine:
//!
//! ```text
//! --------------------------------------------          -----------------
//! |                                          |          |               |
//! | Message flow state machine               |          |               |
//! |                                          |          |               |
//! | -------------------- ------------------- | Transition | Handshake   |
//! | | Reading          | | Writing         | | Event      | state       |
//! | | sub-state        | | sub-state       | |----------->| machine     |
//! | | machine for      | | machine for     | |          |               |
//! | | reading messages | | writing messages| |          |               |
//! | -------------------- ------------------- |          |               |
//! |                                          |          |               |
//! --------------------------------------------          -----------------
//! ```
//!
//! # Driving
//!
//! [`Driver::drive`] runs the handshake as far as it can. It returns
//! `Ok(())` when the handshake completed, `Err(Error::WouldBlock)` when
//! the transport stalled (call again with the same role when I/O is
//! ready; all cursors are exactly where they were), and any other error
//! when the connection is dead. Fatal errors are sticky: after one, every
//! further call fails immediately and the connection must be torn down.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use hsflow::{Config, Driver, Error, Role};
//! # use hsflow::{AlertDescription, AlertLevel, ContentType, Conn, HandshakeGrammar,
//! #     MessageHeader, MessageType, ProcessOutcome, RecordLayer, Work, WriteTransition};
//! # struct NullRecord;
//! # impl RecordLayer for NullRecord {
//! #     fn read_message_header(&mut self) -> Result<MessageHeader, Error> {
//! #         Err(Error::WouldBlock)
//! #     }
//! #     fn read_message_body(&mut self) -> Result<usize, Error> { Err(Error::WouldBlock) }
//! #     fn write_pending(&mut self, _ctype: ContentType) -> Result<usize, Error> { Ok(0) }
//! #     fn send_alert(&mut self, _level: AlertLevel, _description: AlertDescription) {}
//! # }
//! # struct NullGrammar;
//! # impl HandshakeGrammar for NullGrammar {
//! #     fn read_transition(&mut self, _conn: &mut Conn, _mt: MessageType) -> bool { false }
//! #     fn max_message_size(&self, _conn: &Conn) -> usize { 16384 }
//! #     fn process_message(&mut self, _conn: &mut Conn, _len: usize)
//! #         -> Result<ProcessOutcome, Error> { Ok(ProcessOutcome::FinishedReading) }
//! #     fn post_process_message(&mut self, _conn: &mut Conn, work: Work)
//! #         -> Result<Work, Error> { Ok(work) }
//! #     fn write_transition(&mut self, _conn: &mut Conn)
//! #         -> Result<WriteTransition, Error> { Ok(WriteTransition::Finished) }
//! #     fn pre_work(&mut self, _conn: &mut Conn, _work: Work)
//! #         -> Result<Work, Error> { Ok(Work::FinishedContinue) }
//! #     fn construct_message(&mut self, _conn: &mut Conn) -> Result<(), Error> { Ok(()) }
//! #     fn post_work(&mut self, _conn: &mut Conn, _work: Work)
//! #         -> Result<Work, Error> { Ok(Work::FinishedContinue) }
//! # }
//!
//! let config = Arc::new(Config::default());
//! let mut driver = Driver::new(
//!     config,
//!     Box::new(NullRecord),
//!     Box::new(NullGrammar), // client grammar
//!     Box::new(NullGrammar), // server grammar
//! );
//!
//! loop {
//!     match driver.drive(Role::Client, Instant::now()) {
//!         Ok(()) => break,                  // connected
//!         Err(Error::WouldBlock) => break,  // wait for I/O, then call again
//!         Err(_) => break,                  // fatal, tear down
//!     }
//! }
//! ```
//!
//! # DTLS timers
//!
//! For DTLS the driver arms a retransmission timer whenever a flight is
//! flushed and disarms it when the answering flight has been read. The
//! embedding event loop schedules it: call [`Driver::poll_timeout`] for
//! the next deadline and [`Driver::handle_timeout`] at or after it.
//!
//! # Observation
//!
//! An info callback (config-level, overridable per connection) fires at
//! well-defined milestones: handshake start, every state-machine step, and
//! every `drive` exit with the numeric result. Callbacks must not
//! re-enter the driver.
//!
//! ### MSRV
//! Rust 1.81.0

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![deny(missing_docs)]

#[macro_use]
extern crate log;

use std::sync::Arc;
use std::time::Instant;

pub mod buffer;

mod conn;
pub use conn::{Conn, Stats, MAX_PLAIN_LENGTH};

mod config;
pub use config::{Config, ConfigBuilder};

mod error;
pub use error::Error;

mod event;
pub use event::{InfoCallback, InfoEvent};

mod flow;
pub use flow::FlowState;

mod grammar;
pub use grammar::{HandshakeGrammar, ProcessOutcome, Work, WriteTransition};

mod reading;
pub use reading::ReadState;

mod record;
pub use record::{AlertDescription, AlertLevel, MessageHeader, RecordLayer};

mod timer;

mod transcript;
pub use transcript::{HashAlgorithm, Transcript};

mod types;
pub use types::{ContentType, HandshakeState, MessageType, ProtocolVersion, Role};

mod writing;
pub use writing::WriteState;

/// A handshake driver bound to one connection.
///
/// Owns the per-connection [`Conn`] context together with the two
/// role grammars; [`drive`][Driver::drive] selects the grammar for the
/// requested role on every call, so the same connection can accept or
/// connect without rewiring.
pub struct Driver {
    conn: Conn,
    client: Box<dyn HandshakeGrammar>,
    server: Box<dyn HandshakeGrammar>,
}

impl Driver {
    /// Create a driver for a stream (TLS) connection.
    ///
    /// The version starts as [`ProtocolVersion::Any`] until the grammar
    /// negotiates a concrete one.
    pub fn new(
        config: Arc<Config>,
        record: Box<dyn RecordLayer>,
        client: Box<dyn HandshakeGrammar>,
        server: Box<dyn HandshakeGrammar>,
    ) -> Self {
        let conn = Conn::new(config, record, false, ProtocolVersion::Any);
        Driver {
            conn,
            client,
            server,
        }
    }

    /// Create a driver for a datagram (DTLS 1.2) connection.
    pub fn new_dtls(
        config: Arc<Config>,
        record: Box<dyn RecordLayer>,
        client: Box<dyn HandshakeGrammar>,
        server: Box<dyn HandshakeGrammar>,
    ) -> Self {
        let conn = Conn::new(config, record, true, ProtocolVersion::Dtls1_2);
        Driver {
            conn,
            client,
            server,
        }
    }

    /// Run the handshake as far as possible in the given role.
    ///
    /// Returns `Ok(())` on completion, [`Error::WouldBlock`] on a
    /// transport stall (retry with the same role when I/O is ready), any
    /// other error on a fatal, sticky failure.
    pub fn drive(&mut self, role: Role, now: Instant) -> Result<(), Error> {
        let grammar = match role {
            Role::Client => &mut *self.client,
            Role::Server => &mut *self.server,
        };
        self.conn.drive(grammar, role, now)
    }

    /// Process timer-based events (DTLS retransmission, overall
    /// handshake deadline).
    ///
    /// Call at or after the instant from [`poll_timeout`][Driver::poll_timeout].
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        let conn = &mut self.conn;

        if let Some(deadline) = conn.connect_deadline {
            if now >= deadline {
                return Err(Error::Timeout("connect"));
            }
        }

        if conn.timer.expired(now) {
            if conn.timer.can_retry() {
                debug!("Flight timeout, retransmitting");
                conn.timer.next_attempt(now);
                conn.record.retransmit()?;
            } else {
                return Err(Error::Timeout("handshake"));
            }
        }

        Ok(())
    }

    /// The next instant at which [`handle_timeout`][Driver::handle_timeout]
    /// wants to run, if any timer is armed.
    pub fn poll_timeout(&self) -> Option<Instant> {
        let flight = self.conn.timer.deadline();
        let connect = self.conn.connect_deadline;

        match (flight, connect) {
            (Some(f), Some(c)) => Some(f.min(c)),
            (Some(f), None) => Some(f),
            (None, Some(c)) => Some(c),
            (None, None) => None,
        }
    }

    /// Reset the connection so a fresh handshake can start.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.conn.clear()
    }

    /// Request a renegotiation handshake on the next `drive` call.
    pub fn set_renegotiate(&mut self) {
        self.conn.set_renegotiate();
    }

    /// Latch the permanent error state.
    pub fn set_error(&mut self) {
        self.conn.set_error();
    }

    /// Whether application data may be sent in the current handshake
    /// state.
    pub fn client_app_data_allowed(&self) -> bool {
        self.conn.client_app_data_allowed()
    }

    /// The connection context.
    pub fn conn(&self) -> &Conn {
        &self.conn
    }

    /// Mutable access to the connection context (for wiring callbacks,
    /// versions and grammar-owned flags from outside a handshake).
    pub fn conn_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").field("conn", &self.conn).finish()
    }
}
