//! Handshake observation events.
//!
//! This module contains the `InfoEvent` enum and the callback type used to
//! observe handshake progress for logging or instrumentation. The callback
//! fires synchronously inside [`Driver::drive`] and must not re-enter the
//! driver for the same connection.
//!
//! [`Driver::drive`]: crate::Driver::drive

use std::sync::Arc;

use crate::conn::Conn;
use crate::types::Role;

/// Milestones reported to the info callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoEvent {
    /// A handshake is starting (value 1).
    HandshakeStart,
    /// The server-side state machine took a step (value 1).
    AcceptLoop,
    /// The client-side state machine took a step (value 1).
    ConnectLoop,
    /// A server-side `drive` call returned (value 1 ok, 0 would-block,
    /// -1 fatal).
    AcceptExit,
    /// A client-side `drive` call returned (same values as `AcceptExit`).
    ConnectExit,
}

impl Role {
    /// The loop event for this role.
    pub(crate) fn loop_event(&self) -> InfoEvent {
        match self {
            Role::Server => InfoEvent::AcceptLoop,
            Role::Client => InfoEvent::ConnectLoop,
        }
    }

    /// The exit event for this role.
    pub(crate) fn exit_event(&self) -> InfoEvent {
        match self {
            Role::Server => InfoEvent::AcceptExit,
            Role::Client => InfoEvent::ConnectExit,
        }
    }
}

/// Observer invoked at handshake milestones.
///
/// A connection-level callback (set via [`Conn::set_info_callback`])
/// overrides the config-level one.
pub type InfoCallback = Arc<dyn Fn(&Conn, InfoEvent, i32) + Send + Sync>;
