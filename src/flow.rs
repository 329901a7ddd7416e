//! The outer message-flow state machine.
//!
//! A handshake is a strict alternation of outbound and inbound flights.
//! The outer machine starts in `Uninited` (or `Renegotiate`), runs the
//! one-time init block, then ping-pongs between the write and read
//! sub-machines until the handshake completes:
//!
//! ```text
//! Uninited     Renegotiate
//!    |              |
//!    +------+-------+
//!           v
//!        Writing <------> Reading
//!           |
//!           v
//!        Finished -> [success, back to Uninited]
//! ```
//!
//! Any call may exit early on a transport stall (`WouldBlock`), leaving
//! every cursor untouched so the next call resumes at the exact suspended
//! sub-state. `Error` is absorbing: once latched, only teardown remains.

use std::time::Instant;

use crate::conn::Conn;
use crate::error::Error;
use crate::event::{InfoCallback, InfoEvent};
use crate::grammar::{HandshakeGrammar, Work};
use crate::reading::ReadState;
use crate::record::{AlertDescription, AlertLevel};
use crate::types::{HandshakeState, ProtocolVersion, Role};
use crate::writing::WriteState;

/// Outer message-flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No handshake has been started.
    Uninited,
    /// A renegotiation handshake has been requested.
    Renegotiate,
    /// The write sub-machine is active.
    Writing,
    /// The read sub-machine is active.
    Reading,
    /// The handshake just completed (transient; observable only from
    /// within callbacks).
    Finished,
    /// A fatal error was latched. Permanent.
    Error,
}

/// All the state-machine cursors, kept together so a connection clear can
/// reset them in one assignment.
pub(crate) struct FlowMachine {
    pub(crate) state: FlowState,
    pub(crate) read_state: ReadState,
    pub(crate) write_state: WriteState,
    pub(crate) read_work: Work,
    pub(crate) write_work: Work,
    pub(crate) hand_state: HandshakeState,
    pub(crate) read_state_first_init: bool,
    pub(crate) use_timer: bool,
}

impl FlowMachine {
    pub(crate) fn new() -> Self {
        FlowMachine {
            state: FlowState::Uninited,
            read_state: ReadState::Header,
            write_state: WriteState::Transition,
            read_work: Work::MoreA,
            write_work: Work::MoreA,
            hand_state: HandshakeState::Before,
            read_state_first_init: false,
            use_timer: false,
        }
    }
}

/// What a sub-machine reports back to the outer machine. Stalls and fatal
/// errors travel as `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubState {
    /// The sub-machine is done; flip to the other one.
    Finished,
    /// The sub-machine is done and so is the handshake.
    EndHandshake,
}

impl Conn {
    /// Run the message-flow machine until it completes, stalls or fails.
    ///
    /// This is the engine behind [`Driver::drive`]; see there for the
    /// calling contract.
    ///
    /// [`Driver::drive`]: crate::Driver::drive
    pub(crate) fn drive(
        &mut self,
        grammar: &mut dyn HandshakeGrammar,
        role: Role,
        now: Instant,
    ) -> Result<(), Error> {
        if self.flow.state == FlowState::Error {
            // Nothing to do for a dead connection, and no observers fire.
            return Err(Error::Failed);
        }

        self.last_error = None;
        let cb = self.info_cb();
        self.in_handshake += 1;

        let ret = self.drive_flow(grammar, role, now, &cb);

        self.in_handshake -= 1;

        if let Err(e) = &ret {
            if !e.is_would_block() {
                self.last_error = Some(e.clone());
                // A failing connection clear reports a prior fault; it does
                // not itself latch the error state.
                if !matches!(e, Error::ClearFailed(_)) {
                    self.set_error();
                }
            }
        }

        let value = match &ret {
            Ok(()) => 1,
            Err(e) if e.is_would_block() => 0,
            Err(_) => -1,
        };
        self.fire_info(&cb, role.exit_event(), value);

        ret
    }

    fn drive_flow(
        &mut self,
        grammar: &mut dyn HandshakeGrammar,
        role: Role,
        now: Instant,
        cb: &Option<InfoCallback>,
    ) -> Result<(), Error> {
        if matches!(self.flow.state, FlowState::Uninited | FlowState::Renegotiate) {
            self.init_handshake(role, now, cb)?;
        }

        while self.flow.state != FlowState::Finished {
            match self.flow.state {
                FlowState::Reading => match self.read_state_machine(grammar, cb)? {
                    SubState::Finished => {
                        self.flow.state = FlowState::Writing;
                        self.init_write_state();
                    }
                    SubState::EndHandshake => {
                        self.flow.state = FlowState::Finished;
                    }
                },
                FlowState::Writing => match self.write_state_machine(grammar, now, cb)? {
                    SubState::Finished => {
                        self.flow.state = FlowState::Reading;
                        self.init_read_state();
                    }
                    SubState::EndHandshake => {
                        self.flow.state = FlowState::Finished;
                    }
                },
                _ => {
                    return Err(Error::InternalError(
                        "invalid message flow state".to_string(),
                    ));
                }
            }
        }

        debug!("Handshake complete as {:?}", role);
        self.flow.state = FlowState::Uninited;
        self.connect_deadline = None;

        Ok(())
    }

    /// The one-time init block, entered from `Uninited` or `Renegotiate`.
    fn init_handshake(
        &mut self,
        role: Role,
        now: Instant,
        cb: &Option<InfoCallback>,
    ) -> Result<(), Error> {
        let renegotiating = self.flow.state == FlowState::Renegotiate;

        // A fresh start gets a full connection clear. A pending
        // renegotiation counts as mid-handshake and must survive.
        if !self.is_in_init() || self.is_in_before() {
            self.clear()?;
        }

        // Heartbeats make no sense during a handshake; cancel any pending
        // one as if the response had arrived.
        if self.hb_pending {
            if self.dtls {
                self.stop_retransmit_timer();
            }
            self.hb_pending = false;
            self.hb_seq += 1;
        }

        if renegotiating {
            self.renegotiate = true;
            if role == Role::Client {
                self.stats.connect_renegotiate += 1;
            }
        }

        if self.flow.state == FlowState::Uninited {
            self.flow.hand_state = HandshakeState::Before;
        }
        self.role = role;

        debug!("Handshake start as {:?}, version {}", role, self.version);
        self.fire_info(cb, InfoEvent::HandshakeStart, 1);

        // The transport flavor and the version family must agree before
        // any message moves.
        if self.dtls {
            let bad_ver_ok =
                role == Role::Client && self.version == ProtocolVersion::Dtls1Bad;
            if !self.version.is_dtls() && !bad_ver_ok {
                return Err(Error::InternalError(format!(
                    "{} is not a DTLS version",
                    self.version
                )));
            }
        } else if self.version != ProtocolVersion::Any && !self.version.is_tls() {
            return Err(Error::InternalError(format!(
                "{} is not a TLS version",
                self.version
            )));
        }

        // Policy floor. No alert for this one: nothing has been sent yet
        // and the fault is local.
        if self.version != ProtocolVersion::Any && !self.config.version_allowed(self.version) {
            return Err(Error::VersionTooLow(self.version));
        }

        // Scratch and record buffers.
        self.scratch_mut().clear();
        self.record.setup_buffers()?;

        // Should have been reset when the previous Finished was processed,
        // too.
        self.change_cipher_spec = false;

        if role == Role::Client || !renegotiating {
            // Buffer the outbound flight so it leaves in as few packets as
            // possible. SCTP does its own bundling.
            if !(self.dtls && self.record.is_sctp()) {
                self.record.push_write_buffer()?;
            }

            self.transcript.reset();
        }

        if role == Role::Server {
            if !renegotiating {
                self.stats.accept += 1;
            } else if !self.send_connection_binding
                && !self.config.allow_unsafe_legacy_renegotiation()
            {
                // Renegotiating with a client that doesn't support secure
                // renegotiation.
                self.record
                    .send_alert(AlertLevel::Fatal, AlertDescription::HandshakeFailure);
                return Err(Error::UnsafeLegacyRenegotiation);
            } else {
                self.stats.accept_renegotiate += 1;
            }
        } else {
            self.stats.connect += 1;

            // Mark client_random uninitialized.
            self.client_random = [0; 32];
            self.session_resumed = false;
            self.cert_request = false;

            if self.dtls {
                self.flow.use_timer = true;
            }
        }

        self.connect_deadline = Some(now + self.config.handshake_timeout());

        self.flow.state = FlowState::Writing;
        self.init_write_state();
        self.flow.read_state_first_init = true;

        Ok(())
    }

    pub(crate) fn init_read_state(&mut self) {
        self.flow.read_state = ReadState::Header;
    }

    pub(crate) fn init_write_state(&mut self) {
        self.flow.write_state = WriteState::Transition;
    }
}
