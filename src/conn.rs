//! Per-connection handshake context.
//!
//! `Conn` owns everything the driver and the grammar callbacks mutate
//! during a handshake: the nested state-machine cursors, the negotiated
//! version, the scratch buffer, the transcript, the retransmission timer
//! and assorted protocol flags. It is borrowed mutably for the duration of
//! a [`Driver::drive`] call and never shared between threads.
//!
//! [`Driver::drive`]: crate::Driver::drive

use std::sync::Arc;
use std::time::Instant;

use crate::buffer::{Buf, BufferPool};
use crate::config::Config;
use crate::error::Error;
use crate::event::{InfoCallback, InfoEvent};
use crate::flow::{FlowMachine, FlowState};
use crate::reading::ReadState;
use crate::record::RecordLayer;
use crate::timer::HandshakeTimer;
use crate::transcript::Transcript;
use crate::types::{HandshakeState, ProtocolVersion, Role};
use crate::writing::WriteState;

/// Largest plaintext fragment a record may carry. The handshake scratch
/// buffer is pre-grown to this size.
pub const MAX_PLAIN_LENGTH: usize = 16_384;

/// Handshake counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Completed or attempted accepts (server handshakes).
    pub accept: u64,
    /// Attempted connects (client handshakes).
    pub connect: u64,
    /// Server-initiated renegotiations.
    pub accept_renegotiate: u64,
    /// Client-initiated renegotiations.
    pub connect_renegotiate: u64,
}

/// Per-connection handshake context.
pub struct Conn {
    pub(crate) config: Arc<Config>,
    pub(crate) flow: FlowMachine,
    pub(crate) role: Role,
    pub(crate) version: ProtocolVersion,
    pub(crate) dtls: bool,
    pub(crate) record: Box<dyn RecordLayer>,
    pub(crate) transcript: Transcript,
    pub(crate) timer: HandshakeTimer,
    pub(crate) buffers_free: BufferPool,

    /// Scratch for the message currently being constructed or processed.
    pub(crate) scratch: Option<Buf>,
    /// Announced size of the inbound message being read.
    pub(crate) message_size: usize,

    pub(crate) first_packet: bool,
    pub(crate) change_cipher_spec: bool,
    pub(crate) renegotiate: bool,
    pub(crate) send_connection_binding: bool,
    pub(crate) session_resumed: bool,
    pub(crate) cert_request: bool,
    pub(crate) client_random: [u8; 32],

    pub(crate) hb_pending: bool,
    pub(crate) hb_seq: u64,

    pub(crate) in_handshake: u32,
    pub(crate) info_callback: Option<InfoCallback>,
    pub(crate) last_error: Option<Error>,
    pub(crate) connect_deadline: Option<Instant>,

    pub(crate) stats: Stats,
}

impl Conn {
    pub(crate) fn new(
        config: Arc<Config>,
        record: Box<dyn RecordLayer>,
        dtls: bool,
        version: ProtocolVersion,
    ) -> Self {
        let timer = HandshakeTimer::new(
            config.flight_start_rto(),
            config.flight_retries(),
            config.jitter_seed(),
        );

        Conn {
            config,
            flow: FlowMachine::new(),
            role: Role::Server,
            version,
            dtls,
            record,
            transcript: Transcript::new(),
            timer,
            buffers_free: BufferPool::default(),
            scratch: None,
            message_size: 0,
            first_packet: false,
            change_cipher_spec: false,
            renegotiate: false,
            send_connection_binding: false,
            session_resumed: false,
            cert_request: false,
            client_random: [0; 32],
            hb_pending: false,
            hb_seq: 0,
            in_handshake: 0,
            info_callback: None,
            last_error: None,
            connect_deadline: None,
            stats: Stats::default(),
        }
    }

    /// Current outer message-flow state.
    pub fn flow_state(&self) -> FlowState {
        self.flow.state
    }

    /// Current read sub-state.
    pub fn read_state(&self) -> ReadState {
        self.flow.read_state
    }

    /// Current write sub-state.
    pub fn write_state(&self) -> WriteState {
        self.flow.write_state
    }

    /// Current protocol-level handshake state.
    pub fn hand_state(&self) -> HandshakeState {
        self.flow.hand_state
    }

    /// Advance the protocol-level handshake state.
    ///
    /// This is how grammar callbacks move the handshake along; the driver
    /// itself only ever seeds [`HandshakeState::Before`].
    pub fn set_hand_state(&mut self, state: HandshakeState) {
        trace!("hand_state -> {:?}", state);
        self.flow.hand_state = state;
    }

    /// The role stamped at handshake start. Defaults to server.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Negotiated (or provisional) protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Set the protocol version. Typically done by the grammar once the
    /// hello exchange has negotiated one.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// True for connections running over datagram transports.
    pub fn is_dtls(&self) -> bool {
        self.dtls
    }

    /// Shared configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handshake counters for this connection.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The fatal error of the most recent `drive` call, if any.
    ///
    /// Cleared on every `drive` entry; `WouldBlock` is never recorded.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// True while reading the very first message of a connection. The
    /// grammar uses this for version negotiation leniency.
    pub fn first_packet(&self) -> bool {
        self.first_packet
    }

    /// Whether the peer advertised secure renegotiation (RFC 5746).
    pub fn send_connection_binding(&self) -> bool {
        self.send_connection_binding
    }

    /// Record whether the peer advertised secure renegotiation.
    pub fn set_send_connection_binding(&mut self, binding: bool) {
        self.send_connection_binding = binding;
    }

    /// Whether the current handshake resumed a previous session.
    pub fn session_resumed(&self) -> bool {
        self.session_resumed
    }

    /// Mark the current handshake as a session resumption.
    pub fn set_session_resumed(&mut self, resumed: bool) {
        self.session_resumed = resumed;
    }

    /// Whether the server asked for a client certificate.
    pub fn cert_request(&self) -> bool {
        self.cert_request
    }

    /// Record a pending certificate request.
    pub fn set_cert_request(&mut self, requested: bool) {
        self.cert_request = requested;
    }

    /// The client random for the current handshake.
    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    /// Mutable access to the client random (filled in by the grammar).
    pub fn client_random_mut(&mut self) -> &mut [u8; 32] {
        &mut self.client_random
    }

    /// Whether a ChangeCipherSpec has been received this handshake.
    pub fn change_cipher_spec(&self) -> bool {
        self.change_cipher_spec
    }

    /// Record receipt of a ChangeCipherSpec.
    pub fn set_change_cipher_spec(&mut self, received: bool) {
        self.change_cipher_spec = received;
    }

    /// Announced size of the inbound message currently being read.
    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// Whether this connection is renegotiating.
    pub fn renegotiating(&self) -> bool {
        self.renegotiate
    }

    /// Whether a heartbeat response is outstanding.
    pub fn heartbeat_pending(&self) -> bool {
        self.hb_pending
    }

    /// Mark a heartbeat request as in flight.
    pub fn set_heartbeat_pending(&mut self, pending: bool) {
        self.hb_pending = pending;
    }

    /// Sequence number of the next heartbeat.
    pub fn heartbeat_seq(&self) -> u64 {
        self.hb_seq
    }

    /// Set a connection-level info callback, overriding the config-level
    /// one.
    pub fn set_info_callback(&mut self, cb: InfoCallback) {
        self.info_callback = Some(cb);
    }

    /// The running handshake transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Mutable access to the transcript, for the grammar to append
    /// handshake bytes.
    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// The handshake scratch buffer, allocated on demand.
    ///
    /// `construct_message` builds the outbound message here; the read side
    /// clears it before each inbound message.
    pub fn scratch_mut(&mut self) -> &mut Buf {
        if self.scratch.is_none() {
            let mut buf = self.buffers_free.pop();
            buf.reserve(MAX_PLAIN_LENGTH);
            self.scratch = Some(buf);
        }
        // Unwrap is OK, allocated above.
        self.scratch.as_mut().unwrap()
    }

    /// The scratch buffer contents.
    pub fn scratch(&self) -> &[u8] {
        self.scratch.as_deref().unwrap_or(&[])
    }

    /// Whether application data may be sent in the current handshake
    /// state.
    ///
    /// True before any handshake has begun, between completed handshakes,
    /// and right after the client queued its ClientHello. Everywhere else
    /// the record layer must refuse application data, or it would violate
    /// the handshake grammar on the wire.
    pub fn client_app_data_allowed(&self) -> bool {
        matches!(
            self.flow.hand_state,
            HandshakeState::Before
                | HandshakeState::Established
                | HandshakeState::SendClientHello
        )
    }

    /// Reset the connection for a fresh handshake.
    ///
    /// Fails (without latching the error state) when the record layer
    /// cannot drop its buffered state; that failure signals a prior fault.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.record
            .clear_buffers()
            .map_err(|e| Error::ClearFailed(e.to_string()))?;

        self.flow = FlowMachine::new();
        self.first_packet = false;
        self.change_cipher_spec = false;
        self.renegotiate = false;
        self.session_resumed = false;
        self.cert_request = false;
        self.message_size = 0;
        // Return the scratch to the pool; the next handshake reuses it.
        if let Some(scratch) = self.scratch.take() {
            self.buffers_free.push(scratch);
        }
        self.transcript.reset();
        self.timer.disarm();
        self.connect_deadline = None;

        Ok(())
    }

    /// Latch the permanent error state. Every subsequent `drive` call
    /// fails immediately; the connection must be torn down.
    pub fn set_error(&mut self) {
        self.flow.state = FlowState::Error;
    }

    /// Request a renegotiation handshake on the next `drive` call.
    pub fn set_renegotiate(&mut self) {
        self.flow.state = FlowState::Renegotiate;
    }

    /// Whether a handshake is in progress (a pending renegotiation
    /// counts, so the clear guard does not wipe it).
    pub(crate) fn is_in_init(&self) -> bool {
        matches!(
            self.flow.state,
            FlowState::Writing | FlowState::Reading | FlowState::Renegotiate
        )
    }

    /// Whether the connection has never progressed past the initial state.
    pub(crate) fn is_in_before(&self) -> bool {
        self.flow.hand_state == HandshakeState::Before
    }

    /// Resolve the effective info callback. A connection-level callback
    /// overrides the config-level one.
    pub(crate) fn info_cb(&self) -> Option<InfoCallback> {
        self.info_callback
            .clone()
            .or_else(|| self.config.info_callback().cloned())
    }

    pub(crate) fn fire_info(&self, cb: &Option<InfoCallback>, event: InfoEvent, value: i32) {
        if let Some(cb) = cb {
            cb(self, event, value);
        }
    }

    /// Arm the DTLS retransmission timer for the flight being sent.
    pub(crate) fn start_retransmit_timer(&mut self, now: Instant) {
        if self.dtls && self.flow.use_timer {
            self.timer.arm(now);
        }
    }

    /// Stop the DTLS retransmission timer. The single call site for all
    /// the places a finished inbound flight cancels retransmission.
    pub(crate) fn stop_retransmit_timer(&mut self) {
        if self.dtls {
            self.timer.disarm();
        }
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("flow_state", &self.flow.state)
            .field("hand_state", &self.flow.hand_state)
            .field("role", &self.role)
            .field("version", &self.version)
            .field("dtls", &self.dtls)
            .finish()
    }
}
