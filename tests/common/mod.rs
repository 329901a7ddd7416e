//! Shared helpers for handshake driver integration tests.
//!
//! Provides a scripted record layer (with injectable would-block points)
//! and miniature client/server grammars covering a condensed TLS flight
//! plan:
//!
//! ```text
//! C -> ClientHello
//! S -> ServerHello, ServerHelloDone
//! C -> ClientKeyExchange, [ChangeCipherSpec], Finished
//! S -> [ChangeCipherSpec], Finished
//! ```

#![allow(unused)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use hsflow::{
    AlertDescription, AlertLevel, Config, Conn, ContentType, Driver, Error, FlowState,
    HandshakeGrammar, HandshakeState, InfoCallback, InfoEvent, MessageHeader, MessageType,
    ProcessOutcome, RecordLayer, Role, Work, WriteTransition,
};

/// One scripted inbound event.
#[derive(Debug, Clone, Copy)]
pub enum Item {
    /// A complete peer message (header and body).
    Msg(MessageType, usize),
    /// Report would-block once on the next header read.
    Block,
    /// Report would-block once on the next body read.
    BlockBody,
}

/// Observable state of the mock record layer.
#[derive(Default)]
pub struct RecState {
    pub incoming: VecDeque<Item>,
    pub pending_body: Option<usize>,
    pub sent: Vec<ContentType>,
    pub alerts: Vec<(AlertLevel, AlertDescription)>,
    pub write_blocks: u32,
    pub fail_clear: bool,
    pub retransmits: u32,
    pub body_reads: u32,

    // Block exactly once when the transport op counter hits `block_at_op`.
    pub block_at_op: Option<usize>,
    pub op_counter: usize,
    pub block_consumed: bool,
}

impl RecState {
    fn op_blocks(&mut self) -> bool {
        let n = self.op_counter;
        self.op_counter += 1;
        if !self.block_consumed && self.block_at_op == Some(n) {
            self.block_consumed = true;
            return true;
        }
        false
    }
}

/// Cloneable handle for inspecting the mock record layer from the test.
#[derive(Clone, Default)]
pub struct RecHandle(pub Arc<Mutex<RecState>>);

impl RecHandle {
    pub fn lock(&self) -> MutexGuard<'_, RecState> {
        self.0.lock().unwrap()
    }
}

/// Scripted record layer.
pub struct MockRecord {
    pub state: RecHandle,
}

impl RecordLayer for MockRecord {
    fn read_message_header(&mut self) -> Result<MessageHeader, Error> {
        let mut s = self.state.lock();
        if s.op_blocks() {
            return Err(Error::WouldBlock);
        }
        match s.incoming.front().copied() {
            Some(Item::Block) => {
                s.incoming.pop_front();
                Err(Error::WouldBlock)
            }
            Some(Item::Msg(msg_type, length)) => {
                s.incoming.pop_front();
                s.pending_body = Some(length);
                Ok(MessageHeader { msg_type, length })
            }
            Some(Item::BlockBody) => {
                Err(Error::TransportError("BlockBody before Msg".to_string()))
            }
            None => Err(Error::WouldBlock),
        }
    }

    fn read_message_body(&mut self) -> Result<usize, Error> {
        let mut s = self.state.lock();
        s.body_reads += 1;
        if s.op_blocks() {
            return Err(Error::WouldBlock);
        }
        if matches!(s.incoming.front(), Some(Item::BlockBody)) {
            s.incoming.pop_front();
            return Err(Error::WouldBlock);
        }
        s.pending_body
            .take()
            .ok_or_else(|| Error::TransportError("no body pending".to_string()))
    }

    fn write_pending(&mut self, ctype: ContentType) -> Result<usize, Error> {
        let mut s = self.state.lock();
        if s.op_blocks() {
            return Err(Error::WouldBlock);
        }
        if s.write_blocks > 0 {
            s.write_blocks -= 1;
            return Err(Error::WouldBlock);
        }
        s.sent.push(ctype);
        Ok(1)
    }

    fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) {
        self.state.lock().alerts.push((level, description));
    }

    fn clear_buffers(&mut self) -> Result<(), Error> {
        let s = self.state.lock();
        if s.fail_clear {
            Err(Error::TransportError("buffered data not flushed".to_string()))
        } else {
            Ok(())
        }
    }

    fn retransmit(&mut self) -> Result<(), Error> {
        self.state.lock().retransmits += 1;
        Ok(())
    }
}

/// What the mock grammars observed.
#[derive(Default)]
pub struct GrammarLog {
    pub construct_labels: Vec<&'static str>,
    pub pre_work_tokens: Vec<Work>,
    pub post_work_tokens: Vec<Work>,
    pub post_process_tokens: Vec<Work>,
    pub first_packets: Vec<bool>,
}

/// Cloneable handle for inspecting a mock grammar from the test.
#[derive(Clone, Default)]
pub struct GrammarHandle(pub Arc<Mutex<GrammarLog>>);

impl GrammarHandle {
    pub fn lock(&self) -> MutexGuard<'_, GrammarLog> {
        self.0.lock().unwrap()
    }
}

/// Miniature client grammar.
#[derive(Default)]
pub struct ScriptClient {
    pub log: GrammarHandle,
    pub stall_pre_work_once: bool,
    pub stall_post_process_once: bool,
}

impl HandshakeGrammar for ScriptClient {
    fn read_transition(&mut self, conn: &mut Conn, msg_type: MessageType) -> bool {
        use HandshakeState::*;

        self.log.lock().first_packets.push(conn.first_packet());

        let next = match (conn.hand_state(), msg_type) {
            (SendClientHello, MessageType::ServerHello) => AwaitServerHello,
            (AwaitServerHello, MessageType::ServerHelloDone) => AwaitServerHelloDone,
            (SendClientFinished, MessageType::Finished) => AwaitServerFinished,
            _ => return false,
        };
        conn.set_hand_state(next);
        true
    }

    fn max_message_size(&self, _conn: &Conn) -> usize {
        1024
    }

    fn process_message(&mut self, conn: &mut Conn, _len: usize) -> Result<ProcessOutcome, Error> {
        use HandshakeState::*;

        match conn.hand_state() {
            AwaitServerHello => {
                conn.transcript_mut().append(b"SH");
                Ok(ProcessOutcome::ContinueReading)
            }
            AwaitServerHelloDone => {
                conn.transcript_mut().append(b"SHD");
                Ok(ProcessOutcome::ContinueProcessing)
            }
            AwaitServerFinished => {
                conn.transcript_mut().append(b"SFIN");
                Ok(ProcessOutcome::FinishedReading)
            }
            other => Err(Error::InternalError(format!(
                "client process_message in {:?}",
                other
            ))),
        }
    }

    fn post_process_message(&mut self, _conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().post_process_tokens.push(work);
        if self.stall_post_process_once {
            self.stall_post_process_once = false;
            return Ok(Work::MoreB);
        }
        Ok(Work::FinishedStop)
    }

    fn write_transition(&mut self, conn: &mut Conn) -> Result<WriteTransition, Error> {
        use HandshakeState::*;

        let next = match conn.hand_state() {
            Before | Established => SendClientHello,
            SendClientHello => return Ok(WriteTransition::Finished),
            AwaitServerHelloDone => SendClientKeyExchange,
            SendClientKeyExchange => SendClientChangeCipher,
            SendClientChangeCipher => SendClientFinished,
            SendClientFinished => return Ok(WriteTransition::Finished),
            AwaitServerFinished => Established,
            other => {
                return Err(Error::InternalError(format!(
                    "client write_transition in {:?}",
                    other
                )))
            }
        };
        conn.set_hand_state(next);
        Ok(WriteTransition::Continue)
    }

    fn pre_work(&mut self, conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().pre_work_tokens.push(work);
        if conn.hand_state() == HandshakeState::Established {
            return Ok(Work::FinishedStop);
        }
        if self.stall_pre_work_once && conn.hand_state() == HandshakeState::SendClientFinished {
            self.stall_pre_work_once = false;
            return Ok(Work::MoreB);
        }
        Ok(Work::FinishedContinue)
    }

    fn construct_message(&mut self, conn: &mut Conn) -> Result<(), Error> {
        use HandshakeState::*;

        let label = match conn.hand_state() {
            SendClientHello => "CH",
            SendClientKeyExchange => "CKE",
            SendClientChangeCipher => "CCS",
            SendClientFinished => "FIN",
            other => {
                return Err(Error::InternalError(format!(
                    "client construct_message in {:?}",
                    other
                )))
            }
        };
        self.log.lock().construct_labels.push(label);
        conn.scratch_mut().extend_from_slice(label.as_bytes());
        // ChangeCipherSpec is not a handshake message and stays out of the
        // transcript.
        if conn.hand_state() != SendClientChangeCipher {
            conn.transcript_mut().append(label.as_bytes());
        }
        Ok(())
    }

    fn post_work(&mut self, _conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().post_work_tokens.push(work);
        Ok(Work::FinishedContinue)
    }
}

/// Miniature server grammar.
#[derive(Default)]
pub struct ScriptServer {
    pub log: GrammarHandle,
    pub stall_post_process_once: bool,
}

impl HandshakeGrammar for ScriptServer {
    fn read_transition(&mut self, conn: &mut Conn, msg_type: MessageType) -> bool {
        use HandshakeState::*;

        self.log.lock().first_packets.push(conn.first_packet());

        let next = match (conn.hand_state(), msg_type) {
            (Before | Established, MessageType::ClientHello) => AwaitClientHello,
            (SendServerHelloDone, MessageType::ClientKeyExchange) => AwaitClientKeyExchange,
            (AwaitClientKeyExchange, MessageType::Finished) => AwaitClientFinished,
            _ => return false,
        };
        conn.set_hand_state(next);
        true
    }

    fn max_message_size(&self, _conn: &Conn) -> usize {
        1024
    }

    fn process_message(&mut self, conn: &mut Conn, _len: usize) -> Result<ProcessOutcome, Error> {
        use HandshakeState::*;

        match conn.hand_state() {
            AwaitClientHello => {
                conn.transcript_mut().append(b"CH");
                Ok(ProcessOutcome::ContinueProcessing)
            }
            AwaitClientKeyExchange => {
                conn.transcript_mut().append(b"CKE");
                Ok(ProcessOutcome::ContinueReading)
            }
            AwaitClientFinished => {
                conn.transcript_mut().append(b"CFIN");
                Ok(ProcessOutcome::FinishedReading)
            }
            other => Err(Error::InternalError(format!(
                "server process_message in {:?}",
                other
            ))),
        }
    }

    fn post_process_message(&mut self, _conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().post_process_tokens.push(work);
        if self.stall_post_process_once {
            self.stall_post_process_once = false;
            return Ok(Work::MoreB);
        }
        Ok(Work::FinishedStop)
    }

    fn write_transition(&mut self, conn: &mut Conn) -> Result<WriteTransition, Error> {
        use HandshakeState::*;

        let next = match conn.hand_state() {
            // Nothing to say until the client has spoken.
            Before | Established => return Ok(WriteTransition::Finished),
            AwaitClientHello => SendServerHello,
            SendServerHello => SendServerHelloDone,
            SendServerHelloDone => return Ok(WriteTransition::Finished),
            AwaitClientFinished => SendServerChangeCipher,
            SendServerChangeCipher => SendServerFinished,
            SendServerFinished => Established,
            other => {
                return Err(Error::InternalError(format!(
                    "server write_transition in {:?}",
                    other
                )))
            }
        };
        conn.set_hand_state(next);
        Ok(WriteTransition::Continue)
    }

    fn pre_work(&mut self, conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().pre_work_tokens.push(work);
        if conn.hand_state() == HandshakeState::Established {
            return Ok(Work::FinishedStop);
        }
        Ok(Work::FinishedContinue)
    }

    fn construct_message(&mut self, conn: &mut Conn) -> Result<(), Error> {
        use HandshakeState::*;

        let label = match conn.hand_state() {
            SendServerHello => "SH",
            SendServerHelloDone => "SHD",
            SendServerChangeCipher => "CCS",
            SendServerFinished => "SFIN",
            other => {
                return Err(Error::InternalError(format!(
                    "server construct_message in {:?}",
                    other
                )))
            }
        };
        self.log.lock().construct_labels.push(label);
        conn.scratch_mut().extend_from_slice(label.as_bytes());
        if conn.hand_state() != SendServerChangeCipher {
            conn.transcript_mut().append(label.as_bytes());
        }
        Ok(())
    }

    fn post_work(&mut self, _conn: &mut Conn, work: Work) -> Result<Work, Error> {
        self.log.lock().post_work_tokens.push(work);
        Ok(Work::FinishedContinue)
    }
}

/// Recorded info-callback events plus the flow state sampled at each loop
/// event.
#[derive(Clone, Default)]
pub struct EventsHandle {
    pub events: Arc<Mutex<Vec<(InfoEvent, i32)>>>,
    pub flow_at_loop: Arc<Mutex<Vec<FlowState>>>,
}

impl EventsHandle {
    pub fn events(&self) -> Vec<(InfoEvent, i32)> {
        self.events.lock().unwrap().clone()
    }

    pub fn flows(&self) -> Vec<FlowState> {
        self.flow_at_loop.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: InfoEvent) -> usize {
        self.events().iter().filter(|(e, _)| *e == wanted).count()
    }
}

/// A recording callback that also checks the application-data gate matches
/// its defining state set on every step.
pub fn recording_callback() -> (InfoCallback, EventsHandle) {
    let handle = EventsHandle::default();
    let events = handle.events.clone();
    let flows = handle.flow_at_loop.clone();

    let cb: InfoCallback = Arc::new(move |conn: &Conn, event: InfoEvent, value: i32| {
        events.lock().unwrap().push((event, value));
        if matches!(event, InfoEvent::AcceptLoop | InfoEvent::ConnectLoop) {
            flows.lock().unwrap().push(conn.flow_state());

            let in_gate = matches!(
                conn.hand_state(),
                HandshakeState::Before
                    | HandshakeState::Established
                    | HandshakeState::SendClientHello
            );
            assert_eq!(conn.client_app_data_allowed(), in_gate);
        }
    });

    (cb, handle)
}

/// Everything a test needs to poke at.
pub struct TestSetup {
    pub driver: Driver,
    pub rec: RecHandle,
    pub client_log: GrammarHandle,
    pub server_log: GrammarHandle,
    pub events: EventsHandle,
}

pub fn setup_with(builder: hsflow::ConfigBuilder, incoming: &[Item], dtls: bool) -> TestSetup {
    setup_grammars(
        builder,
        ScriptClient::default(),
        ScriptServer::default(),
        incoming,
        dtls,
    )
}

/// Setup with caller-prepared grammars (for stall injection).
pub fn setup_grammars(
    builder: hsflow::ConfigBuilder,
    client: ScriptClient,
    server: ScriptServer,
    incoming: &[Item],
    dtls: bool,
) -> TestSetup {
    let rec = RecHandle::default();
    rec.lock().incoming.extend(incoming.iter().copied());

    let client_log = client.log.clone();
    let server_log = server.log.clone();

    let (cb, events) = recording_callback();
    let config = Arc::new(builder.info_callback(cb).build());

    let record = Box::new(MockRecord { state: rec.clone() });
    let driver = if dtls {
        Driver::new_dtls(config, record, Box::new(client), Box::new(server))
    } else {
        Driver::new(config, record, Box::new(client), Box::new(server))
    };

    TestSetup {
        driver,
        rec,
        client_log,
        server_log,
        events,
    }
}

/// Default TLS setup with the recording callback installed.
pub fn setup(incoming: &[Item]) -> TestSetup {
    setup_with(Config::builder().jitter_seed(42), incoming, false)
}

/// Default DTLS setup with the recording callback installed.
pub fn setup_dtls(incoming: &[Item]) -> TestSetup {
    setup_with(Config::builder().jitter_seed(42), incoming, true)
}

/// The server flight answering a ClientHello, as the client sees it.
pub fn flights_for_client() -> Vec<Item> {
    vec![
        Item::Msg(MessageType::ServerHello, 2),
        Item::Msg(MessageType::ServerHelloDone, 0),
        Item::Msg(MessageType::Finished, 4),
    ]
}

/// The client flights as the server sees them.
pub fn flights_for_server() -> Vec<Item> {
    vec![
        Item::Msg(MessageType::ClientHello, 3),
        Item::Msg(MessageType::ClientKeyExchange, 2),
        Item::Msg(MessageType::Finished, 4),
    ]
}

/// Drive until the handshake settles, retrying through would-blocks.
pub fn drive_until_done(driver: &mut Driver, role: Role) -> Result<(), Error> {
    let now = Instant::now();
    for _ in 0..100 {
        match driver.drive(role, now) {
            Err(Error::WouldBlock) => continue,
            other => return other,
        }
    }
    panic!("handshake did not settle in 100 drives");
}
