//! The read sub-state machine.
//!
//! Drives one inbound flight: headers and bodies are pulled from the
//! record layer, the grammar validates and processes each message, and an
//! optional post-processing step may spread blocking work across several
//! calls.
//!
//! ```text
//! Header <--+<-------------+
//!    |      |              |
//!    v      |              |
//!  Body ----+--> PostProcess
//!    |              |
//!    +--------------+
//!    v
//! [flight complete]
//! ```
//!
//! Any step may stall on the transport, in which case the cursor stays put
//! and the next call resumes exactly here.

use crate::conn::Conn;
use crate::error::Error;
use crate::event::InfoCallback;
use crate::flow::SubState;
use crate::grammar::{HandshakeGrammar, ProcessOutcome, Work};
use crate::record::{AlertDescription, AlertLevel};

/// Read sub-machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Reading the next message header.
    Header,
    /// Reading and processing the message body.
    Body,
    /// Post-processing work that may block.
    PostProcess,
}

impl Conn {
    pub(crate) fn read_state_machine(
        &mut self,
        grammar: &mut dyn HandshakeGrammar,
        cb: &Option<InfoCallback>,
    ) -> Result<SubState, Error> {
        if self.flow.read_state_first_init {
            self.first_packet = true;
            self.flow.read_state_first_init = false;
        }

        loop {
            match self.flow.read_state {
                ReadState::Header => {
                    self.scratch_mut().clear();

                    // Get the state the peer wants to move to.
                    let header = self.record.read_message_header()?;
                    trace!("read header: {:?}", header);

                    // Notify callback of an impending state change.
                    self.fire_info(cb, self.role.loop_event(), 1);

                    // Check the peer is allowed to move to the new state,
                    // and move there if so.
                    if !grammar.read_transition(self, header.msg_type) {
                        self.record
                            .send_alert(AlertLevel::Fatal, AlertDescription::UnexpectedMessage);
                        return Err(Error::UnexpectedMessage(format!(
                            "{:?} in state {:?}",
                            header.msg_type, self.flow.hand_state
                        )));
                    }

                    let limit = grammar.max_message_size(self);
                    if header.length > limit {
                        self.record
                            .send_alert(AlertLevel::Fatal, AlertDescription::IllegalParameter);
                        return Err(Error::ExcessiveMessageSize {
                            size: header.length,
                            limit,
                        });
                    }

                    self.message_size = header.length;
                    self.flow.read_state = ReadState::Body;
                    // Straight on to the body.
                }

                ReadState::Body => {
                    let len = if self.dtls {
                        // The record layer delivered the body with the
                        // header.
                        self.message_size
                    } else {
                        self.record.read_message_body()?
                    };

                    self.first_packet = false;

                    match grammar.process_message(self, len)? {
                        ProcessOutcome::FinishedReading => {
                            self.stop_retransmit_timer();
                            return Ok(SubState::Finished);
                        }
                        ProcessOutcome::ContinueProcessing => {
                            self.flow.read_state = ReadState::PostProcess;
                            self.flow.read_work = Work::MoreA;
                        }
                        ProcessOutcome::ContinueReading => {
                            self.flow.read_state = ReadState::Header;
                        }
                    }
                }

                ReadState::PostProcess => {
                    let work = grammar.post_process_message(self, self.flow.read_work)?;
                    self.flow.read_work = work;

                    match work {
                        Work::FinishedContinue => {
                            self.flow.read_state = ReadState::Header;
                        }
                        Work::FinishedStop => {
                            self.stop_retransmit_timer();
                            return Ok(SubState::Finished);
                        }
                        _ => {
                            // Unfinished work; resume in this sub-state.
                            return Err(Error::WouldBlock);
                        }
                    }
                }
            }
        }
    }
}
