//! The write sub-state machine.
//!
//! Drives one outbound flight: the grammar transitions to the next message
//! to send, prepares it (possibly across several calls), constructs it
//! into the scratch buffer and the record layer flushes it out.
//!
//! ```text
//! +-> Transition ------> [flight complete]
//! |       |
//! |       v
//! |    PreWork  -------> [handshake complete]
//! |       |
//! |       v
//! |     Send
//! |       |
//! |       v
//! |    PostWork -------> [handshake complete]
//! |       |
//! +-------+
//! ```
//!
//! Pre- and post-work may stall; the cursor stays put and the next call
//! resumes exactly here. A stalled `Send` resumes without reconstructing
//! the message (the record layer still holds the pending bytes).

use std::time::Instant;

use crate::conn::Conn;
use crate::error::Error;
use crate::event::InfoCallback;
use crate::flow::SubState;
use crate::grammar::{HandshakeGrammar, Work, WriteTransition};
use crate::types::ContentType;

/// Write sub-machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Asking the grammar for the next message to send.
    Transition,
    /// Preparatory work before constructing the message.
    PreWork,
    /// Flushing the constructed message to the transport.
    Send,
    /// Work after the message went out.
    PostWork,
}

impl Conn {
    pub(crate) fn write_state_machine(
        &mut self,
        grammar: &mut dyn HandshakeGrammar,
        now: Instant,
        cb: &Option<InfoCallback>,
    ) -> Result<SubState, Error> {
        loop {
            match self.flow.write_state {
                WriteState::Transition => {
                    // Notify callback of an impending state change.
                    self.fire_info(cb, self.role.loop_event(), 1);

                    match grammar.write_transition(self)? {
                        WriteTransition::Continue => {
                            self.flow.write_state = WriteState::PreWork;
                            self.flow.write_work = Work::MoreA;
                        }
                        WriteTransition::Finished => {
                            return Ok(SubState::Finished);
                        }
                    }
                }

                WriteState::PreWork => {
                    let work = grammar.pre_work(self, self.flow.write_work)?;
                    self.flow.write_work = work;

                    match work {
                        Work::FinishedContinue => {
                            self.flow.write_state = WriteState::Send;
                        }
                        Work::FinishedStop => {
                            return Ok(SubState::EndHandshake);
                        }
                        _ => {
                            // Unfinished work; resume in this sub-state.
                            return Err(Error::WouldBlock);
                        }
                    }

                    grammar.construct_message(self)?;
                    trace!("constructed message in state {:?}", self.flow.hand_state);
                    // Straight on to the send.
                }

                WriteState::Send => {
                    self.start_retransmit_timer(now);

                    self.do_write()?;

                    self.flow.write_state = WriteState::PostWork;
                    self.flow.write_work = Work::MoreA;
                    // Straight on to the post work.
                }

                WriteState::PostWork => {
                    let work = grammar.post_work(self, self.flow.write_work)?;
                    self.flow.write_work = work;

                    match work {
                        Work::FinishedContinue => {
                            self.flow.write_state = WriteState::Transition;
                        }
                        Work::FinishedStop => {
                            return Ok(SubState::EndHandshake);
                        }
                        _ => {
                            return Err(Error::WouldBlock);
                        }
                    }
                }
            }
        }
    }

    /// Flush the constructed message with the correct record content type.
    ///
    /// ChangeCipherSpec is its own record type, not a handshake message,
    /// so the two write positions for it must flush differently. The
    /// distinction is bit-exact on the wire.
    fn do_write(&mut self) -> Result<usize, Error> {
        let ctype = if self.flow.hand_state.is_change_cipher_write() {
            ContentType::ChangeCipherSpec
        } else {
            ContentType::Handshake
        };

        self.record.write_pending(ctype)
    }
}
